//! MCP stdio sessions against the brokerage server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mcp_bridge::brokerage::BrokerageService;
use mcp_bridge::channel::MemoryChannel;
use mcp_bridge::config::{ChannelConfig, PollingConfig, TimeoutConfig};
use mcp_bridge::lifecycle::Shutdown;
use mcp_bridge::{CorrelationClient, McpServer};

/// Worker that answers each request with `{"operation", "params"}` echoed back.
fn spawn_echo_worker(channel: Arc<MemoryChannel>) {
    tokio::spawn(async move {
        loop {
            let body = channel.recv_published().await;
            let request: Value = serde_json::from_str(&body).unwrap();
            let id = request["correlation_id"].as_str().unwrap().to_string();
            channel.deliver_tagged(json!({"echo": request}).to_string(), "ExecutionId", &id);
        }
    });
}

fn brokerage(channel: Arc<MemoryChannel>, timeouts: TimeoutConfig) -> McpServer {
    let client = CorrelationClient::new(channel, &ChannelConfig::default(), &PollingConfig::default());
    McpServer::new(Arc::new(BrokerageService::new(Arc::new(client), timeouts)))
}

struct Session {
    input: tokio::io::DuplexStream,
    output: tokio::io::Lines<BufReader<tokio::io::DuplexStream>>,
    shutdown: Shutdown,
}

impl Session {
    fn start(server: McpServer) -> Self {
        let (input, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, output) = tokio::io::duplex(64 * 1024);
        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            server.run(BufReader::new(server_in), server_out, stop).await.unwrap();
        });
        Self {
            input,
            output: BufReader::new(output).lines(),
            shutdown,
        }
    }

    async fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        let line = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.input.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        let reply = self.output.next_line().await.unwrap().unwrap();
        serde_json::from_str(&reply).unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn test_initialize_then_list_tools() {
    let mut session = Session::start(brokerage(Arc::new(MemoryChannel::new()), TimeoutConfig::default()));

    let init = session.request(1, "initialize", json!({})).await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "ibkr-mcp");

    let list = session.request(2, "tools/list", json!({})).await;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 9);
    assert!(names.contains(&"ibkr_custom_ohlcv"));
    session.shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_tool_call_maps_arguments_to_operation() {
    let channel = Arc::new(MemoryChannel::new());
    spawn_echo_worker(channel.clone());
    let mut session = Session::start(brokerage(channel, TimeoutConfig::default()));

    let reply = session
        .request(
            7,
            "tools/call",
            json!({"name": "ibkr_contract_by_id", "arguments": {"contract_id": "265598", "check_ohlcv": true}}),
        )
        .await;

    let result = &reply["result"];
    assert_eq!(result["isError"], false);
    let text = result["content"][0]["text"].as_str().unwrap();
    let (heading, body) = text.split_once('\n').unwrap();
    assert_eq!(heading, "Contract Details for ID 265598:");

    let echoed: Value = serde_json::from_str(body).unwrap();
    assert_eq!(echoed["echo"]["operation"], "get_contract_details_by_id");
    assert_eq!(echoed["echo"]["contract_id"], 265598);
    assert_eq!(echoed["echo"]["check_ohlcv_availability"], true);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_reports_timeout() {
    let timeouts = TimeoutConfig {
        lookup_secs: 5,
        ..TimeoutConfig::default()
    };
    let mut session = Session::start(brokerage(Arc::new(MemoryChannel::new()), timeouts));

    let reply = tokio::time::timeout(
        Duration::from_secs(60),
        session.request(3, "tools/call", json!({"name": "ibkr_health", "arguments": {}})),
    )
    .await
    .unwrap();

    let result = &reply["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Request timed out."));
    assert!(text.contains("Correlation ID: "));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool_and_method() {
    let mut session = Session::start(brokerage(Arc::new(MemoryChannel::new()), TimeoutConfig::default()));

    let reply = session
        .request(4, "tools/call", json!({"name": "ibkr_place_order", "arguments": {}}))
        .await;
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(reply["result"]["content"][0]["text"], "Error: Unknown tool: ibkr_place_order");

    let reply = session.request(5, "resources/list", json!({})).await;
    assert_eq!(reply["error"]["code"], -32601);
}
