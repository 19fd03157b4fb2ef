//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mcp_bridge::channel::{Channel, ChannelError, LockHandle, ReceivedMessage};

/// One request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    }
}

/// Start a programmable mock HTTP server on an ephemeral port.
///
/// Every request is recorded in the returned log before `f` answers it.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<CapturedRequest>>>)
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let requests = log.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                requests.lock().unwrap().push(request.clone());
                let (status, body) = f(request).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, log)
}

/// What a [`ScriptedChannel`] does on one fetch.
pub enum Step {
    Batch(Vec<(String, Option<String>)>),
    Fail,
}

/// Channel that plays back a fixed fetch script and records every call.
///
/// Messages are `(body, ExecutionId)`. After the script runs out, fetches
/// return empty batches after the requested wait. Release and delete are
/// recorded even when set to fail.
pub struct ScriptedChannel {
    script: Mutex<VecDeque<Step>>,
    pub fetch_times: Mutex<Vec<tokio::time::Instant>>,
    pub released: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub published: Mutex<Vec<String>>,
    next_lock: Mutex<u64>,
    fail_release: AtomicBool,
    fail_delete: AtomicBool,
}

impl ScriptedChannel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fetch_times: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            next_lock: Mutex::new(0),
            fail_release: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn failing_release(self) -> Self {
        self.fail_release.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_delete(self) -> Self {
        self.fail_delete.store(true, Ordering::SeqCst);
        self
    }

    fn message(&self, body: String, id: Option<String>) -> ReceivedMessage {
        let mut next = self.next_lock.lock().unwrap();
        *next += 1;
        ReceivedMessage {
            body,
            metadata: id
                .map(|id| HashMap::from([("ExecutionId".to_string(), id)]))
                .unwrap_or_default(),
            lock: LockHandle::new(format!("lock-{}", *next)),
        }
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn publish(&self, body: String) -> Result<(), ChannelError> {
        self.published.lock().unwrap().push(body);
        Ok(())
    }

    async fn fetch(&self, _max_count: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError> {
        self.fetch_times.lock().unwrap().push(tokio::time::Instant::now());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Batch(messages)) => Ok(messages
                .into_iter()
                .map(|(body, id)| self.message(body, id))
                .collect()),
            Some(Step::Fail) => Err(ChannelError::Transport("connection reset".into())),
            None => {
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn release(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        self.released.lock().unwrap().push(lock.as_str().to_string());
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("release timed out".into()));
        }
        Ok(())
    }

    async fn delete(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        self.deleted.lock().unwrap().push(lock.as_str().to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ChannelError::Rejected {
                action: "DeleteMessage".into(),
                status: 400,
                code: "ReceiptHandleIsInvalid".into(),
                message: "The receipt handle has expired.".into(),
            });
        }
        Ok(())
    }
}
