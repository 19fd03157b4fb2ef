//! Amazon SQS transport over the AWS JSON 1.0 protocol.
//!
//! # Responsibilities
//! - Publish request envelopes to the request queue
//! - Long-poll the response queue with message attributes
//! - Release (visibility 0) and delete by receipt handle
//! - Sign every request with SigV4
//!
//! # Design Decisions
//! - Plain `reqwest` + hand-built JSON bodies; four actions do not warrant an SDK
//! - Every failure is a `ChannelError`; retry policy belongs to the caller
//! - Long-poll wait is whole seconds, capped at the SQS maximum of 20

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::channel::sigv4::{self, Credentials, SigningInput};
use crate::channel::{Channel, ChannelError, LockHandle, ReceivedMessage};
use crate::config::ChannelConfig;

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const SERVICE: &str = "sqs";
const MAX_WAIT_SECS: u64 = 20;
const MAX_BATCH: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResult {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    receipt_handle: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    message_attributes: HashMap<String, SqsAttribute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsAttribute {
    string_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SqsErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Request/response queue pair on SQS.
#[derive(Clone)]
pub struct SqsChannel {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
    region: String,
    request_queue_url: String,
    response_queue_url: String,
    credentials: Credentials,
}

fn host_header(url: &Url) -> Result<String, ChannelError> {
    let host = url
        .host_str()
        .ok_or_else(|| ChannelError::Config(format!("queue URL '{}' has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

impl SqsChannel {
    /// Build a channel for the queues in `config`.
    ///
    /// Requests go to the host of the response queue URL.
    pub fn new(config: &ChannelConfig, credentials: Credentials) -> Result<Self, ChannelError> {
        let queue_url = Url::parse(&config.response_queue_url)
            .map_err(|e| ChannelError::Config(format!("invalid response queue URL: {}", e)))?;
        Url::parse(&config.request_queue_url)
            .map_err(|e| ChannelError::Config(format!("invalid request queue URL: {}", e)))?;

        let mut endpoint = queue_url.clone();
        endpoint.set_path("/");
        endpoint.set_query(None);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            host: host_header(&endpoint)?,
            endpoint,
            region: config.region.clone(),
            request_queue_url: config.request_queue_url.clone(),
            response_queue_url: config.response_queue_url.clone(),
            credentials,
        })
    }

    /// Send API calls somewhere other than the queue host (e.g. a local emulator).
    pub fn with_endpoint(mut self, endpoint: Url) -> Result<Self, ChannelError> {
        self.host = host_header(&endpoint)?;
        self.endpoint = endpoint;
        Ok(self)
    }

    async fn invoke(&self, action: &str, payload: Value) -> Result<Value, ChannelError> {
        let body = serde_json::to_vec(&payload).map_err(|e| ChannelError::Decode(e.to_string()))?;
        let target = format!("AmazonSQS.{}", action);

        let signature = sigv4::sign(
            &self.credentials,
            &SigningInput {
                region: &self.region,
                service: SERVICE,
                host: &self.host,
                content_type: CONTENT_TYPE,
                target: &target,
                body: &body,
            },
            chrono::Utc::now(),
        );

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target)
            .header("x-amz-date", &signature.amz_date)
            .header("authorization", &signature.authorization);
        if let Some(token) = &signature.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        if !status.is_success() {
            let parsed: SqsErrorBody = serde_json::from_str(&text).unwrap_or(SqsErrorBody {
                kind: String::new(),
                message: text.clone(),
            });
            let code = parsed.kind.rsplit('#').next().unwrap_or_default().to_string();
            return Err(ChannelError::Rejected {
                action: action.to_string(),
                status: status.as_u16(),
                code: if code.is_empty() { "Unknown".to_string() } else { code },
                message: parsed.message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Channel for SqsChannel {
    async fn publish(&self, body: String) -> Result<(), ChannelError> {
        self.invoke(
            "SendMessage",
            json!({
                "QueueUrl": self.request_queue_url,
                "MessageBody": body,
            }),
        )
        .await?;
        Ok(())
    }

    async fn fetch(&self, max_count: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError> {
        let value = self
            .invoke(
                "ReceiveMessage",
                json!({
                    "QueueUrl": self.response_queue_url,
                    "MaxNumberOfMessages": max_count.clamp(1, MAX_BATCH),
                    "WaitTimeSeconds": wait.as_secs().min(MAX_WAIT_SECS),
                    "MessageAttributeNames": ["All"],
                }),
            )
            .await?;

        if value.is_null() {
            return Ok(Vec::new());
        }
        let result: ReceiveMessageResult =
            serde_json::from_value(value).map_err(|e| ChannelError::Decode(e.to_string()))?;

        Ok(result
            .messages
            .into_iter()
            .map(|m| ReceivedMessage {
                body: m.body,
                metadata: m
                    .message_attributes
                    .into_iter()
                    .filter_map(|(name, attr)| attr.string_value.map(|v| (name, v)))
                    .collect(),
                lock: LockHandle::new(m.receipt_handle),
            })
            .collect())
    }

    async fn release(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        self.invoke(
            "ChangeMessageVisibility",
            json!({
                "QueueUrl": self.response_queue_url,
                "ReceiptHandle": lock.as_str(),
                "VisibilityTimeout": 0,
            }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, lock: &LockHandle) -> Result<(), ChannelError> {
        self.invoke(
            "DeleteMessage",
            json!({
                "QueueUrl": self.response_queue_url,
                "ReceiptHandle": lock.as_str(),
            }),
        )
        .await?;
        Ok(())
    }
}

impl std::fmt::Debug for SqsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsChannel")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("request_queue_url", &self.request_queue_url)
            .field("response_queue_url", &self.response_queue_url)
            .finish()
    }
}
