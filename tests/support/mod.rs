#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley::config::ProviderSettings;
use parley::tools::ToolRegistry;
use parley::Tool;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned HTTP reply
#[derive(Debug, Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: String,
}

impl StubReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Minimal HTTP/1.1 server answering every request from a reply queue
///
/// The last queued reply is repeated once the queue runs dry. Request bodies
/// are recorded in arrival order.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedHttp>>>,
}

#[derive(Debug, Clone)]
pub struct RecordedHttp {
    pub request_line: String,
    pub body: String,
}

impl RecordedHttp {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

impl StubServer {
    pub async fn start(replies: Vec<StubReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(VecDeque::from(replies)));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let recorded = Arc::clone(&recorded);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let _ = serve(stream, recorded, queue).await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedHttp> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn serve(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedHttp>>>,
    queue: Arc<Mutex<VecDeque<StubReply>>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();
    recorded.lock().unwrap().push(RecordedHttp {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body,
    });

    let reply = {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
    .unwrap_or(StubReply {
        status: 500,
        body: "{}".to_string(),
    });

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// Provider settings pointed at `url` with fast retries
pub fn stub_settings(url: &str, max_retries: u32) -> ProviderSettings {
    ProviderSettings {
        endpoint: Some(url.to_string()),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
        max_retries,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 20,
        ..ProviderSettings::default()
    }
}

pub struct GiveItem;

#[async_trait]
impl Tool for GiveItem {
    fn name(&self) -> &str {
        "give_item"
    }

    fn description(&self) -> &str {
        "Give an item to the player who asked"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "item": {"type": "string"},
                "count": {"type": "integer"}
            },
            "required": ["item"]
        })
    }

    async fn execute(&self, arguments: Value) -> anyhow::Result<Value> {
        let item = arguments["item"].as_str().unwrap_or_default();
        let count = arguments["count"].as_u64().unwrap_or(1);
        Ok(json!(format!("Gave {} {}", count, item)))
    }
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::new().with_tool(Arc::new(GiveItem))
}

pub fn short_ttl() -> Duration {
    Duration::from_millis(30)
}
