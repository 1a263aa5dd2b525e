//! Test doubles shared by the release module tests

use crate::security::{CommandError, CommandRunner, CommandStatus};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Canned HTTP response served by [`MetadataServer`]
#[derive(Debug, Clone)]
pub struct FakeResponse {
    status_line: &'static str,
    body: &'static str,
    delay: Duration,
}

impl FakeResponse {
    pub fn ok(body: &'static str) -> Self {
        Self::status("200 OK", body)
    }

    pub fn status(status_line: &'static str, body: &'static str) -> Self {
        Self {
            status_line,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Single-shot HTTP server standing in for the metadata service
pub struct MetadataServer {
    host: String,
    handle: JoinHandle<String>,
}

impl MetadataServer {
    pub async fn start(response: FakeResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            tokio::time::sleep(response.delay).await;

            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response.status_line,
                response.body.len(),
                response.body
            );
            let _ = stream.write_all(reply.as_bytes()).await;
            let _ = stream.shutdown().await;

            request
        });

        Self { host, handle }
    }

    /// A `host:port` nothing is listening on
    pub async fn unused_host() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    pub fn host(&self) -> String {
        self.host.clone()
    }

    /// The raw request the server received
    pub async fn request(self) -> String {
        self.handle.await.unwrap()
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = header(&text, "content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

/// Value of the first header called `name` (case-insensitive)
pub fn header(request: &str, name: &str) -> Option<String> {
    request
        .split("\r\n\r\n")
        .next()?
        .lines()
        .skip(1)
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
}

pub fn json_body(request: &str) -> serde_json::Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

/// [`CommandRunner`] that records invocations instead of spawning anything
pub struct RecordingRunner {
    status: Result<CommandStatus, String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingRunner {
    pub fn exiting_with(code: i32) -> Self {
        Self::with_status(Ok(CommandStatus { code: Some(code) }))
    }

    pub fn killed() -> Self {
        Self::with_status(Ok(CommandStatus { code: None }))
    }

    pub fn failing_to_spawn(message: &str) -> Self {
        Self::with_status(Err(message.to_string()))
    }

    fn with_status(status: Result<CommandStatus, String>) -> Self {
        Self {
            status,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandStatus, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        self.status
            .clone()
            .map_err(CommandError::ExecutionFailed)
    }
}

/// Cloneable in-memory writer standing in for stdout
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
