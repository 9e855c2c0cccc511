#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use avatar_fetch::{DecodedImage, DisplaySink, RequestTarget, Transport, TransportError};
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// PNG fixture of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([30, 144, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

pub fn http_response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// What the mock server does with one accepted connection.
#[derive(Clone)]
pub enum Reply {
    Respond(Vec<u8>),
    /// Read the request, then close without answering.
    HangUp,
    /// Read the request, then say nothing for the given time.
    Stall(Duration),
}

/// A minimal HTTP/1.1 server: one scripted reply per connection, the last
/// reply repeating once the script runs out.
pub struct MockHttpServer {
    listener: TcpListener,
    port: u16,
}

impl MockHttpServer {
    pub async fn new() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn start(self, replies: Vec<Reply>) -> ServerHandle {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            let mut index = 0;
            loop {
                let Ok((stream, _)) = self.listener.accept().await else {
                    break;
                };
                let reply = replies
                    .get(index)
                    .or_else(|| replies.last())
                    .cloned()
                    .unwrap_or(Reply::HangUp);
                index += 1;
                tokio::spawn(handle_connection(stream, reply, Arc::clone(&seen)));
            }
        });

        ServerHandle { requests, task }
    }
}

async fn handle_connection(mut stream: TcpStream, reply: Reply, seen: Arc<Mutex<Vec<String>>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return,
            Ok(Ok(n)) => head.extend_from_slice(&buf[..n]),
        }
    }
    seen.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

    match reply {
        Reply::Respond(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.flush().await;
            let _ = stream.shutdown().await;
        }
        Reply::HangUp => drop(stream),
        Reply::Stall(duration) => tokio::time::sleep(duration).await,
    }
}

pub struct ServerHandle {
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Raw request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A URL on a port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/avatar.png")
}

/// Transport that answers every request with the same canned result.
pub struct ScriptedTransport {
    response: Result<Bytes, TransportError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn ok(bytes: impl Into<Bytes>) -> Self {
        Self::with_result(Ok(bytes.into()))
    }

    pub fn err(error: TransportError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(response: Result<Bytes, TransportError>) -> Self {
        Self {
            response,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared call counter, still readable after the transport is moved.
    pub fn calls(&self) -> CallCounter {
        CallCounter(Arc::clone(&self.calls))
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, _url: &str) -> Result<Bytes, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

#[derive(Clone)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Transport whose request task panics.
pub struct PanickingTransport;

impl Transport for PanickingTransport {
    async fn send(&self, url: &str) -> Result<Bytes, TransportError> {
        panic!("transport blew up on {url}");
    }
}

pub fn connection_error() -> TransportError {
    TransportError::Connection {
        message: "dns error: failed to lookup address information".into(),
    }
}

pub fn status(code: u16) -> TransportError {
    TransportError::Status {
        code,
        message: "scripted".into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Image { url: String, width: u32, height: u32 },
    Fallback { url: String, label: String },
}

/// Display sink that records every call.
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl DisplaySink for RecordingSink {
    fn on_image_ready(&self, target: &RequestTarget, image: DecodedImage) {
        self.deliveries.lock().unwrap().push(Delivery::Image {
            url: target.url().to_string(),
            width: image.width,
            height: image.height,
        });
    }

    fn on_fallback(&self, target: &RequestTarget) {
        self.deliveries.lock().unwrap().push(Delivery::Fallback {
            url: target.url().to_string(),
            label: target.fallback_label().to_string(),
        });
    }
}
