// ABOUTME: Tiny HTTP/1.1 server standing in for a slot's published port.
// ABOUTME: Responses are configured per path and can be changed while a test runs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;

pub struct StubServer {
    pub port: u16,
    routes: Routes,
    hits: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// A healthy instance of the test app: health, home page and search.
    pub async fn healthy() -> Self {
        let server = Self::start().await;
        server.respond("/health", 200, r#"{"status":"ok","checks":{"database":"ok"}}"#);
        server.respond("/", 200, "welcome to shop");
        server.respond("/search", 200, "[]");
        server
    }

    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let routes: Routes = Arc::default();
        let hits: Arc<Mutex<Vec<String>>> = Arc::default();

        let (task_routes, task_hits) = (routes.clone(), hits.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = task_routes.clone();
                let hits = task_hits.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_string();
                    let path = head
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();
                    hits.lock().push(path.clone());

                    let (status, body) = routes
                        .lock()
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, "not found".to_string()));
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { port, routes, hits }
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().iter().filter(|p| *p == path).count()
    }
}
