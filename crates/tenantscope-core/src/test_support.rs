//! Canned HTTP/1.1 responder for exercising the Graph and identity clients
//! without network access.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

pub struct TestServer {
    listener: TcpListener,
    base_url: String,
}

impl TestServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        Self { listener, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Answer one connection per reply, in order. Resolves to the request
    /// lines received, e.g. `GET /v1.0/users HTTP/1.1`.
    pub fn serve(self, replies: Vec<Reply>) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let (mut socket, _) = self.listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                seen.push(request.lines().next().unwrap_or_default().to_string());
                write_reply(&mut socket, reply).await;
            }
            seen
        })
    }

    /// Answer every connection with `respond(request)` until the runtime
    /// shuts down. Full requests are appended to the returned log in the
    /// order they were accepted.
    pub fn serve_with(
        self,
        respond: impl Fn(&str) -> Reply + Send + 'static,
    ) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = self.listener.accept().await {
                let request = read_request(&mut socket).await;
                let reply = respond(&request);
                seen.lock().unwrap().push(request);
                write_reply(&mut socket, reply).await;
            }
        });
        log
    }
}

async fn write_reply(socket: &mut TcpStream, reply: Reply) {
    let mut head = format!(
        "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    head.push_str(&reply.body);
    // Clients may hang up after a throttled status line
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            if buf.len() >= end + 4 + content_length(&head) {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
