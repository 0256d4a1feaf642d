//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Size of the `/big` response body.
#[allow(dead_code)]
pub const BIG_BODY: usize = 3 * 1024 * 1024;

/// A raw HTTP/1.1 backend running on its own runtime thread.
///
/// Every request is answered on a fresh connection and echoed back:
/// request headers come back as `x-echo-<name>`, plus `x-method`,
/// `x-request-version` and `x-body-length`. The body is the request body,
/// or `METHOD /path` when there is none. Special paths:
/// `/slow`, `/no-content`, `/big`, `/reason`, `/truncated`.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Requests accepted so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Start a mock backend on an ephemeral port.
pub fn start_mock_backend() -> MockBackend {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = TcpListener::from_std(listener).unwrap();
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let counter = counter.clone();
                        tokio::spawn(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            let _ = serve(socket).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    });

    MockBackend { addr, requests }
}

/// A URL nothing is listening on.
#[allow(dead_code)]
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

async fn serve(socket: TcpStream) -> std::io::Result<()> {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let version = parts.next().unwrap_or_default().to_string();

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    let header = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };

    let mut body = Vec::new();
    if let Some(length) = header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(length, 0);
        reader.read_exact(&mut body).await?;
    } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).await?;
            let size = usize::from_str_radix(size_line.trim().split(';').next().unwrap_or("0"), 16)
                .unwrap_or(0);
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).await?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    let (status, payload) = match path.as_str() {
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            ("200 OK", b"slow".to_vec())
        }
        "/no-content" => ("204 No Content", Vec::new()),
        "/big" => ("200 OK", vec![b'b'; BIG_BODY]),
        "/reason" => ("200 Everything Fine", b"ok".to_vec()),
        "/truncated" => {
            write
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort")
                .await?;
            return write.shutdown().await;
        }
        _ if !body.is_empty() => ("200 OK", body.clone()),
        _ => ("200 OK", format!("{method} {path}").into_bytes()),
    };

    let mut head = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in &headers {
        head.push_str(&format!("x-echo-{name}: {value}\r\n"));
    }
    head.push_str(&format!("x-method: {method}\r\n"));
    head.push_str(&format!("x-request-version: {version}\r\n"));
    head.push_str(&format!("x-body-length: {}\r\n", body.len()));
    let no_content = status.starts_with("204");
    if !no_content {
        head.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    head.push_str("Connection: close\r\n\r\n");

    write.write_all(head.as_bytes()).await?;
    if method != "HEAD" && !no_content {
        write.write_all(&payload).await?;
    }
    write.shutdown().await
}
