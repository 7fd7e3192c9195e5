//! Loopback HTTP server for client tests

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct MockResponse {
    pub status: &'static str,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn ok_json(value: serde_json::Value) -> Self {
        Self {
            status: "200 OK",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn status(status: &'static str, body: &[u8]) -> Self {
        Self {
            status,
            body: body.to_vec(),
        }
    }
}

/// Serve `accepts` connections, answering each request body with `handler`
pub(crate) async fn spawn_http_server<F>(accepts: usize, handler: F) -> SocketAddr
where
    F: Fn(&[u8]) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        for _ in 0..accepts {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let body = read_request_body(&mut stream).await;
            let response = handler(&body);
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                response.status,
                response.body.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&response.body).await;
            let _ = stream.shutdown().await;
        }
    });
    addr
}

async fn read_request_body(stream: &mut TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buf = [0_u8; 4096];
    let header_end = loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return Vec::new(),
            Ok(n) => n,
        };
        request.extend_from_slice(&buf[..n]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < header_end + content_length {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    request.split_off(header_end)
}

/// Echo the JSON-RPC id of `request` around `result`
pub(crate) fn rpc_result(request: &[u8], result: serde_json::Value) -> MockResponse {
    let id = serde_json::from_slice::<serde_json::Value>(request)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(serde_json::Value::from(0));
    MockResponse::ok_json(serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

pub(crate) fn rpc_error(request: &[u8], code: i64, message: &str) -> MockResponse {
    let id = serde_json::from_slice::<serde_json::Value>(request)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(serde_json::Value::from(0));
    MockResponse::ok_json(serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    }))
}

/// JSON-RPC method name of `request`
pub(crate) fn rpc_method(request: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(request)
        .ok()
        .and_then(|v| v.get("method").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_default()
}
