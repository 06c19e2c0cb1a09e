//! Stand-ins for the server under test.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the scripted server saw of a request.
#[derive(Debug)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub has_host: bool,
    pub body_len: usize,
}

pub struct Reply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: Some("text/html"),
            body: body.to_string(),
        }
    }
}

/// HTTP/1.1 server answering from a routing function. Unlike httpmock it
/// accepts any method, the `*` target and requests without `Host`.
pub struct ScriptedServer {
    port: u16,
    accept_loop: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start(route: fn(&SeenRequest) -> Reply) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let accept_loop = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, route));
            }
        });
        Ok(Self { port, accept_loop })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(mut socket: TcpStream, route: fn(&SeenRequest) -> Reply) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let mut has_host = false;
    let mut content_length = 0;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "host" => has_host = true,
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body_len = buf.len() - head_end;
    while body_len < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body_len += n,
        }
    }

    let request = SeenRequest {
        method,
        target,
        has_host,
        body_len,
    };
    let reply = route(&request);

    let mut out = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    if let Some(content_type) = reply.content_type {
        out.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    out.push_str("\r\n");
    if request.method != "HEAD" {
        out.push_str(&reply.body);
    }
    let _ = socket.write_all(out.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Writes an executable `/bin/sh` script standing in for the webserv binary.
/// The generated config path arrives as `$1`.
#[cfg(unix)]
pub fn server_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
