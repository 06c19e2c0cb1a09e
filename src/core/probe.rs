use crate::domain::model::{Probe, ProbeRequest};
use crate::utils::error::{Result, TesterError};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Version};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProbeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client aimed at one `host:port` of the server under test.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    host: String,
    port: u16,
    /// Name sent in URLs instead of `host` when aliased.
    authority: Option<String>,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Self::build_client(timeout, None)?,
            host: host.to_string(),
            port,
            authority: None,
            timeout,
        })
    }

    fn build_client(timeout: Duration, alias: Option<(&str, SocketAddr)>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none());
        if let Some((name, addr)) = alias {
            builder = builder.resolve(name, addr);
        }
        Ok(builder.build()?)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        let host = self.authority.as_deref().unwrap_or(&self.host);
        format!("http://{}:{}", host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Same client, another port on the same host.
    pub fn for_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    /// Requests go to `name` while resolving to this probe's address (`curl --resolve`).
    pub fn with_host_alias(&self, name: &str) -> Result<Self> {
        let addr = self.socket_addr()?;
        Ok(Self {
            client: Self::build_client(self.timeout, Some((name, addr)))?,
            authority: Some(name.to_string()),
            ..self.clone()
        })
    }

    fn socket_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TesterError::ConfigError {
                message: format!("{} does not resolve", self.host),
            })
    }

    pub async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| TesterError::ProtocolError {
            message: format!("invalid method {}: {}", request.method, e),
        })?;

        let mut builder = self.client.request(method, self.url(&request.path));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!("-> {}", request);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let version = response.version();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        tracing::debug!("<- {} {} ({} bytes)", request, status, bytes.len());

        Ok(ProbeResponse {
            status,
            version,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Writes `payload` verbatim and returns the status code of the reply.
    pub async fn send_raw(&self, payload: &str) -> Result<u16> {
        let exchange = async {
            let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            stream.write_all(payload.as_bytes()).await?;

            let mut buf = Vec::with_capacity(256);
            let mut chunk = [0u8; 256];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(2).any(|w| w == b"\r\n") {
                    break;
                }
            }
            parse_status_line(&String::from_utf8_lossy(&buf))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TesterError::Timeout {
                operation: format!("raw request to {}:{}", self.host, self.port),
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn status(&self, probe: &Probe) -> Result<u16> {
        match probe {
            Probe::Http(request) => Ok(self.send(request).await?.status),
            Probe::Raw { payload, .. } => self.send_raw(payload).await,
        }
    }
}

/// `HTTP/1.1 404 Not Found` -> 404.
pub fn parse_status_line(response: &str) -> Result<u16> {
    let line = response.lines().next().unwrap_or_default();
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => {
            code.parse().map_err(|_| TesterError::ProtocolError {
                message: format!("bad status code in '{}'", line),
            })
        }
        _ => Err(TesterError::ProtocolError {
            message: if line.is_empty() {
                "connection closed without a response".to_string()
            } else {
                format!("bad status line '{}'", line)
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/1.1 400 Bad Request\r\n\r\n").unwrap(), 400);
        assert_eq!(parse_status_line("HTTP/1.0 200 OK").unwrap(), 200);
        assert!(parse_status_line("").is_err());
        assert!(parse_status_line("garbage").is_err());
        assert!(parse_status_line("HTTP/1.1 abc").is_err());
    }

    #[test]
    fn test_urls_and_aliases() {
        let probe = HttpProbe::new("127.0.0.1", 8888, Duration::from_secs(1)).unwrap();
        assert_eq!(probe.url("/index.html"), "http://127.0.0.1:8888/index.html");
        assert_eq!(probe.for_port(9999).base_url(), "http://127.0.0.1:9999");

        let aliased = probe.with_host_alias("example.com").unwrap();
        assert_eq!(aliased.base_url(), "http://example.com:8888");
    }

    #[tokio::test]
    async fn test_send_raw_reads_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 512];
            let n = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let probe = HttpProbe::new("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let status = probe.send_raw("GET * HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        assert_eq!(status, 400);

        let received = server.await.unwrap();
        assert!(received.starts_with("GET * HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_send_raw_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let probe = HttpProbe::new("127.0.0.1", port, Duration::from_millis(200)).unwrap();
        let err = probe.send_raw("GET / HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, TesterError::Timeout { .. }));
    }
}
