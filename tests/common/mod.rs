//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use urlfetch_proxy::config::ProxyConfig;
use urlfetch_proxy::identity::synthesize;
use urlfetch_proxy::transport::NoVerification;
use urlfetch_proxy::{certificate_provider, HttpServer, Shutdown};

/// Canned reply for a mock upstream.
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status_line: &'static str,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
    pub delay: Duration,
}

impl MockReply {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status_line: "200 OK",
            headers: Vec::new(),
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status_line: &'static str) -> Self {
        self.status_line = status_line;
        self
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn render(&self) -> String {
        let mut out = format!("HTTP/1.1 {}\r\n", self.status_line);
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.body.len(),
            self.body
        ));
        out
    }
}

/// A mock upstream that records the head of every request it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<String>,
}

impl MockUpstream {
    /// Wait for the next recorded request head.
    pub async fn next_request(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("upstream saw no request")
            .expect("upstream closed")
    }

    /// True when no request has reached the upstream.
    pub fn untouched(&mut self) -> bool {
        self.requests.try_recv().is_err()
    }
}

/// Start a plain HTTP mock upstream on an ephemeral port.
pub async fn start_mock_upstream(reply: MockReply) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let reply = reply.clone();
            tokio::spawn(async move { serve_once(socket, reply, tx).await });
        }
    });

    MockUpstream { addr, requests: rx }
}

/// Start an HTTPS mock upstream presenting a freshly synthesized
/// self-signed certificate. Only HTTP/1.1 is offered.
pub async fn start_tls_mock_upstream(reply: MockReply) -> MockUpstream {
    let identity = synthesize("localhost").unwrap();
    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_cert_resolver(Arc::new(FixedCert(identity.certified_key())));
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let reply = reply.clone();
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(stream) = acceptor.accept(socket).await {
                    serve_once(stream, reply, tx).await;
                }
            });
        }
    });

    MockUpstream { addr, requests: rx }
}

async fn serve_once<S>(mut socket: S, reply: MockReply, tx: mpsc::UnboundedSender<String>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    let _ = tx.send(head);
    tokio::time::sleep(reply.delay).await;
    let _ = socket.write_all(reply.render().as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_head<S: AsyncRead + Unpin>(socket: &mut S) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end]).into_owned());
        }
    }
}

#[derive(Debug)]
struct FixedCert(Arc<CertifiedKey>);

impl ResolvesServerCert for FixedCert {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }
}

/// A config suitable for running the proxy on loopback with an ephemeral port.
pub fn test_config(password: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config.auth.password = password.into();
    config
}

/// Start the full TLS proxy and wait until it is listening.
pub async fn start_proxy(config: ProxyConfig) -> (Shutdown, SocketAddr) {
    let provider = certificate_provider(&config.listener).unwrap();
    let server = HttpServer::new(config, provider).unwrap();
    let shutdown = Shutdown::new();

    let running = shutdown.clone();
    tokio::spawn(async move {
        server.run(&running).await.unwrap();
    });

    let addr = tokio::time::timeout(Duration::from_secs(5), shutdown.listening())
        .await
        .expect("proxy did not start")
        .expect("proxy failed to bind");
    (shutdown, addr)
}

/// Open a TLS connection to the proxy, accepting its self-signed
/// certificate and offering `alpn`.
pub async fn tls_connect(addr: SocketAddr, alpn: &[&[u8]]) -> TlsStream<TcpStream> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification::new(provider)))
        .with_no_client_auth();
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();

    let tcp = TcpStream::connect(addr).await.unwrap();
    TlsConnector::from(Arc::new(config))
        .connect(ServerName::try_from("www.gov.cn").unwrap(), tcp)
        .await
        .unwrap()
}

/// Send raw bytes over `stream` and read until the peer closes.
pub async fn exchange<S>(stream: &mut S, request: &str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out)).await;
    String::from_utf8_lossy(&out).into_owned()
}
