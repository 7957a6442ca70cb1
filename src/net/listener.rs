//! Accepted-socket tuning.
//!
//! # Responsibilities
//! - Enable TCP keep-alive on every accepted connection before the TLS
//!   handshake starts, so half-open client connections get reclaimed
//! - Hand the stream on unchanged to the wrapped acceptor

use std::io;
use std::time::Duration;

use axum_server::accept::{Accept, DefaultAcceptor};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

/// An [`Accept`] layer that turns on TCP keep-alive, then delegates.
#[derive(Debug, Clone)]
pub struct KeepAliveAcceptor<A = DefaultAcceptor> {
    inner: A,
    keepalive: TcpKeepalive,
}

impl KeepAliveAcceptor {
    /// Probe idle connections every `period`.
    pub fn new(period: Duration) -> Self {
        let keepalive = TcpKeepalive::new().with_time(period);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "windows",
        ))]
        let keepalive = keepalive.with_interval(period);

        Self {
            inner: DefaultAcceptor::new(),
            keepalive,
        }
    }
}

impl<A> KeepAliveAcceptor<A> {
    /// Replace the wrapped acceptor.
    pub fn acceptor<B>(self, inner: B) -> KeepAliveAcceptor<B> {
        KeepAliveAcceptor {
            inner,
            keepalive: self.keepalive,
        }
    }
}

impl<A, S> Accept<TcpStream, S> for KeepAliveAcceptor<A>
where
    A: Accept<TcpStream, S>,
{
    type Stream = A::Stream;
    type Service = A::Service;
    type Future = A::Future;

    fn accept(&self, stream: TcpStream, service: S) -> Self::Future {
        if let Err(e) = set_keepalive(&stream, &self.keepalive) {
            tracing::warn!(error = %e, "failed to enable TCP keep-alive");
        }
        self.inner.accept(stream, service)
    }
}

fn set_keepalive(stream: &TcpStream, keepalive: &TcpKeepalive) -> io::Result<()> {
    SockRef::from(stream).set_tcp_keepalive(keepalive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn accepted_stream_has_keepalive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (stream, _) = listener.accept().await.unwrap();
        let acceptor = KeepAliveAcceptor::new(Duration::from_secs(180));
        let (stream, ()) = acceptor.accept(stream, ()).await.unwrap();

        let sock = SockRef::from(&stream);
        assert!(sock.keepalive().unwrap());
        #[cfg(target_os = "linux")]
        {
            assert_eq!(sock.keepalive_time().unwrap(), Duration::from_secs(180));
            assert_eq!(sock.keepalive_interval().unwrap(), Duration::from_secs(180));
        }

        drop(client.await.unwrap());
    }
}
