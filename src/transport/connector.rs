//! Connection establishment with a deadline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::Uri;
use tower::Service;

use super::BoxError;

/// Returned when connecting to an upstream (TCP connect plus TLS handshake)
/// exceeds the configured deadline.
#[derive(Debug, thiserror::Error)]
#[error("TLS handshake timeout after {0:?}")]
pub struct HandshakeTimeout(pub Duration);

/// Wraps a connector so that establishing a connection fails once `timeout`
/// elapses.
#[derive(Debug, Clone)]
pub struct TimeoutConnector<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimeoutConnector<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for TimeoutConnector<C>
where
    C: Service<Uri>,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<C::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let timeout = self.timeout;
        let connecting = self.inner.call(dst);
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Box::new(HandshakeTimeout(timeout)) as BoxError),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn stalled_connect_times_out() {
        let stalled = tower::service_fn(|_dst: Uri| async {
            std::future::pending::<Result<(), std::io::Error>>().await
        });
        let connector = TimeoutConnector::new(stalled, Duration::from_millis(50));

        let err = connector
            .oneshot(Uri::from_static("https://upstream.example/"))
            .await
            .unwrap_err();
        assert!(err.is::<HandshakeTimeout>());
        assert!(err.to_string().contains("TLS handshake timeout"));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let failing = tower::service_fn(|_dst: Uri| async {
            Err::<(), _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        });
        let connector = TimeoutConnector::new(failing, Duration::from_secs(5));

        let err = connector
            .oneshot(Uri::from_static("http://upstream.example/"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
