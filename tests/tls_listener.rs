//! End-to-end tests through the TLS listener.

use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};

mod common;
use common::{exchange, start_mock_upstream, start_proxy, test_config, tls_connect, MockReply};

#[tokio::test]
async fn http1_absolute_form_request_is_relayed() {
    let mut upstream = start_mock_upstream(
        MockReply::ok("hello")
            .status("404 Not Found")
            .header("Content-Type", "text/plain"),
    )
    .await;
    let (shutdown, proxy) = start_proxy(test_config("")).await;

    let mut stream = tls_connect(proxy, &[b"http/1.1"]).await;
    assert_eq!(stream.get_ref().1.alpn_protocol(), Some(&b"http/1.1"[..]));

    let reply = exchange(
        &mut stream,
        &format!(
            "GET http://{addr}/greeting HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n",
            addr = upstream.addr
        ),
    )
    .await;

    assert!(reply.starts_with("HTTP/1.1 200 OK"), "reply: {reply}");
    assert!(reply.to_ascii_lowercase().contains("content-type: text/plain"));
    assert!(reply.ends_with("hello"));
    assert!(upstream.next_request().await.starts_with("GET /greeting"));

    shutdown.trigger();
}

#[tokio::test]
async fn wrong_password_over_tls_is_forbidden() {
    let mut upstream = start_mock_upstream(MockReply::ok("never")).await;
    let (shutdown, proxy) = start_proxy(test_config("s3cret")).await;

    let mut stream = tls_connect(proxy, &[b"http/1.1"]).await;
    let reply = exchange(
        &mut stream,
        &format!(
            "GET http://{addr}/ HTTP/1.1\r\nHost: {addr}\r\nX-UrlFetch-Password: nope\r\nConnection: close\r\n\r\n",
            addr = upstream.addr
        ),
    )
    .await;

    assert!(reply.starts_with("HTTP/1.1 403"), "reply: {reply}");
    assert!(reply.ends_with("wrong password \"nope\"\n"));
    assert!(upstream.untouched());

    shutdown.trigger();
}

#[tokio::test]
async fn http2_is_negotiated_and_served() {
    let mut upstream = start_mock_upstream(MockReply::ok("via h2")).await;
    let (shutdown, proxy) = start_proxy(test_config("s3cret")).await;

    let stream = tls_connect(proxy, &[b"h2", b"http/1.1"]).await;
    assert_eq!(stream.get_ref().1.alpn_protocol(), Some(&b"h2"[..]));

    let (mut sender, conn) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
            .await
            .unwrap();
    tokio::spawn(conn);

    let req = Request::builder()
        .uri(format!("http://{}/multiplexed", upstream.addr))
        .header("X-UrlFetch-Password", "s3cret")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let resp = sender.send_request(req).await.unwrap();
    assert_eq!(resp.status(), hyper::StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"via h2");

    let head = upstream.next_request().await.to_ascii_lowercase();
    assert!(head.starts_with("get /multiplexed http/1.1"), "head: {head}");
    assert!(!head.contains("x-urlfetch-"));

    shutdown.trigger();
}

#[tokio::test]
async fn per_name_certificates_serve_any_sni() {
    let upstream = start_mock_upstream(MockReply::ok("named")).await;
    let mut config = test_config("");
    config.listener.certificate_mode = urlfetch_proxy::config::CertificateMode::PerName;
    let (shutdown, proxy) = start_proxy(config).await;

    let mut stream = tls_connect(proxy, &[b"http/1.1"]).await;
    let reply = exchange(
        &mut stream,
        &format!(
            "GET http://{addr}/ HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n",
            addr = upstream.addr
        ),
    )
    .await;
    assert!(reply.starts_with("HTTP/1.1 200 OK"), "reply: {reply}");

    shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let (shutdown, proxy) = start_proxy(test_config("")).await;
    shutdown.trigger();

    let mut refused = false;
    for _ in 0..40 {
        if tokio::net::TcpStream::connect(proxy).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refused, "listener still accepting after shutdown");
}
