//! End-to-end tests over loopback TCP

mod common;

use std::sync::{Arc, Mutex};

use common::{Client, get, post};
use microserve::config::ServerConfig;
use microserve::echo::echo;
use microserve::http::request::Request;
use microserve::http::response::Response;
use microserve::server::{Listener, NoReporter, Reporter, SessionStats, run, serve};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

async fn start<H, R>(
    handler: H,
    reporter: R,
) -> (std::net::SocketAddr, oneshot::Sender<()>, JoinHandle<anyhow::Result<()>>)
where
    H: microserve::server::Handler,
    R: Reporter,
{
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, handler, reporter, async move {
        let _ = stop_rx.await;
    }));

    (addr, stop_tx, server)
}

async fn connect(addr: std::net::SocketAddr) -> Client<TcpStream> {
    Client::new(TcpStream::connect(addr).await.unwrap())
}

async fn flaky(req: Request) -> anyhow::Result<Response> {
    if req.target == "/fail" {
        anyhow::bail!("boom");
    }
    Ok(Response::ok(req.target.into_bytes()))
}

#[tokio::test]
async fn test_echo_scenario() {
    let (addr, stop, server) = start(echo, NoReporter).await;
    let mut client = connect(addr).await;

    client.send(&post("/reverse", "abc")).await;
    let res = client.response().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), "cba");
    assert_eq!(res.header("Content-Type"), Some("text/plain"));

    client.send(&post("/uppercase", "hi")).await;
    assert_eq!(client.response().await.unwrap().body_str(), "HI");

    client.send(&get("/not_found")).await;
    let res = client.response().await.unwrap();
    assert_eq!(res.status, 404);
    assert!(res.body.is_empty());

    client.send(&get("/anything")).await;
    let res = client.response().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), r#"{"hello": "/anything"}"#);
    assert_eq!(res.header("Content-Type"), Some("application/json"));

    client.send(b"DELETE /anything HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(client.response().await.unwrap().status, 405);

    // 405 left the connection open; this one asks to close it
    client
        .send(b"DELETE /anything HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await;
    assert_eq!(client.response().await.unwrap().status, 405);
    assert!(client.is_closed().await);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_chunked_request_body() {
    let (addr, stop, server) = start(echo, NoReporter).await;
    let mut client = connect(addr).await;

    client
        .send(b"POST /reverse HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nab\r\n1\r\nc\r\n0\r\n\r\n")
        .await;
    assert_eq!(client.response().await.unwrap().body_str(), "cba");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failing_session_does_not_affect_others() {
    let (addr, stop, server) = start(flaky, NoReporter).await;

    let mut healthy = connect(addr).await;
    let mut doomed = connect(addr).await;

    healthy.send(&get("/before")).await;
    assert_eq!(healthy.response().await.unwrap().body_str(), "/before");

    doomed.send(&get("/fail")).await;
    assert!(doomed.is_closed().await);

    healthy.send(&get("/after")).await;
    assert_eq!(healthy.response().await.unwrap().body_str(), "/after");

    // The listener keeps accepting
    let mut late = connect(addr).await;
    late.send(&get("/late")).await;
    assert_eq!(late.response().await.unwrap().body_str(), "/late");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_sessions_run_concurrently() {
    let (addr, stop, server) = start(echo, NoReporter).await;

    // An idle connection must not hold up the next accept
    let _idle = connect(addr).await;
    let mut active = connect(addr).await;

    active.send(&post("/yell", "hey")).await;
    assert_eq!(active.response().await.unwrap().body_str(), "hey!!");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reporter_receives_peer_address() {
    let reports = Arc::new(Mutex::new(Vec::<SessionStats>::new()));
    let sink = Arc::clone(&reports);
    let reporter = move |stats: &SessionStats| sink.lock().unwrap().push(stats.clone());

    let (addr, stop, server) = start(echo, reporter).await;
    let mut client = connect(addr).await;

    client
        .send(b"GET /bye HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await;
    client.response().await.unwrap();
    assert!(client.is_closed().await);

    // The reporter runs right after the session releases the socket
    for _ in 0..50 {
        if !reports.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    {
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].requests, 1);
        assert!(reports[0].peer.is_some());
    }

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, stop, server) = start(echo, NoReporter).await;

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[test]
fn test_run_reports_bind_failure() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ServerConfig::default()
    };

    assert_eq!(run(&config, echo), -1);
}
