use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use was_simple::{Method, Request, Response, SimpleClient, SimpleServer, Status, WasError};
use was_transport::WasSocket;

fn connect() -> (SimpleClient, SimpleServer) {
    let (client, server) = WasSocket::pair().unwrap();
    (
        SimpleClient::new(client).unwrap(),
        SimpleServer::new(server).unwrap(),
    )
}

/// Mirror request headers and body back, like the CLI's `serve --echo-body`.
async fn mirror(request: Request) -> Response {
    let mut response = Response::ok();
    response.headers = request.headers;
    response.body = request.body;
    response
}

#[tokio::test]
async fn get_without_headers_or_body() {
    let (mut client, mut server) = connect();

    let exchange = async move {
        let response = client.request(Request::get("/foo")).await;
        drop(client);
        response
    };
    let (served, response) = tokio::join!(server.run(mirror), exchange);

    served.unwrap();
    let response = response.unwrap();
    assert_eq!(response.status, Status::OK);
    assert!(response.headers.is_empty());
    assert!(response.body.is_none());
}

#[tokio::test]
async fn header_is_mirrored() {
    let (mut client, mut server) = connect();

    let exchange = async move {
        let response = client
            .request(Request::get("/foo").with_header("hello", "world"))
            .await;
        drop(client);
        response
    };
    let (served, response) = tokio::join!(server.run(mirror), exchange);

    served.unwrap();
    let response = response.unwrap();
    assert_eq!(response.status, Status::OK);
    assert_eq!(response.headers.len(), 1);
    assert_eq!(response.headers.get("hello"), Some("world"));
    assert!(response.body.is_none());
}

#[tokio::test]
async fn request_fields_reach_the_handler() {
    let (mut client, mut server) = connect();

    let mut request = Request::new(Method::Put, "/upload/file.txt")
        .with_parameter("backend", "disk")
        .with_body(vec![b'x'; 100_000]);
    request.script_name = Some("/upload".into());
    request.path_info = Some("/file.txt".into());
    request.query_string = Some("overwrite=1".into());
    request.remote_host = Some("192.0.2.7".into());
    let expected = request.clone();

    let handling = async move {
        let received = server.next_request().await.unwrap().unwrap();
        server.send_response(Response::new(Status::NO_CONTENT)).unwrap();
        server.flush().await.unwrap();
        received
    };
    let exchange = async move { client.request(request).await.unwrap() };
    let (received, response) = tokio::join!(handling, exchange);

    assert_eq!(received, expected);
    assert_eq!(response.status, Status::NO_CONTENT);
}

#[tokio::test]
async fn bodies_are_echoed_across_requests() {
    let (mut client, mut server) = connect();

    let exchange = async move {
        let mut bodies = Vec::new();
        for size in [0usize, 1, 70_000, 262_144] {
            let body: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
            let response = client
                .request(Request::new(Method::Post, "/echo").with_body(body.clone()))
                .await
                .unwrap();
            assert_eq!(response.body.as_deref(), Some(body.as_slice()));
            bodies.push(size);
        }
        drop(client);
        bodies
    };
    let (served, sizes) = tokio::join!(server.run(mirror), exchange);

    served.unwrap();
    assert_eq!(sizes.len(), 4);
}

#[tokio::test]
async fn head_response_carries_length_only() {
    let (mut client, mut server) = connect();

    let handler = |_request: Request| async { Response::ok().with_body("twelve bytes") };
    let exchange = async move {
        let response = client.request(Request::new(Method::Head, "/")).await;
        drop(client);
        response
    };
    let (served, response) = tokio::join!(server.run(handler), exchange);

    served.unwrap();
    let response = response.unwrap();
    assert!(response.body.is_none());
    assert_eq!(response.headers.get("content-length"), Some("12"));
}

#[tokio::test]
async fn bodyless_status_drops_body() {
    let (mut client, mut server) = connect();

    let handler = |_request: Request| async {
        Response::new(Status::NOT_MODIFIED)
            .with_header("etag", "\"v1\"")
            .with_body("stale")
    };
    let exchange = async move {
        let response = client.request(Request::get("/cached")).await;
        drop(client);
        response
    };
    let (served, response) = tokio::join!(server.run(handler), exchange);

    served.unwrap();
    let response = response.unwrap();
    assert_eq!(response.status, Status::NOT_MODIFIED);
    assert_eq!(response.headers.get("etag"), Some("\"v1\""));
    assert!(response.body.is_none());
}

#[tokio::test]
async fn metrics_reach_the_client() {
    let (mut client, mut server) = connect();

    let handling = async move {
        server.next_request().await.unwrap().unwrap();
        server.send_metric("db_time", 0.25).unwrap();
        server
            .send_response(Response::ok().with_metric("cache_hits", 3.0))
            .unwrap();
        server.flush().await.unwrap();
    };
    let exchange = async move { client.request(Request::get("/stats")).await.unwrap() };
    let ((), response) = tokio::join!(handling, exchange);

    let metrics: Vec<_> = response
        .metrics
        .iter()
        .map(|m| (m.name.as_str(), m.value))
        .collect();
    assert_eq!(metrics, vec![("db_time", 0.25), ("cache_hits", 3.0)]);
}

#[tokio::test]
async fn cancelled_handler_is_dropped_and_connection_reused() {
    let (mut client, mut server) = connect();
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (dropped_tx, dropped_rx) = oneshot::channel::<()>();
    let slow = Arc::new(Mutex::new(Some((started_tx, dropped_tx))));

    let handler = move |request: Request| {
        let signals = if request.uri == "/slow" {
            slow.lock().unwrap().take()
        } else {
            None
        };
        async move {
            if let Some((started, _dropped)) = signals {
                started.send(()).unwrap();
                std::future::pending::<()>().await;
            }
            Response::ok().with_header("uri", request.uri)
        }
    };

    let exchange = async move {
        client.send_request(Request::get("/slow")).unwrap();
        tokio::select! {
            outcome = client.response() => panic!("cancelled request completed: {outcome:?}"),
            started = started_rx => started.unwrap(),
        }
        client.cancel().unwrap();
        assert!(!client.is_busy());

        let response = client.request(Request::get("/fast")).await.unwrap();
        assert_eq!(response.headers.get("uri"), Some("/fast"));
        assert!(dropped_rx.await.is_err(), "handler future was not dropped");
        drop(client);
    };
    let (served, ()) = tokio::join!(server.run(handler), exchange);
    served.unwrap();
}

#[tokio::test]
async fn cancel_during_response_body_discards_it() {
    let (mut client, mut server) = connect();
    let big = vec![b'z'; 200_000];

    let handling = async move {
        server.next_request().await.unwrap().unwrap();
        server
            .send_response(Response::ok().with_body(big))
            .unwrap();
        // The second request only shows up after the cancelled body was
        // skipped by the client.
        let second = server.next_request().await.unwrap().unwrap();
        server
            .send_response(Response::ok().with_body(second.uri))
            .unwrap();
        assert!(server.next_request().await.unwrap().is_none());
    };
    let exchange = async move {
        client.send_request(Request::get("/big")).unwrap();
        client.cancel().unwrap();
        let response = client.request(Request::get("/after")).await.unwrap();
        assert_eq!(response.body.as_deref(), Some(b"/after".as_ref()));
        client.flush().await.unwrap();
        drop(client);
    };
    tokio::join!(handling, exchange);
}

#[tokio::test]
async fn server_disconnect_is_reported_once() {
    let (mut client, server) = connect();

    let exchange = async move {
        client.send_request(Request::get("/gone")).unwrap();
        let first = client.response().await.unwrap_err();
        assert!(first.is_fatal());
        assert!(matches!(client.response().await, Err(WasError::Closed)));
    };
    drop(server);
    exchange.await;
}
