#![cfg(feature = "ssr")]

use std::{future::Future, time::Duration};

use brandgen::{
    app::router,
    client::{BrandClient, ClientError},
    config::ProviderConfig,
    state::AppState,
    BrandRecord, GenerationSession, Phase, Tone,
};
use httpmock::prelude::*;
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

async fn spawn_relay(provider_url: String) -> (String, AppState) {
    let state = AppState::new(&ProviderConfig {
        api_key: "sk-test".into(),
        base_url: provider_url,
        model: "test-model".into(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

/// Read one HTTP request, head and body, off `socket`.
async fn read_request(socket: &mut TcpStream) {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        received.extend_from_slice(&buf[..n]);
        let Some(head_end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&received[..head_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= head_end + 4 + content_length {
            return;
        }
    }
}

/// A provider that answers 200 with a single completion event and never
/// finishes the chunked body. What happens to the open connection afterwards
/// is up to `then`.
async fn spawn_open_provider<F, Fut>(text: &'static str, then: F) -> String
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let event = format!("data: {}\n\n", json!({"choices": [{"text": text}]}));
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{event}\r\n",
            event.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        then(socket).await;
    });
    format!("http://{addr}/v1")
}

fn sse(texts: &[&str]) -> String {
    let mut body: String = texts
        .iter()
        .map(|text| format!("data: {}\n\n", json!({"choices": [{"text": text}]})))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn session_ends_with_parsed_records() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(200).body(sse(&[
                "\n",
                "1. Acme: Build Better\n",
                "2. Zenith: Rise Higher\n",
                "3. Caf",
                "é Nova: Fresh",
            ]));
        })
        .await;
    let (relay_url, _) = spawn_relay(server.url("/v1")).await;
    let client = BrandClient::new(relay_url);

    let mut session = GenerationSession::new();
    let mut phases = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(10),
        client.generate(&mut session, "sells coffee", Tone::Cool, |s| {
            phases.push(s.phase().clone())
        }),
    )
    .await
    .expect("generation hung")
    .unwrap();

    assert_eq!(phases.first(), Some(&Phase::Loading));
    assert_eq!(phases.last(), Some(&Phase::Done));
    assert_eq!(session.phase(), &Phase::Done);
    assert!(session.stream_id().is_some());
    assert_eq!(
        session.records(),
        &[
            BrandRecord { name: "Acme".into(), slogan: " Build Better".into() },
            BrandRecord { name: "Zenith".into(), slogan: " Rise Higher".into() },
            BrandRecord { name: "Café Nova".into(), slogan: " Fresh".into() },
        ]
    );
}

#[tokio::test]
async fn provider_failure_surfaces_generic_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(429);
        })
        .await;
    let (relay_url, _) = spawn_relay(server.url("/v1")).await;
    let client = BrandClient::new(relay_url);

    let mut session = GenerationSession::new();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.generate(&mut session, "sells coffee", Tone::Serious, |_| {}),
    )
    .await
    .expect("generation hung")
    .unwrap_err();

    assert!(matches!(err, ClientError::Upstream(Some(status)) if status.as_u16() == 502));
    assert_eq!(err.to_string(), "Something went wrong");
    assert_eq!(session.phase(), &Phase::Failed("Something went wrong".into()));
    assert!(session.text().is_empty());
}

#[tokio::test]
async fn short_description_fails_before_dispatch() {
    let server = MockServer::start_async().await;
    let provider = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200);
        })
        .await;
    let (relay_url, _) = spawn_relay(server.url("/v1")).await;
    let client = BrandClient::new(relay_url);

    let mut session = GenerationSession::new();
    let err = client
        .generate(&mut session, "ab", Tone::Funny, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    provider.assert_hits_async(0).await;
}

#[tokio::test]
async fn finished_stream_leaves_registry() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(200).body(sse(&["1. A: b\n"]));
        })
        .await;
    let (relay_url, state) = spawn_relay(server.url("/v1")).await;
    let client = BrandClient::new(relay_url);

    let mut session = GenerationSession::new();
    client
        .generate(&mut session, "sells coffee", Tone::Neutral, |_| {})
        .await
        .unwrap();
    let stream_id = session.stream_id().unwrap().to_string();

    // The pump task removes the entry after its sender is gone.
    for _ in 0..50 {
        if !state.streams.contains(&stream_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!state.streams.contains(&stream_id));
    assert!(!client.cancel(&stream_id).await.unwrap());
}

#[tokio::test]
async fn broken_provider_stream_fails_session_with_partial_records() {
    let provider_url = spawn_open_provider("1. Acme: Build Better\n2. Zen", |socket| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(socket);
    })
    .await;
    let (relay_url, _) = spawn_relay(provider_url).await;
    let client = BrandClient::new(relay_url);

    let mut session = GenerationSession::new();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.generate(&mut session, "sells coffee", Tone::Cool, |_| {}),
    )
    .await
    .expect("generation hung")
    .unwrap_err();

    assert!(matches!(err, ClientError::StreamRead(_)));
    assert!(matches!(session.phase(), Phase::Failed(_)));
    assert_eq!(session.text(), "1. Acme: Build Better\n2. Zen");
    assert_eq!(
        session.records(),
        &[BrandRecord { name: "Acme".into(), slogan: " Build Better".into() }]
    );
}

#[tokio::test]
async fn cancel_mid_flight_stops_relay_and_closes_provider() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let provider_url = spawn_open_provider("1. Acme: Build Better\n", |mut socket| async move {
        // Hold the body open until the relay hangs up.
        let mut buf = [0u8; 1024];
        while let Ok(n) = socket.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
        closed_tx.send(()).ok();
    })
    .await;
    let (relay_url, state) = spawn_relay(provider_url).await;
    let client = BrandClient::new(relay_url);

    let (id_tx, id_rx) = oneshot::channel::<String>();
    let mut id_tx = Some(id_tx);
    let mut session = GenerationSession::new();

    let generation = client.generate(&mut session, "sells coffee", Tone::Funny, |s| {
        if s.records().is_empty() {
            return;
        }
        if let (Some(id), Some(tx)) = (s.stream_id(), id_tx.take()) {
            tx.send(id.to_string()).ok();
        }
    });
    let cancellation = async {
        let stream_id = id_rx.await.unwrap();
        let cancelled = client.cancel(&stream_id).await.unwrap();
        (stream_id, cancelled)
    };

    let (result, (stream_id, cancelled)) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(generation, cancellation) },
    )
    .await
    .expect("cancelled generation hung");

    result.unwrap();
    assert!(cancelled);
    assert_eq!(session.phase(), &Phase::Done);
    assert_eq!(
        session.records(),
        &[BrandRecord { name: "Acme".into(), slogan: " Build Better".into() }]
    );
    tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("provider connection left open")
        .unwrap();
    assert!(!state.streams.contains(&stream_id));
    assert!(!client.cancel(&stream_id).await.unwrap());
}
