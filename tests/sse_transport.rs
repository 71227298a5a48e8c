//! Server-sent-events bodies delivered in timed pieces over a raw socket

use futures::StreamExt;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use unillm::config::OpenAICompatibleConfig;
use unillm::llm::RetryConfig;
use unillm::{ChatOptions, Message, Provider, UnillmError};

/// A body fragment written after waiting `delay`
struct Piece {
    delay: Duration,
    bytes: Vec<u8>,
}

impl Piece {
    fn now(bytes: impl Into<Vec<u8>>) -> Self {
        Self::after(Duration::ZERO, bytes)
    }

    fn after(delay: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            delay,
            bytes: bytes.into(),
        }
    }
}

fn event(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": content}, "finish_reason": null}]})
    )
}

async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = socket.read(&mut buf).await.unwrap();
        if read == 0 {
            return;
        }
        request.extend_from_slice(&buf[..read]);

        let Some(header_end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

/// Serve one streaming response, writing each piece as its own read
async fn serve(pieces: Vec<Piece>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        socket.flush().await.unwrap();

        for piece in pieces {
            tokio::time::sleep(piece.delay).await;
            if socket.write_all(&piece.bytes).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
        let _ = socket.shutdown().await;
    });

    addr
}

fn provider(addr: SocketAddr, timeout: Duration) -> Provider {
    let mut config = OpenAICompatibleConfig::new("test-model")
        .with_base_url(&format!("http://{}", addr))
        .with_retry(RetryConfig::disabled());
    config.timeout = timeout;
    Provider::openai_compatible(config, &[]).unwrap()
}

/// Drain a stream into its joined content and any errors
async fn drain(provider: &Provider) -> (String, Vec<UnillmError>) {
    let mut stream = provider
        .chat_stream(&[Message::user("hi")], &ChatOptions::default())
        .await
        .unwrap();

    let mut content = String::new();
    let mut errors = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => content.push_str(&chunk.content_delta),
            Err(e) => errors.push(e),
        }
    }
    (content, errors)
}

#[tokio::test]
async fn test_character_split_across_reads_is_preserved() {
    let body = format!("{}{}data: [DONE]\n\n", event("caf\u{e9}"), event(" au lait"));
    let bytes = body.into_bytes();
    let split = bytes.iter().position(|byte| *byte == 0xC3).unwrap() + 1;

    let addr = serve(vec![
        Piece::now(bytes[..split].to_vec()),
        Piece::after(Duration::from_millis(50), bytes[split..].to_vec()),
    ])
    .await;

    let (content, errors) = drain(&provider(addr, Duration::from_secs(5))).await;
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(content, "caf\u{e9} au lait");
}

#[tokio::test]
async fn test_line_split_mid_event_is_reassembled() {
    let body = format!("{}data: [DONE]\n\n", event("whole"));
    let (head, tail) = body.split_at(12);

    let addr = serve(vec![
        Piece::now(head),
        Piece::after(Duration::from_millis(30), tail),
    ])
    .await;

    let (content, errors) = drain(&provider(addr, Duration::from_secs(5))).await;
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(content, "whole");
}

#[tokio::test]
async fn test_stream_may_outlast_timeout_while_data_flows() {
    let gap = Duration::from_millis(700);
    let addr = serve(vec![
        Piece::now(event("a")),
        Piece::after(gap, event("b")),
        Piece::after(gap, event("c")),
        Piece::after(gap, "data: [DONE]\n\n"),
    ])
    .await;

    let (content, errors) = drain(&provider(addr, Duration::from_secs(1))).await;
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert_eq!(content, "abc");
}

#[tokio::test]
async fn test_stalled_stream_ends_with_network_error() {
    let addr = serve(vec![
        Piece::now(event("a")),
        Piece::after(Duration::from_secs(3), event("b")),
    ])
    .await;

    let (content, errors) = drain(&provider(addr, Duration::from_millis(300))).await;
    assert_eq!(content, "a");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], UnillmError::NetworkError { .. }));
    assert!(errors[0].is_retryable());
}
