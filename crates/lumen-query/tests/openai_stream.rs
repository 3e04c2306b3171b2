use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lumen_core::config::OpenAiSettings;
use lumen_core::traits::Generator;
use lumen_query::OpenAiChat;

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

/// Serves one streamed completion, pausing `gap` before each event.
async fn serve_slowly(listener: TcpListener, events: Vec<String>, gap: Duration) {
    let (mut socket, _) = listener.accept().await.unwrap();
    read_request(&mut socket).await;
    socket
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    for event in events {
        tokio::time::sleep(gap).await;
        socket.write_all(event.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
    }
    let _ = socket.shutdown().await;
}

fn delta(text: &str) -> String {
    format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
}

#[tokio::test]
async fn answer_may_stream_longer_than_the_request_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let events = vec![delta("Hello"), delta(" slow"), delta(" world"), "data: [DONE]\n\n".to_string()];
    let server = tokio::spawn(serve_slowly(listener, events, Duration::from_millis(600)));

    let settings = OpenAiSettings {
        api_key: Some("sk-local".into()),
        base_url: format!("http://{addr}/v1"),
        request_timeout_secs: 1,
        ..OpenAiSettings::default()
    };
    let chat = OpenAiChat::new(&settings).unwrap();
    let fragments: Vec<String> = chat
        .stream("Say hello")
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Hello", " slow", " world"]);
    server.await.unwrap();
}
