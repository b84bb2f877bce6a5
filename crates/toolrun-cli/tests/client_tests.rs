//! Integration tests for the gateway client
//!
//! wiremock stands in for the gateway where whole responses are enough; a
//! hand-rolled chunked HTTP server covers partial delivery and cancellation.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

use toolrun_cli::{ClientError, RunRequest, RunStatus, ToolClient};

fn outline_request() -> RunRequest {
    RunRequest::new("blog-post-outline").input("topic", "Rust")
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

/// Read one HTTP request (headers plus content-length body)
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return;
            }
        }
    }
}

/// Serve one chunked 200 response, sending each chunk after `gap`.
/// With `finish` unset the response never ends.
async fn chunked_server(chunks: Vec<Vec<u8>>, gap: Duration, finish: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ntransfer-encoding: chunked\r\n\r\n";
        stream.write_all(head.as_bytes()).await.unwrap();

        for chunk in chunks {
            let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
            frame.extend_from_slice(&chunk);
            frame.extend_from_slice(b"\r\n");
            if stream.write_all(&frame).await.is_err() {
                return;
            }
            stream.flush().await.ok();
            tokio::time::sleep(gap).await;
        }

        if finish {
            stream.write_all(b"0\r\n\r\n").await.ok();
            stream.flush().await.ok();
            tokio::time::sleep(Duration::from_millis(50)).await;
        } else {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    format!("http://{addr}")
}

// =============================================================================
// Streaming Tests
// =============================================================================

#[tokio::test]
async fn test_run_collects_streamed_text() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/tools/run"))
        .and(matchers::body_json(serde_json::json!({
            "slug": "blog-post-outline",
            "inputs": {"topic": "Rust"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-tss-raw-response", "true")
                .set_body_raw("# Outline\n1. Ownership", "text/plain; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ToolClient::new(&server.uri()).unwrap();
    let mut seen = String::new();
    let outcome = client
        .run(&outline_request(), |text| seen.push_str(text), never())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.text, "# Outline\n1. Ownership");
    assert_eq!(seen, outcome.text);
}

#[tokio::test]
async fn test_run_decodes_multibyte_split_across_chunks() {
    let text = "naïve café 👋";
    let bytes = text.as_bytes();
    // Split inside 'ï' and inside the emoji.
    let chunks = vec![bytes[..3].to_vec(), bytes[3..14].to_vec(), bytes[14..].to_vec()];
    let url = chunked_server(chunks, Duration::from_millis(10), true).await;

    let client = ToolClient::new(&url).unwrap();
    let mut pieces = Vec::new();
    let outcome = client
        .run(&outline_request(), |text| pieces.push(text.to_string()), never())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.text, text);
    assert!(pieces.iter().all(|p| !p.contains('\u{FFFD}')));
    assert_eq!(pieces.concat(), text);
}

#[tokio::test]
async fn test_empty_success_body_completes() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = ToolClient::new(&server.uri()).unwrap();
    let outcome = client.run(&outline_request(), |_| {}, never()).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.text.is_empty());
}

// =============================================================================
// Error Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_non_ok_surfaces_body_text() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "error": "Topic is required",
            "userMessage": "⚠️ Topic is required",
            "code": "invalid_request"
        });

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(body))
            .mount(&server)
            .await;

        let client = ToolClient::new(&server.uri()).unwrap();
        let err = client.run(&outline_request(), |_| {}, never()).await.unwrap_err();

        match &err {
            ClientError::Gateway { status, message } => {
                assert_eq!(*status, 400);
                assert!(message.contains("Topic is required"));
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
        assert_eq!(err.user_message(), "⚠️ Topic is required");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream connect error"))
            .mount(&server)
            .await;

        let client = ToolClient::new(&server.uri()).unwrap();
        let err = client.run(&outline_request(), |_| {}, never()).await.unwrap_err();
        assert_eq!(err.user_message(), "upstream connect error");
    }

    #[tokio::test]
    async fn test_show_unknown_tool_is_gateway_error() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/tools/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "Unknown tool: missing",
                "userMessage": "🔍 That tool doesn't exist.",
                "code": "not_found"
            })))
            .mount(&server)
            .await;

        let client = ToolClient::new(&server.uri()).unwrap();
        let err = client.show_tool("missing").await.unwrap_err();
        assert!(matches!(err, ClientError::Gateway { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_show_tool_slug_stays_one_path_segment() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/tools/notes%2F..%3Fx"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such tool"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ToolClient::new(&server.uri()).unwrap();
        let err = client.show_tool("notes/..?x").await.unwrap_err();
        assert!(matches!(err, ClientError::Gateway { status: 404, .. }));
    }
}

// =============================================================================
// Cancellation Tests
// =============================================================================

mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_before_response() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = ToolClient::new(&server.uri()).unwrap();
        let cancel = tokio::time::sleep(Duration::from_millis(50));

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.run(&outline_request(), |_| {}, cancel),
        )
        .await
        .expect("cancel should stop the run promptly")
        .unwrap();

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.text.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_received_text() {
        let url = chunked_server(
            vec![b"first ".to_vec(), b"second".to_vec()],
            Duration::from_millis(10),
            false,
        )
        .await;

        let client = ToolClient::new(&url).unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);
        let cancel = async {
            let _ = rx.await;
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.run(
                &outline_request(),
                |text| {
                    if text.contains("second") {
                        if let Some(tx) = tx.take() {
                            let _ = tx.send(());
                        }
                    }
                },
                cancel,
            ),
        )
        .await
        .expect("cancel should stop the stalled stream")
        .unwrap();

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(outcome.text, "first second");
    }
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[tokio::test]
async fn test_list_tools() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/tools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"slug": "blog-post-outline", "name": "Blog Post Outline", "description": "d"},
            {"slug": "social-thread", "name": "Social Thread", "description": "e"}
        ])))
        .mount(&server)
        .await;

    let client = ToolClient::new(&server.uri()).unwrap();
    let tools = client.list_tools().await.unwrap();

    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].slug, "social-thread");
}
