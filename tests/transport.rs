use futures::StreamExt;
use lain::config::EndpointConfig;
use lain::core::error::LainError;
use lain::transport::{ChatMessage, ChatTransport, OpenAICompatibleTransport};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer, api_key: Option<&str>) -> OpenAICompatibleTransport {
    let config = EndpointConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: api_key.map(str::to_string),
        ..EndpointConfig::default()
    };
    OpenAICompatibleTransport::new(&config).unwrap()
}

fn sse_body(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{}\n\n", line)).collect()
}

async fn collect(transport: &OpenAICompatibleTransport) -> Vec<Result<String, LainError>> {
    let stream = transport
        .send(&[ChatMessage::user("hi")])
        .await
        .unwrap();
    stream.collect().await
}

#[tokio::test]
async fn streams_fragments_until_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"data: {"choices":[{"delta":{"content":"ab"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"cd"}}]}"#,
        "data: [DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(serde_json::json!({
            "model": "assistant",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let items = collect(&transport_for(&server, Some("secret"))).await;

    let fragments: Vec<String> = items.into_iter().map(Result::unwrap).collect();
    assert_eq!(fragments, vec!["ab", "cd"]);
}

#[tokio::test]
async fn malformed_chunk_is_reported_and_stream_continues() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"data: {"choices":[{"delta":{"content":"ab"}}]}"#,
        "data: not-json",
        r#"data: {"choices":[{"delta":{"content":"cd"}}]}"#,
        "data: [DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let items = collect(&transport_for(&server, None)).await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_deref().unwrap(), "ab");
    assert!(matches!(items[1], Err(LainError::ChunkParse(_))));
    assert_eq!(items[2].as_deref().unwrap(), "cd");
}

#[tokio::test]
async fn error_status_fails_before_any_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let result = transport_for(&server, None)
        .send(&[ChatMessage::user("hi")])
        .await;

    match result {
        Err(LainError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("model not loaded"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = EndpointConfig {
        base_url: format!("http://127.0.0.1:{}/v1", port),
        connect_timeout_secs: 2,
        ..EndpointConfig::default()
    };
    let transport = OpenAICompatibleTransport::new(&config).unwrap();

    let result = transport.send(&[ChatMessage::user("hi")]).await;

    assert!(matches!(result, Err(LainError::Transport(_))));
}
