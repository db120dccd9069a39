use docent_core::search::{EventStreamClient, GraphqlClient};
use docent_core::*;
use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one canned HTTP response on a loopback port. The handle
/// resolves to the raw request the client sent.
async fn serve_once(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn json_response(status: &str, body: &serde_json::Value) -> String {
    let body = body.to_string();
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn sse_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n{body}"
    )
}

fn query() -> SearchQuery {
    let mut history = ConversationHistory::new();
    history.append(HistoryEntry::new("user", "What is the FOIA deadline?", "Which state?"));
    let filters = Filters {
        role_filter: "journalist".into(),
        content_type: "Public Records Law".into(),
        resource_type: String::new(),
    };
    SearchQuery::new("Massachusetts", &history, &filters)
}

// ========================================================================
// GraphQL
// ========================================================================

#[tokio::test]
async fn test_graphql_follow_up() {
    let body = json!({"data": {"askLlm": [{
        "title": "follow-up",
        "link": "",
        "summary": "Which agency holds the records?",
        "citations": [{"id": "1", "context": "Follow-up question"}]
    }]}});
    let (url, server) = serve_once(json_response("200 OK", &body)).await;

    let client = GraphqlClient::new(format!("{url}/graphql"));
    let reply = client.ask(&query()).await.unwrap();
    assert_eq!(
        reply,
        Reply::FollowUp {
            text: "Which agency holds the records?".into()
        }
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /graphql "));
    let body_start = request.find("\r\n\r\n").unwrap() + 4;
    let sent: serde_json::Value = serde_json::from_str(&request[body_start..]).unwrap();
    assert!(sent["query"].as_str().unwrap().contains("askLlm"));
    assert_eq!(sent["variables"]["prompt"], "Massachusetts");
    assert_eq!(sent["variables"]["roleFilter"], "journalist");
    assert_eq!(sent["variables"]["contentType"], "Public Records Law");
    assert_eq!(
        sent["variables"]["convoHistory"],
        "Previous user question: What is the FOIA deadline?\nPrevious Follow Up Question: Which state?"
    );
}

#[tokio::test]
async fn test_graphql_results() {
    let body = json!({"data": {"askLlm": [
        {"title": "Doc A", "link": "http://x", "summary": "Filed in [1]", "citations": [{"id": "1", "context": "c"}]},
        {"title": "Doc B", "link": "http://y", "summary": "", "citations": []}
    ]}});
    let (url, _server) = serve_once(json_response("200 OK", &body)).await;

    let reply = GraphqlClient::new(format!("{url}/graphql"))
        .ask(&query())
        .await
        .unwrap();
    match reply {
        Reply::Results { items } => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].title, "Doc A");
            assert_eq!(items[0].citations[0].id, "1");
            assert_eq!(items[1].link, "http://y");
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_graphql_errors_without_data() {
    let body = json!({"data": null, "errors": [{"message": "model unavailable"}, {"message": "try later"}]});
    let (url, _server) = serve_once(json_response("200 OK", &body)).await;

    let err = GraphqlClient::new(format!("{url}/graphql"))
        .ask(&query())
        .await
        .unwrap_err();
    match err {
        DocentError::GraphQl(message) => assert_eq!(message, "model unavailable; try later"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_graphql_http_error_status() {
    let (url, _server) = serve_once(json_response("500 Internal Server Error", &json!({"detail": "boom"}))).await;

    let err = GraphqlClient::new(format!("{url}/graphql"))
        .ask(&query())
        .await
        .unwrap_err();
    assert!(matches!(err, DocentError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_http_backend_uses_configured_paths() {
    let body = json!({"data": {"askLlm": []}});
    let (url, server) = serve_once(json_response("200 OK", &body)).await;

    let mut settings = Settings::default();
    settings.backend.base_url = format!("{url}/");
    let backend = HttpBackend::from_settings(&settings).unwrap();

    let reply = backend.ask(&query()).await.unwrap();
    assert_eq!(reply, Reply::Results { items: vec![] });
    assert!(server.await.unwrap().starts_with("POST /graphql "));
}

// ========================================================================
// Event stream
// ========================================================================

async fn collect(client: &EventStreamClient) -> Vec<StreamFrame> {
    let stream = client.subscribe(&query()).await.unwrap();
    stream.collect().await
}

#[tokio::test]
async fn test_event_stream_frames() {
    let body = concat!(
        ": keep-alive\n\n",
        "data: {\"order\": 0, \"context\": [{\"title\": \"Guide\", \"link\": \"/g\", \"type\": \"pdf\"}]}\n\n",
        "data: {\"order\": 1, \"reformulated\": \"MA public records deadline?\"}\r\n\r\n",
        "event: message\ndata: {\"order\": 2, \"message\": \"Ten business days.\"}\n\n",
    );
    let (url, server) = serve_once(sse_response(body)).await;

    let client = EventStreamClient::new(format!("{url}/ask-llm"));
    let frames = collect(&client).await;

    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0], StreamFrame::Open { status: 200 });
    let payloads: Vec<serde_json::Value> = frames[1..4]
        .iter()
        .map(|frame| match frame {
            StreamFrame::Event(event) => serde_json::from_str(&event.data).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        })
        .collect();
    assert_eq!(payloads[0]["context"][0]["title"], "Guide");
    assert_eq!(payloads[1]["reformulated"], "MA public records deadline?");
    assert_eq!(payloads[2]["message"], "Ten business days.");
    assert_eq!(frames[4], StreamFrame::Closed);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /ask-llm?prompt=Massachusetts&convoHistory="));
    assert!(request.contains("roleFilter=journalist"));
    assert!(request.contains("contentType=Public%20Records%20Law"));
    assert!(request.to_lowercase().contains("accept: text/event-stream"));
}

#[tokio::test]
async fn test_event_stream_query_param_name() {
    let (url, server) = serve_once(sse_response("")).await;

    let client = EventStreamClient::new(format!("{url}/ask-llm")).with_prompt_param("query");
    let frames = collect(&client).await;
    assert_eq!(frames, vec![StreamFrame::Open { status: 200 }, StreamFrame::Closed]);

    assert!(server.await.unwrap().starts_with("GET /ask-llm?query=Massachusetts&"));
}

#[tokio::test]
async fn test_event_stream_drops_unterminated_final_event() {
    let body = concat!(
        "data: {\"context\": []}\n\n",
        "data: {\"message\": \"cut off\"}",
    );
    let (url, _server) = serve_once(sse_response(body)).await;

    let frames = collect(&EventStreamClient::new(format!("{url}/ask-llm"))).await;
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], StreamFrame::Open { status: 200 });
    assert!(matches!(&frames[1], StreamFrame::Event(e) if e.data == "{\"context\": []}"));
    assert_eq!(frames[2], StreamFrame::Closed);
}

#[tokio::test]
async fn test_event_stream_refused() {
    let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    let (url, _server) = serve_once(response).await;

    let frames = collect(&EventStreamClient::new(format!("{url}/ask-llm"))).await;
    assert_eq!(frames, vec![StreamFrame::Open { status: 404 }]);
}

#[tokio::test]
async fn test_streamed_answer_through_dispatcher() {
    let body = concat!(
        "data: {\"context\": [{\"title\": \"Guide\", \"link\": \"/g\", \"content\": \"Deadlines\"}]}\n\n",
        "data: {\"message\": \"Ten business days.\"}\n\n",
    );
    let (url, _server) = serve_once(sse_response(body)).await;

    let mut settings = Settings::default();
    settings.backend.base_url = url;
    settings.backend.transport = TransportMode::Stream;
    let backend = HttpBackend::from_settings(&settings).unwrap();

    let session = std::sync::Arc::new(tokio::sync::Mutex::new(Session::with_role("journalist")));
    let dispatcher = QueryDispatcher::from_settings(session.clone(), std::sync::Arc::new(backend), &settings);

    dispatcher.dispatch("deadline?").await.unwrap().wait().await.unwrap();

    let session = session.lock().await;
    let last = session.transcript().last().unwrap();
    assert_eq!(last.content, "Ten business days.");
    let sources = last.results.as_ref().unwrap();
    assert_eq!(sources[0].summary, "Deadlines");
}
