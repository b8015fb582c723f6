//! WebSocket protocol integration tests.

mod common;

use std::time::Duration;

use anyhow::Result;
use lantern_llm::{ChatMessage, MockBackend, MockReply, Role};
use serde_json::json;

use common::tokens;

/// A reply long enough to still be streaming when the test reacts to it.
fn slow_reply() -> MockReply {
    MockReply::fragments(std::iter::repeat_n("word ", 40))
}

#[tokio::test]
async fn test_chat_streams_tokens_then_done() -> Result<()> {
    let backend = MockBackend::new(vec![MockReply::fragments(["Hel", "lo", "!"])]);
    let server = common::TestServer::start_with_backend(backend).await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "  hi there  ", "model": "llama3"}))
        .await?;
    let messages = ws.recv_until("done").await?;

    assert_eq!(tokens(&messages), "Hello!");
    assert_eq!(messages.len(), 4);

    let requests = server.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "llama3");
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].last_user_content(), Some("hi there"));

    Ok(())
}

#[tokio::test]
async fn test_history_carries_across_turns() -> Result<()> {
    let backend = MockBackend::new(vec![MockReply::text("first answer"), MockReply::text("second answer")]);
    let server = common::TestServer::start_with_backend(backend).await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "one"})).await?;
    ws.recv_until("done").await?;
    ws.send_json(json!({"type": "chat", "message": "two"})).await?;
    ws.recv_until("done").await?;

    let requests = server.backend.requests();
    assert_eq!(
        requests[1].messages[1..],
        [
            ChatMessage::user("one"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("two"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_client_history_replaces_session() -> Result<()> {
    let server = common::TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({
        "type": "chat",
        "message": "final",
        "history": [
            {"role": "system", "content": "ignored"},
            {"role": "user", "content": "earlier"},
            {"role": "assistant", "content": "reply"},
            {"role": "tool", "content": "dropped"},
            {"role": "user", "content": "draft"}
        ]
    }))
    .await?;
    ws.recv_until("done").await?;

    // Client entries are kept as sent; the typed message follows them.
    let requests = server.backend.requests();
    assert_eq!(
        requests[0].messages[1..],
        [
            ChatMessage::user("earlier"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("draft"),
            ChatMessage::user("final"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_client_history_ending_with_message_is_not_duplicated() -> Result<()> {
    let server = common::TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({
        "type": "chat",
        "message": "  next  ",
        "file_ids": null,
        "history": [
            {"role": "user", "content": "earlier"},
            {"role": "assistant", "content": "reply"},
            {"role": "user", "content": "next"}
        ]
    }))
    .await?;
    ws.recv_until("done").await?;

    let requests = server.backend.requests();
    assert_eq!(
        requests[0].messages[1..],
        [
            ChatMessage::user("earlier"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("next"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_client_history_last_user_takes_document_content() -> Result<()> {
    let server = common::TestServer::start().await?;
    let file_id = server.upload("memo.txt", b"Budget is 10k").await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({
        "type": "chat",
        "message": "How much?",
        "file_ids": [file_id],
        "history": [
            {"role": "user", "content": "hello"},
            {"role": "assistant", "content": "hi"},
            {"role": "user", "content": "How much?"}
        ]
    }))
    .await?;
    ws.recv_until("done").await?;

    let requests = server.backend.requests();
    assert_eq!(
        requests[0].messages[1..],
        [
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::user("[File: memo.txt]\nBudget is 10k\n\nUser question: How much?"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_stop_ends_stream_with_done() -> Result<()> {
    let backend = MockBackend::new(vec![slow_reply()]).with_fragment_delay(Duration::from_millis(20));
    let server = common::TestServer::start_with_backend(backend).await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "talk"})).await?;
    let first = ws.recv().await?;
    assert_eq!(first["type"], "token");

    ws.send_json(json!({"type": "stop"})).await?;
    let messages = ws.recv_until("done").await?;
    let streamed = tokens(&messages).len() + first["content"].as_str().unwrap_or_default().len();
    assert!(streamed < "word ".len() * 40, "stream should end early");

    // Nothing follows the done.
    assert!(ws.recv_within(Duration::from_millis(300)).await?.is_none());

    // The backend connection was released.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.backend.closed_streams(), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_is_silent() -> Result<()> {
    let server = common::TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "stop"})).await?;
    assert!(ws.recv_within(Duration::from_millis(200)).await?.is_none());

    ws.send_json(json!({"type": "chat", "message": "still here?"})).await?;
    let messages = ws.recv_until("done").await?;
    assert_eq!(tokens(&messages), "Test response");

    Ok(())
}

#[tokio::test]
async fn test_new_chat_supersedes_active_stream() -> Result<()> {
    let backend = MockBackend::new(vec![slow_reply(), MockReply::text("second")])
        .with_fragment_delay(Duration::from_millis(20));
    let server = common::TestServer::start_with_backend(backend).await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "first"})).await?;
    let first = ws.recv().await?;
    assert_eq!(first["type"], "token");

    ws.send_json(json!({"type": "chat", "message": "second"})).await?;
    ws.recv_until("done").await?;
    let messages = ws.recv_until("done").await?;
    assert_eq!(tokens(&messages), "second");

    // The interrupted reply stays in history as a partial answer.
    let requests = server.backend.requests();
    let partial = &requests[1].messages[2];
    assert_eq!(partial.role, Role::Assistant);
    assert!(partial.content.starts_with("word"));
    assert!(partial.content.len() < "word ".len() * 40);

    Ok(())
}

#[tokio::test]
async fn test_backend_failure_sends_error() -> Result<()> {
    let backend = MockBackend::new(vec![MockReply::FragmentsThenFail(
        vec!["par".to_string()],
        "connection reset".to_string(),
    )])
    .with_fallback(MockReply::text("recovered"));
    let server = common::TestServer::start_with_backend(backend).await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "go"})).await?;
    let messages = ws.recv_until("error").await?;
    assert_eq!(tokens(&messages), "par");
    let error = messages.last().cloned().unwrap_or_default();
    assert!(error["message"].as_str().unwrap_or_default().contains("inference backend"));

    // The failure is recorded and the connection keeps working.
    ws.send_json(json!({"type": "chat", "message": "again"})).await?;
    let messages = ws.recv_until("done").await?;
    assert_eq!(tokens(&messages), "recovered");

    let requests = server.backend.requests();
    let recorded = &requests[1].messages[2];
    assert_eq!(recorded.role, Role::Assistant);
    assert!(recorded.content.starts_with("Error: "));

    Ok(())
}

#[tokio::test]
async fn test_rejects_malformed_directives() -> Result<()> {
    let server = common::TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    ws.send_raw("{not json").await?;
    let reply = ws.recv().await?;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "Invalid JSON");

    ws.send_json(json!({"type": "dance"})).await?;
    assert_eq!(ws.recv().await?["message"], "Unknown type: dance");

    ws.send_json(json!({"type": "chat", "message": "   "})).await?;
    assert_eq!(ws.recv().await?["message"], "Empty message");

    ws.send_binary(vec![0xff, 0xfe, 0xfd]).await?;
    assert_eq!(ws.recv().await?["message"], "Invalid encoding");

    assert_eq!(server.backend.request_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_size_limits() -> Result<()> {
    let server = common::TestServer::start_with(MockBackend::with_text("ok"), |config| {
        config
            .with_max_ws_message_bytes(256)
            .with_max_message_length(20)
    })
    .await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "x".repeat(300)})).await?;
    assert_eq!(ws.recv().await?["message"], "Message too large");

    ws.send_json(json!({"type": "chat", "message": "y".repeat(21)})).await?;
    assert_eq!(ws.recv().await?["message"], "Message too long");

    // The connection survives rejected frames.
    ws.send_json(json!({"type": "chat", "message": "short"})).await?;
    let messages = ws.recv_until("done").await?;
    assert_eq!(tokens(&messages), "ok");
    assert_eq!(server.backend.request_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_chat_with_uploaded_file() -> Result<()> {
    let server = common::TestServer::start().await?;
    let file_id = server.upload("notes.txt", b"The launch code is 42").await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "chat", "message": "What is the code?", "file_id": file_id}))
        .await?;
    ws.recv_until("done").await?;

    let requests = server.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].last_user_content(),
        Some("[File: notes.txt]\nThe launch code is 42\n\nUser question: What is the code?")
    );

    ws.send_json(json!({"type": "chat", "message": "again", "file_ids": ["missing"]}))
        .await?;
    assert_eq!(ws.recv().await?["message"], "File not found: missing");

    Ok(())
}

#[tokio::test]
async fn test_multi_file_summary() -> Result<()> {
    let server = common::TestServer::start_with_backend(MockBackend::with_text("A summary")).await?;
    let first = server.upload("a.txt", b"first document").await?;
    let second = server.upload("b.csv", b"k,v\n1,2\n").await?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({"type": "multi_file_summary", "file_ids": [first, second]}))
        .await?;
    let messages = ws.recv_until("folder_done").await?;

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["type"], "folder_file");
    assert_eq!(messages[0]["name"], "a.txt");
    assert_eq!(messages[0]["summary"], "A summary");
    assert_eq!(messages[1]["name"], "b.csv");

    ws.send_json(json!({"type": "multi_file_summary", "file_ids": []})).await?;
    assert_eq!(ws.recv().await?["message"], "Missing file_ids");

    Ok(())
}

#[tokio::test]
async fn test_folder_summary_over_websocket() -> Result<()> {
    let server = common::TestServer::start_with_backend(MockBackend::with_text("Folder summary")).await?;
    let folder = server.temp_dir.path().join("reports");
    std::fs::create_dir_all(folder.join("deep"))?;
    std::fs::write(folder.join("top.txt"), "top level")?;
    std::fs::write(folder.join("deep").join("inner.txt"), "nested file")?;
    let mut ws = server.connect_ws().await?;

    ws.send_json(json!({
        "type": "folder_summary",
        "folder_path": folder.to_string_lossy(),
        "recursive": false
    }))
    .await?;
    let messages = ws.recv_until("folder_done").await?;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["name"], "top.txt");

    let empty = server.temp_dir.path().join("empty");
    std::fs::create_dir_all(&empty)?;
    ws.send_json(json!({"type": "folder_summary", "folder_path": empty.to_string_lossy()}))
        .await?;
    let messages = ws.recv_until("folder_done").await?;
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[0]["error"],
        "No supported files (.pdf, .docx, .txt, .csv) in this folder."
    );

    ws.send_json(json!({"type": "folder_summary", "folder_path": ""})).await?;
    assert_eq!(ws.recv().await?["message"], "Missing folder_path");

    Ok(())
}
