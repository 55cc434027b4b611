//! `ApiClient` against an in-process fake of the agent API.

use application::chat_service::{ChatService, TurnOutcome};
use axum::body::Body;
use axum::extract::{Multipart, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domain::models::DocumentUpload;
use domain::store::{Action, Store};
use futures::stream::{self, StreamExt};
use infrastructure::api_client::{ApiClient, AGENT_HEADER};
use infrastructure::config::Config;
use infrastructure::error::ApiError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const SESSION: &str = "sess-api";

async fn create_session() -> Json<Value> {
    Json(json!({
        "session_id": SESSION,
        "total_docs": 0,
        "agente_ativo": "ORCHESTRATOR"
    }))
}

async fn fetch_session(Path(id): Path<String>) -> Response {
    if id != SESSION {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Session not found"}))).into_response();
    }
    Json(json!({
        "session_id": SESSION,
        "total_docs": 1,
        "agente_ativo": "ESTRUTURADOR",
        "active_doc_id": "gdoc-3",
        "rag_stats": {
            "total_chunks": 9,
            "documentos_indexados": 1,
            "media_chars_chunk": 702.5,
            "documentos_pulpados": 0,
            "total_chars": 6322
        }
    }))
    .into_response()
}

async fn upload(mut multipart: Multipart) -> Response {
    let mut session_id = None;
    let mut file = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("session_id") => session_id = field.text().await.ok(),
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
                file = Some((name, size));
            }
            _ => {}
        }
    }
    match (session_id.as_deref(), file) {
        (Some(SESSION), Some((name, size))) if name.ends_with(".txt") => Json(json!({
            "message": format!("{name} recebido"),
            "total_docs": 1,
            "rag_stats": {
                "total_chunks": 1,
                "documentos_indexados": 1,
                "media_chars_chunk": size as f64
            }
        }))
        .into_response(),
        (Some(SESSION), Some((name, _))) => Json(json!({
            "message": format!("{name} recebido"),
            "rag_error": "falha ao extrair texto"
        }))
        .into_response(),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, "missing fields").into_response(),
    }
}

async fn chat(Json(body): Json<Value>) -> Response {
    if body["message"] == "falha" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "modelo indisponível").into_response();
    }
    let chunks = stream::iter(["Olá, ", "como posso ajudar?"]).map(Ok::<_, std::io::Error>);
    Response::builder()
        .header(AGENT_HEADER, "ESTRUTURADOR")
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from_stream(chunks))
        .unwrap()
}

async fn clear(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let known = params.get("session_id").map(String::as_str) == Some(SESSION);
    Json(json!({"success": known}))
}

async fn spawn_api() -> ApiClient {
    let api = Router::new()
        .route("/session", post(create_session))
        .route("/session/{id}", get(fetch_session))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/clear", post(clear));
    let app = Router::new().nest("/api/v1", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = Config::default().with_api_base_url(format!("http://{addr}/api/v1/"));
    ApiClient::new(&config).unwrap()
}

#[tokio::test]
async fn session_round_trip() {
    let client = spawn_api().await;

    let created = client.create_session().await.unwrap();
    assert_eq!(created.session_id, SESSION);
    assert_eq!(created.active_agent, "ORCHESTRATOR");
    assert!(created.rag_stats.is_none());

    let fetched = client.fetch_session(SESSION).await.unwrap();
    assert_eq!(fetched.active_agent, "ESTRUTURADOR");
    assert_eq!(fetched.active_doc_id.as_deref(), Some("gdoc-3"));
    let stats = fetched.rag_stats.unwrap();
    assert_eq!(stats.indexed_documents, 1);
    assert_eq!(stats.skipped_documents, Some(0));
    assert_eq!(stats.total_chars, Some(6322));
}

#[tokio::test]
async fn unknown_session_is_a_status_error() {
    let client = spawn_api().await;

    let err = client.fetch_session("sess-nope").await.unwrap_err();

    let api_err = err.downcast_ref::<ApiError>().unwrap();
    assert_eq!(api_err.status(), Some(404));
    assert!(api_err.to_string().contains("Session not found"));
}

#[tokio::test]
async fn upload_sends_session_and_file_parts() {
    let client = spawn_api().await;

    let indexed = client
        .upload(SESSION, DocumentUpload::new("resumo.txt", b"Resumo do trabalho".to_vec()))
        .await
        .unwrap();
    assert_eq!(indexed.rag_stats.unwrap().mean_chars_per_chunk, 18.0);
    assert!(indexed.rag_error.is_none());

    let stored_only = client
        .upload(SESSION, DocumentUpload::new("scan.pdf", vec![0x25, 0x50, 0x44, 0x46]))
        .await
        .unwrap();
    assert_eq!(stored_only.rag_error.as_deref(), Some("falha ao extrair texto"));
    assert!(stored_only.rag_stats.is_none());
}

#[tokio::test]
async fn chat_exposes_agent_header_and_streams_body() {
    let client = spawn_api().await;

    let reply = client.chat(SESSION, "Olá Oráculo").await.unwrap();
    assert_eq!(reply.active_agent.as_deref(), Some("ESTRUTURADOR"));

    let body: Vec<u8> = reply
        .chunks
        .map(|chunk| chunk.unwrap().to_vec())
        .concat()
        .await;
    assert_eq!(String::from_utf8(body).unwrap(), "Olá, como posso ajudar?");
}

#[tokio::test]
async fn chat_server_error_carries_status_and_body() {
    let client = spawn_api().await;

    let err = match client.chat(SESSION, "falha").await {
        Ok(_) => panic!("expected an error"),
        Err(err) => err,
    };

    let api_err = err.downcast_ref::<ApiError>().unwrap();
    assert_eq!(api_err.status(), Some(500));
    assert!(api_err.to_string().contains("modelo indisponível"));
}

#[tokio::test]
async fn clear_passes_session_as_query() {
    let client = spawn_api().await;

    assert!(client.clear(SESSION).await.unwrap().success);
    assert!(!client.clear("other").await.unwrap().success);
}

#[tokio::test]
async fn chat_turn_end_to_end() {
    let client = Arc::new(spawn_api().await);
    let store = Store::new();
    store.dispatch(Action::SetSessionId(SESSION.to_string()));
    let chat = ChatService::new(client, store.clone(), Duration::from_secs(5));

    let outcome = chat.send_message("Olá Oráculo").await;

    assert_eq!(outcome, TurnOutcome::Completed { reply_chars: 23 });
    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, "Olá, como posso ajudar?");
    assert!(!state.messages[1].is_structured());
    assert_eq!(state.active_agent, "ESTRUTURADOR");
    assert_eq!(state.active_doc_id.as_deref(), Some("gdoc-3"));
    assert_eq!(state.rag_stats.map(|s| s.total_chunks), Some(9));
    assert!(!state.is_loading);
}
