use application::session_service::SessionService;
use domain::models::RagStats;
use domain::session::{Message, DEFAULT_AGENT};
use domain::store::{Action, AppState, Store};
use std::sync::Arc;
use tests::ScriptedBackend;

#[tokio::test]
async fn bootstrap_creates_a_session_and_fetch_returns_it() {
    let backend = Arc::new(ScriptedBackend::new("sess-new"));
    let store = Store::new();
    let sessions = SessionService::new(backend.clone(), store.clone());

    let created = sessions.bootstrap(None).await.unwrap();
    assert_eq!(created.session_id, "sess-new");
    assert_eq!(store.snapshot().session_id.as_deref(), Some("sess-new"));

    let fetched = sessions.refresh().await.unwrap();
    assert_eq!(fetched.active_agent, DEFAULT_AGENT);
    assert_eq!(store.snapshot().active_agent, "ORCHESTRATOR");
    assert_eq!(backend.session_calls(), 2);
}

#[tokio::test]
async fn resuming_an_unknown_session_fails_and_leaves_the_store_empty() {
    let backend = Arc::new(ScriptedBackend::new("sess-1"));
    let store = Store::new();
    let sessions = SessionService::new(backend, store.clone());

    let err = sessions.bootstrap(Some("sess-gone")).await.unwrap_err();

    assert!(format!("{err:#}").contains("404"));
    assert!(store.snapshot().session_id.is_none());
}

#[tokio::test]
async fn resumed_session_carries_its_stats() {
    let backend = Arc::new(ScriptedBackend::new("sess-1"));
    let stats = RagStats {
        total_chunks: 31,
        indexed_documents: 2,
        mean_chars_per_chunk: 812.0,
        skipped_documents: Some(1),
        total_chars: Some(25172),
    };
    backend.set_session(|s| {
        s.total_docs = 2;
        s.active_agent = "PESQUISADOR".into();
        s.rag_stats = Some(stats.clone());
    });
    let store = Store::new();
    let sessions = SessionService::new(backend, store.clone());

    sessions.bootstrap(Some("sess-1")).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.active_agent, "PESQUISADOR");
    assert_eq!(state.rag_stats, Some(stats));
}

#[tokio::test]
async fn clear_empties_the_transcript_but_keeps_the_session() {
    let backend = Arc::new(ScriptedBackend::new("sess-9"));
    let store = Store::new();
    let sessions = SessionService::new(backend, store.clone());
    sessions.bootstrap(None).await.unwrap();
    store.dispatch(Action::AddMessage(Message::human("Olá")));
    store.dispatch(Action::AddMessage(Message::agent("Olá! Em que posso ajudar?")));

    let result = sessions.clear().await.unwrap();

    assert!(result.success);
    let state = store.snapshot();
    assert!(state.messages.is_empty());
    assert_eq!(state.session_id.as_deref(), Some("sess-9"));
}

#[tokio::test]
async fn refresh_and_clear_need_a_session() {
    let backend = Arc::new(ScriptedBackend::new("sess-1"));
    let sessions = SessionService::new(backend.clone(), Store::new());

    assert!(sessions.refresh().await.is_err());
    assert!(sessions.clear().await.is_err());
    assert_eq!(backend.session_calls(), 0);
}

#[tokio::test]
async fn reset_forgets_the_session() {
    let backend = Arc::new(ScriptedBackend::new("sess-1"));
    let store = Store::new();
    let sessions = SessionService::new(backend, store.clone());
    sessions.bootstrap(None).await.unwrap();
    store.dispatch(Action::SetActiveAgent("REDATOR".into()));

    sessions.reset();

    assert_eq!(store.snapshot(), AppState::default());
}
