//! End-to-end tests: client, session, and app against a live axum backend
//! backed by the fake provider on an ephemeral port.

mod common;

use std::sync::Arc;

use device_duel::app::{CompareOutcome, DuelApp, COMPARISON_FAILED_MESSAGE};
use device_duel::chat::{greeting_for, ChatMessage, ChatSession, SessionPhase, TurnOutcome};
use device_duel::client::ApiClient;
use device_duel::config::ChatConfig;
use device_duel::providers::{ChatFailure, FakeProvider, ProviderRole, ProviderTurn};

use common::{client_config, spawn_backend};

async fn app_for(provider: FakeProvider) -> DuelApp {
    let base_url = spawn_backend(provider).await;
    let client = Arc::new(ApiClient::new(&client_config(&base_url)).expect("client"));
    let session = Arc::new(ChatSession::new(client.clone(), &ChatConfig::default()));
    DuelApp::new(client, session)
}

#[tokio::test]
async fn test_compare_then_follow_up() {
    let provider = FakeProvider::new().with_reply(&["The Pixel 8 ", "takes better ", "photos."]);
    let app = app_for(provider.clone()).await;

    let CompareOutcome::Installed(result) = app.compare("Galaxy S24", "Pixel 8").await else {
        panic!("comparison should install");
    };
    assert_eq!(result.device_names(), ("Galaxy S24", "Pixel 8"));
    assert_eq!(
        app.session().history(),
        vec![ChatMessage::assistant(greeting_for(&result))]
    );

    let outcome = app.send("Which has the better camera?").await;

    assert_eq!(
        outcome,
        TurnOutcome::Completed("The Pixel 8 takes better photos.".to_string())
    );
    let history = app.session().history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1], ChatMessage::user("Which has the better camera?"));
    assert_eq!(
        history[2],
        ChatMessage::assistant("The Pixel 8 takes better photos.")
    );
    assert_eq!(app.session().phase(), SessionPhase::Idle);
    assert!(app.input_enabled());
}

#[tokio::test]
async fn test_second_turn_carries_first_turn_as_context() {
    let provider = FakeProvider::new().with_reply(&["Answer."]);
    let app = app_for(provider.clone()).await;
    app.compare("Galaxy S24", "Pixel 8").await;

    app.send("First?").await;
    app.send("Second?").await;

    let prompts = provider.chat_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].history.is_empty());
    assert_eq!(
        prompts[1].history,
        vec![
            ProviderTurn::new(ProviderRole::User, "First?"),
            ProviderTurn::new(ProviderRole::Model, "Answer."),
        ]
    );
    assert_eq!(prompts[1].message, "Second?");
}

#[tokio::test]
async fn test_mid_stream_failure_rolls_back_to_fallback() {
    let provider = FakeProvider::new()
        .with_reply(&["Partial answer ", "lost"])
        .with_chat_failure(ChatFailure::MidStream);
    let app = app_for(provider).await;
    app.compare("Galaxy S24", "Pixel 8").await;

    let outcome = app.send("Battery?").await;

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    let history = app.session().history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1], ChatMessage::user("Battery?"));
    assert_eq!(
        history[2],
        ChatMessage::assistant(ChatConfig::default().fallback_message)
    );
    assert!(app.input_enabled());
}

#[tokio::test]
async fn test_provider_failure_before_stream_rolls_back() {
    let provider = FakeProvider::new().with_chat_failure(ChatFailure::BeforeStream);
    let app = app_for(provider).await;
    app.compare("Galaxy S24", "Pixel 8").await;

    let outcome = app.send("Battery?").await;

    let TurnOutcome::Failed(cause) = outcome else {
        panic!("turn should fail");
    };
    assert!(cause.contains("Failed to get chat response from AI."));
    assert_eq!(
        app.session().history().last().map(|m| m.content.clone()),
        Some(ChatConfig::default().fallback_message)
    );
}

#[tokio::test]
async fn test_comparison_failure_reports_error() {
    let app = app_for(FakeProvider::new().failing_comparison()).await;

    let outcome = app.compare("Galaxy S24", "Pixel 8").await;

    assert!(matches!(outcome, CompareOutcome::Failed(_)));
    assert_eq!(app.error().as_deref(), Some(COMPARISON_FAILED_MESSAGE));
    assert!(app.comparison().is_none());
    assert!(app.session().history().is_empty());
    assert!(app.input_enabled());
}
