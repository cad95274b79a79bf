//! HTTP + WebSocket server for the dialogue orchestrator
//!
//! `/ws/conversation` streams a live conversation; the REST endpoints
//! expose the transcript and lifecycle controls of the same orchestrator.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::DialogueError;
use crate::models::{SystemNotice, Turn};
use crate::orchestrator::ConversationOrchestrator;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: ConversationOrchestrator,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Conversation Endpoints
/// =============================

async fn conversation_history(State(state): State<ApiState>) -> Json<Vec<Turn>> {
    Json(state.orchestrator.history().await)
}

async fn export_conversation(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "conversation": state.orchestrator.export().await
    }))
}

async fn conversation_status(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.orchestrator.status().await))
}

async fn stop_conversation(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let was_active = state.orchestrator.is_active();
    state.orchestrator.stop();
    info!(was_active, "Stop requested via API");

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({ "was_active": was_active }))),
    )
}

/// =============================
/// WebSocket Conversation
/// =============================

async fn conversation_ws(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_conversation_socket(socket, state.orchestrator))
}

async fn handle_conversation_socket(socket: WebSocket, orchestrator: ConversationOrchestrator) {
    let (sender, receiver) = socket.split();
    drive_conversation(sender, receiver, &orchestrator).await;
    debug!("Conversation WebSocket closed");
}

/// Run one conversation over a client connection.
///
/// The first text frame is the seed prompt. Each turn is forwarded as JSON,
/// followed by an `end` notice when the conversation finishes. A `stop`
/// text frame stops the conversation cooperatively; disconnecting stops it
/// outright. Glue failures are reported with an `error` notice.
pub async fn drive_conversation<S, R>(
    mut sender: S,
    mut receiver: R,
    orchestrator: &ConversationOrchestrator,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let initial_prompt = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => {
                debug!("Client disconnected before sending a prompt");
                return;
            }
            Some(Err(err)) => {
                debug!("WebSocket receive error: {err}");
                return;
            }
            Some(Ok(_)) => {}
        }
    };

    info!(prompt_len = initial_prompt.len(), "Conversation requested via WebSocket");

    let mut turns = match orchestrator.start(initial_prompt).await {
        Ok(turns) => turns,
        Err(err) => {
            warn!(error = %err, "Could not start conversation");
            if let Err(send_err) = send_json(&mut sender, &SystemNotice::error(&err)).await {
                debug!("Failed to send error notice: {send_err}");
            }
            return;
        }
    };

    loop {
        tokio::select! {
            turn = turns.next() => match turn {
                Some(turn) => {
                    if let Err(err) = send_json(&mut sender, &turn).await {
                        warn!(error = %err, "Failed to deliver turn; stopping conversation");
                        orchestrator.stop();
                        if let Err(send_err) = send_json(&mut sender, &SystemNotice::error(&err)).await {
                            debug!("Failed to send error notice: {send_err}");
                        }
                        return;
                    }
                }
                None => {
                    if let Err(err) = send_json(&mut sender, &SystemNotice::end()).await {
                        debug!("Failed to send completion notice: {err}");
                    }
                    return;
                }
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) if text.trim().eq_ignore_ascii_case("stop") => {
                    info!("Stop requested via WebSocket");
                    orchestrator.stop();
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected");
                    orchestrator.stop();
                    return;
                }
                Some(Err(err)) => {
                    debug!("WebSocket receive error: {err}");
                    orchestrator.stop();
                    return;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn send_json<S, T>(sender: &mut S, payload: &T) -> crate::Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    T: Serialize,
{
    let json = serde_json::to_string(payload)?;
    sender
        .send(Message::Text(json))
        .await
        .map_err(|e| DialogueError::TransportError(e.to_string()))
}

/// =============================
/// Router
/// =============================

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_url else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request()),
        Err(err) => {
            warn!(%origin, error = %err, "Invalid FRONTEND_URL; allowing any origin");
            CorsLayer::permissive()
        }
    }
}

pub fn create_router(orchestrator: ConversationOrchestrator, frontend_url: Option<&str>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/ws/conversation", get(conversation_ws))
        .route("/conversation/history", get(conversation_history))
        .route("/conversation/export", get(export_conversation))
        .route("/conversation/status", get(conversation_status))
        .route("/conversation/stop", post(stop_conversation))
        .with_state(state)
        .layer(cors_layer(frontend_url))
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: ConversationOrchestrator,
    port: u16,
    frontend_url: Option<&str>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator, frontend_url);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("WebSocket: ws://127.0.0.1:{}/ws/conversation", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::generation::ScriptedGenerator;
    use crate::models::FailurePolicy;
    use crate::orchestrator::ConversationConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use futures::channel::mpsc;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn orchestrator(max_turns: usize, agents: Vec<Agent>) -> ConversationOrchestrator {
        ConversationOrchestrator::with_agents(
            ConversationConfig {
                max_turns,
                turn_delay: Duration::ZERO,
                failure_policy: FailurePolicy::Continue,
            },
            agents,
        )
    }

    fn pair() -> Vec<Agent> {
        vec![
            Agent::new("AgentX", "x", Arc::new(ScriptedGenerator::constant("Hi from X"))),
            Agent::new("AgentY", "y", Arc::new(ScriptedGenerator::constant("Hi from Y"))),
        ]
    }

    fn frames(outgoing: Vec<Message>) -> Vec<serde_json::Value> {
        outgoing
            .into_iter()
            .filter_map(|msg| match msg {
                Message::Text(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_socket_streams_turns_then_end_notice() {
        let orchestrator = orchestrator(3, pair());
        let (tx, rx) = mpsc::unbounded::<Message>();
        let incoming = futures::stream::iter(vec![Ok::<_, axum::Error>(Message::Text("Hello".to_string()))])
            .chain(futures::stream::pending());

        drive_conversation(tx, incoming, &orchestrator).await;

        let sent = frames(rx.collect().await);
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0]["agent"], "AgentX");
        assert_eq!(sent[1]["agent"], "AgentY");
        assert_eq!(sent[2]["message"], "Hi from X");
        assert_eq!(sent[3]["agent"], "System");
        assert_eq!(sent[3]["type"], "end");
        assert_eq!(sent[3]["timestamp"], "");
    }

    #[tokio::test]
    async fn test_socket_reports_configuration_error() {
        let orchestrator = orchestrator(3, pair().into_iter().take(1).collect());
        let (tx, rx) = mpsc::unbounded::<Message>();
        let incoming = futures::stream::iter(vec![Ok::<_, axum::Error>(Message::Text("Hello".to_string()))]);

        drive_conversation(tx, incoming, &orchestrator).await;

        let sent = frames(rx.collect().await);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "error");
        assert!(sent[0]["message"].as_str().unwrap().contains("at least 2 agents"));
    }

    #[tokio::test]
    async fn test_socket_disconnect_stops_conversation() {
        let slow = |name: &str| {
            Agent::new(
                name,
                "slow",
                Arc::new(ScriptedGenerator::constant("later").with_delay(Duration::from_millis(30))),
            )
        };
        let orchestrator = orchestrator(10, vec![slow("AgentX"), slow("AgentY")]);
        let (tx, _rx) = mpsc::unbounded::<Message>();
        // Prompt, then the client goes away
        let incoming = futures::stream::iter(vec![Ok::<_, axum::Error>(Message::Text("Hello".to_string()))]);

        drive_conversation(tx, incoming, &orchestrator).await;

        assert!(!orchestrator.is_active());
        for _ in 0..100 {
            if orchestrator.stop_reason().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(orchestrator.stop_reason().await.is_some());
        assert!(orchestrator.history().await.len() < 10);
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(orchestrator(1, pair()), None);
        let (status, body) = get_json(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_history_and_export_endpoints() {
        let orchestrator = orchestrator(2, pair());
        let _: Vec<Turn> = orchestrator.start("Hello").await.unwrap().collect().await;
        let router = create_router(orchestrator, Some("http://localhost:3000"));

        let (status, history) = get_json(router.clone(), "/conversation/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[0]["agent"], "AgentX");

        let (status, export) = get_json(router, "/conversation/export").await;
        assert_eq!(status, StatusCode::OK);
        let text = export["conversation"].as_str().unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().contains("] AgentY: Hi from Y"));
    }

    #[tokio::test]
    async fn test_stop_and_status_endpoints() {
        let router = create_router(orchestrator(2, pair()), None);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/conversation/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let (status, body) = get_json(router, "/conversation/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["state"], "idle");
        assert_eq!(body["data"]["agents"][1], "AgentY");
    }
}
