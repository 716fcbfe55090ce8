//! services/api/src/web/ws_handler.rs
//!
//! Entry points and control loops for the quiz and presentation WebSocket
//! connections. Each connection owns one runtime; outgoing messages are queued
//! on a channel and written to the socket by a forwarding task.

use crate::web::{
    presentation_task::PresentationRuntime,
    protocol::{IntoFrame, PresentationClientMessage, QuizClientMessage},
    quiz_task::{run_clock, Flow, QuizRuntime},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Writes queued messages to the socket until the queue closes or the client goes away.
async fn forward_frames<M: IntoFrame>(
    mut outbox: mpsc::UnboundedReceiver<M>,
    mut sender: SplitSink<WebSocket, Message>,
) {
    while let Some(item) = outbox.recv().await {
        let Some(frame) = item.into_frame() else {
            continue;
        };
        if sender.send(frame).await.is_err() {
            warn!("Failed to write to socket; stopping forwarder.");
            break;
        }
    }
}

//=========================================================================================
// Quiz (/ws/quiz)
//=========================================================================================

pub async fn quiz_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_quiz_socket(socket, app_state, user_id))
}

async fn handle_quiz_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    if let Err((_, reason)) = app_state.current_user(user_id).await {
        warn!("Refusing quiz socket for {}: {}", user_id, reason);
        return;
    }
    info!("Quiz WebSocket connection established for user: {}", user_id);

    let (sender, mut receiver) = socket.split();
    let (outbox, queued) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_frames(queued, sender));

    let runtime = Arc::new(QuizRuntime::new(
        user_id,
        app_state.quizzes.clone(),
        app_state.drafts.clone(),
        app_state.grader.clone(),
        outbox,
    ));
    let autosave_every = Duration::from_secs(app_state.config.autosave_seconds);
    let token = CancellationToken::new();
    let mut clock: Option<JoinHandle<()>> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<QuizClientMessage>(text.as_str()) {
                Ok(client_msg) => match runtime.handle_message(client_msg).await {
                    Flow::Started if clock.is_none() => {
                        clock = Some(tokio::spawn(run_clock(
                            runtime.clone(),
                            token.clone(),
                            autosave_every,
                        )));
                    }
                    Flow::Finished => token.cancel(),
                    _ => {}
                },
                Err(e) => warn!("Failed to deserialize quiz message: {}", e),
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- Cleanup ---
    token.cancel();
    if let Some(handle) = clock {
        if let Err(e) = handle.await {
            error!("Quiz clock task failed: {:?}", e);
        }
    }
    if let Err(e) = runtime.autosave().await {
        error!("Final autosave failed for user {}: {}", user_id, e);
    }
    drop(runtime);
    let _ = forwarder.await;
    info!("Quiz WebSocket connection closed.");
}

//=========================================================================================
// Presentation (/ws/presentation)
//=========================================================================================

pub async fn presentation_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_presentation_socket(socket, app_state, user_id))
}

async fn handle_presentation_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    let user = match app_state.current_user(user_id).await {
        Ok(user) => user,
        Err((_, reason)) => {
            warn!("Refusing presentation socket for {}: {}", user_id, reason);
            return;
        }
    };
    info!("Presentation WebSocket connection established for user: {}", user_id);

    let (sender, mut receiver) = socket.split();
    let (outbox, queued) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_frames(queued, sender));

    let runtime = PresentationRuntime::new(
        user.role().is_staff(),
        app_state.lessons.clone(),
        app_state.translator.clone(),
        app_state.tts.clone(),
        outbox,
    );

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                match serde_json::from_str::<PresentationClientMessage>(text.as_str()) {
                    Ok(client_msg) => runtime.handle_message(client_msg).await,
                    Err(e) => warn!("Failed to deserialize presentation message: {}", e),
                }
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    drop(runtime);
    let _ = forwarder.await;
    info!("Presentation WebSocket connection closed.");
}
