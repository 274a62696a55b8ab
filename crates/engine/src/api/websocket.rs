//! WebSocket session adapter.
//!
//! Translates inbound client actions into engine calls and engine output
//! into outbound events. Every use-case failure is recovered here into a
//! single `error` event; nothing crashes the connection task. Turn
//! serialization per story is this layer's job: a session handles one
//! inbound message at a time, and story/skeleton status checks reject
//! overlapping work.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use storyloom_domain::{NarrativeState, SkeletonStatus, StoryId, StoryStatus};
use storyloom_shared::{ClientMessage, OptionView, ServerMessage};

use crate::app::App;

/// Buffer size for the per-connection outbound channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// WebSocket upgrade handler - entry point for new connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(story_id): Path<Uuid>,
    State(app): State<Arc<App>>,
) -> Response {
    let story_id = StoryId::from_uuid(story_id);
    ws.on_upgrade(move |socket| handle_socket(socket, story_id, app))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, story_id: StoryId, app: Arc<App>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // All outbound traffic - responses, stream fragments, skeleton
    // notifications - funnels through one channel per connection.
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Relay skeleton generation events for this story.
    let mut events = app.notifier.subscribe(story_id);
    let event_tx = tx.clone();
    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    if event_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Skeleton event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tracing::info!(story_id = %story_id, "WebSocket connection established");

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_message(msg, story_id, &app, &tx).await,
                Err(e) => {
                    tracing::warn!(story_id = %story_id, error = %e, "Failed to parse message");
                    send_error(&tx, format!("Invalid message format: {e}")).await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong/binary
            Err(e) => {
                tracing::debug!(story_id = %story_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    send_task.abort();
    event_task.abort();
    tracing::info!(story_id = %story_id, "WebSocket disconnected");
}

async fn handle_message(
    msg: ClientMessage,
    story_id: StoryId,
    app: &Arc<App>,
    tx: &mpsc::Sender<ServerMessage>,
) {
    match msg {
        ClientMessage::StartStory => handle_start_story(story_id, app, tx).await,
        ClientMessage::Interact { option_id } => {
            handle_interact(story_id, &option_id, app, tx).await;
        }
        ClientMessage::ExplainText {
            selected_text,
            context_text,
            explanation_id,
        } => {
            handle_explain_text(story_id, &selected_text, &context_text, explanation_id, app, tx)
                .await;
        }
        ClientMessage::Unknown => send_error(tx, "Unsupported message type").await,
    }
}

async fn handle_start_story(story_id: StoryId, app: &Arc<App>, tx: &mpsc::Sender<ServerMessage>) {
    let story = match app.stories.get(story_id).await {
        Ok(Some(story)) => story,
        Ok(None) => return send_error(tx, "Story not found").await,
        Err(e) => return send_error(tx, e.to_string()).await,
    };
    if story.status.is_terminal() {
        return send_error(tx, "Story already finished.").await;
    }

    let skeleton = match app.skeletons.get_for_story(story_id).await {
        Ok(skeleton) => skeleton,
        Err(e) => return send_error(tx, e.to_string()).await,
    };

    match skeleton {
        Some(s) if s.status == SkeletonStatus::Completed => {
            if story.status == StoryStatus::Init {
                run_turn(story_id, app, tx).await;
            } else {
                // Reconnect mid-decision: replay the pending decision point
                // without generating anything.
                resend_decision_point(story_id, app, tx).await;
            }
        }
        Some(s) if s.status == SkeletonStatus::Generating => {
            send_error(tx, "Skeleton generation already in progress").await;
        }
        _ => {
            // No skeleton yet (or a failed one): run the generation
            // workflow detached. Progress flows back via the notifier.
            let generate = app.generate_skeleton.clone();
            tokio::spawn(async move {
                if let Err(e) = generate.execute(story_id).await {
                    tracing::error!(story_id = %story_id, error = %e, "Skeleton generation failed");
                }
            });
        }
    }
}

async fn handle_interact(
    story_id: StoryId,
    option_id: &str,
    app: &Arc<App>,
    tx: &mpsc::Sender<ServerMessage>,
) {
    match app.record_choice.execute(story_id, option_id).await {
        Ok(()) => run_turn(story_id, app, tx).await,
        Err(e) => send_error(tx, e.to_string()).await,
    }
}

async fn handle_explain_text(
    story_id: StoryId,
    selected_text: &str,
    context_text: &str,
    client_id: Option<String>,
    app: &Arc<App>,
    tx: &mpsc::Sender<ServerMessage>,
) {
    let explanation = match app
        .explain_text
        .create(story_id, selected_text, context_text)
        .await
    {
        Ok(explanation) => explanation,
        Err(e) => return send_error(tx, e.to_string()).await,
    };

    let explanation_id = explanation.id.to_string();
    send(
        tx,
        ServerMessage::ExplanationCreated {
            explanation_id: explanation_id.clone(),
            client_id,
        },
    )
    .await;

    let (fragment_tx, mut fragment_rx) = mpsc::unbounded_channel();
    let stream_tx = tx.clone();
    let stream_id = explanation_id.clone();
    let forward = tokio::spawn(async move {
        while let Some(content) = fragment_rx.recv().await {
            let msg = ServerMessage::ExplanationStream {
                explanation_id: stream_id.clone(),
                content,
            };
            if stream_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let result = app.explain_text.run(explanation, Some(fragment_tx)).await;
    let _ = forward.await;

    match result {
        Ok(done) => {
            send(
                tx,
                ServerMessage::ExplanationCompleted {
                    explanation_id,
                    explanation: done.explanation,
                },
            )
            .await;
        }
        Err(e) => send_error(tx, e.to_string()).await,
    }
}

/// Run one turn, forwarding fragments as they arrive, then send the final
/// update.
async fn run_turn(story_id: StoryId, app: &Arc<App>, tx: &mpsc::Sender<ServerMessage>) {
    let (fragment_tx, mut fragment_rx) = mpsc::unbounded_channel();
    let stream_tx = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(content) = fragment_rx.recv().await {
            if stream_tx
                .send(ServerMessage::StoryStream { content })
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let result = app.advance_story.execute(story_id, Some(fragment_tx)).await;
    // The sender dropped with the turn; drain the forwarder before the
    // final update so fragments never trail it.
    let _ = forward.await;

    match result {
        Ok(outcome) => {
            send(
                tx,
                ServerMessage::StoryUpdate {
                    content: Some(outcome.content),
                    status: outcome.status,
                    current_decision: outcome.current_decision,
                    options: outcome.options,
                },
            )
            .await;
        }
        Err(e) => send_error(tx, e.to_string()).await,
    }
}

/// Replay the pending decision point for a reconnecting client.
async fn resend_decision_point(story_id: StoryId, app: &Arc<App>, tx: &mpsc::Sender<ServerMessage>) {
    let (skeleton, entries, story) = match (
        app.skeletons.get_for_story(story_id).await,
        app.progress.list_for_story(story_id).await,
        app.stories.get(story_id).await,
    ) {
        (Ok(Some(skeleton)), Ok(entries), Ok(Some(story))) => (skeleton, entries, story),
        _ => return send_error(tx, "Story state unavailable").await,
    };

    let state = NarrativeState::derive(&skeleton.tree, &entries, story.cefr_level);
    let options: Vec<OptionView> = state
        .current_decision_point
        .as_deref()
        .and_then(|id| skeleton.tree.index().decision_point(id).ok())
        .map(|point| point.options.iter().map(OptionView::from).collect())
        .unwrap_or_default();

    send(
        tx,
        ServerMessage::SendDecisionPoint {
            current_decision: state.current_decision_point,
            options,
        },
    )
    .await;
}

async fn send(tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if tx.send(message).await.is_err() {
        tracing::debug!("Connection channel closed while sending");
    }
}

async fn send_error(tx: &mpsc::Sender<ServerMessage>, error: impl Into<String>) {
    send(tx, ServerMessage::Error {
        error: error.into(),
    })
    .await;
}
