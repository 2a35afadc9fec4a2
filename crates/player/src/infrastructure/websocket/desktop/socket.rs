//! One socket attempt, run as its own task.
//!
//! The task only forwards: every event it reports is tagged with the attempt
//! it was spawned for, and the driver decides whether the event still counts.
//! `Released` is always the last event a task sends.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::infrastructure::websocket::core::{
    AttemptId, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS_RECEIVED,
};

#[derive(Debug)]
pub(crate) enum SocketCommand {
    Send(String),
    Close(u16),
}

#[derive(Debug)]
pub(crate) enum SocketEvent {
    Opened,
    Text(String),
    Closed { code: u16, reason: String },
    Released,
}

pub(crate) type TaggedEvent = (AttemptId, SocketEvent);

pub(crate) async fn run_socket(
    attempt: AttemptId,
    url: Url,
    mut commands: mpsc::Receiver<SocketCommand>,
    events: mpsc::Sender<TaggedEvent>,
) {
    let emit = |event: SocketEvent| {
        let events = events.clone();
        async move {
            // The driver may already be gone during shutdown.
            let _ = events.send((attempt, event)).await;
        }
    };

    let connect = connect_async(url.as_str());
    tokio::pin!(connect);
    let stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    tracing::warn!(attempt = %attempt, error = %e, "Failed to connect to session server");
                    emit(SocketEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: e.to_string(),
                    })
                    .await;
                    emit(SocketEvent::Released).await;
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(SocketCommand::Send(_)) => {
                    tracing::debug!(attempt = %attempt, "Dropping frame queued before open");
                }
                Some(SocketCommand::Close(_)) | None => {
                    tracing::debug!(attempt = %attempt, "Connect abandoned");
                    emit(SocketEvent::Released).await;
                    return;
                }
            },
        }
    };

    emit(SocketEvent::Opened).await;
    let (mut write, mut read) = stream.split();

    let (code, reason) = loop {
        tokio::select! {
            command = commands.recv() => {
                let code = match command {
                    Some(SocketCommand::Send(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::warn!(attempt = %attempt, error = %e, "Failed to send frame");
                            break (ABNORMAL_CLOSURE, e.to_string());
                        }
                        continue;
                    }
                    Some(SocketCommand::Close(code)) => code,
                    None => NORMAL_CLOSURE,
                };
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    tracing::debug!(attempt = %attempt, error = %e, "Close frame not delivered");
                }
                let _ = write.close().await;
                break (code, String::new());
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => emit(SocketEvent::Text(text)).await,
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(attempt = %attempt, error = %e, "WebSocket error");
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, "connection closed".to_string()),
            },
        }
    };

    emit(SocketEvent::Closed { code, reason }).await;
    emit(SocketEvent::Released).await;
}
