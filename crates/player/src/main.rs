//! WordGrid Player - headless session client.

use std::ops::ControlFlow;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wordgrid_player::config::{load_dotenv, ClientConfig};
use wordgrid_player::console::{self, ConsoleCommand};
use wordgrid_player::identity::{ConnectParams, JoinIntent};
use wordgrid_player::infrastructure::storage::{SavedSession, SessionStorage};
use wordgrid_player::infrastructure::websocket::{ClientEvent, ConnectionNotice, SessionClient};
use wordgrid_shared::{PlayerId, SessionCode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(dir) = std::env::current_dir() {
        load_dotenv(&dir);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordgrid_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting WordGrid Player");

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let storage = SessionStorage::new();
    let saved = storage.load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable session storage");
        None
    });

    let (client, mut events) =
        SessionClient::spawn(config.server_url.clone(), config.retry, config.timings);

    let params = match restorable(&config, saved) {
        Some(params) => {
            tracing::info!(code = %params.code, player = %params.player_id, "Resuming saved session");
            client.resume(params.clone(), config.settle_delay);
            params
        }
        None => {
            let params = fresh_params(&config)?;
            tracing::info!(code = %params.code, player = %params.player_id, "Joining session");
            client.connect(params.clone());
            params
        }
    };

    let mut state = client.state();
    let mut last_phase = state.borrow().phase;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if run_command(command, &client, &storage).is_break() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("{}", e),
                },
                Ok(None) => {
                    tracing::info!("Input closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read input");
                    break;
                }
            },
            event = events.recv() => match event {
                Some(event) => {
                    if on_event(event, &params, &storage).is_break() {
                        break;
                    }
                }
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update();
                if snapshot.phase != last_phase {
                    tracing::info!(from = ?last_phase, to = ?snapshot.phase, timer = snapshot.timer, "Phase changed");
                    last_phase = snapshot.phase;
                } else {
                    tracing::debug!(
                        players = snapshot.players.len(),
                        timer = snapshot.timer,
                        frozen = snapshot.is_frozen(),
                        "Session state updated"
                    );
                }
                if let Some(result) = snapshot.word_result() {
                    tracing::debug!(word = %result.word, valid = result.valid, points = result.points, "Word result");
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    client.shutdown().await;
    tracing::info!("WordGrid Player stopped");
    Ok(())
}

/// The saved session, unless the environment asks for a different one.
fn restorable(config: &ClientConfig, saved: Option<SavedSession>) -> Option<ConnectParams> {
    let saved = saved?;
    if let Some(code) = config.session_code.as_deref() {
        match SessionCode::parse(code) {
            Ok(code) if code == saved.code => {}
            _ => return None,
        }
    }
    let params = ConnectParams {
        code: saved.code,
        player_id: saved.player_id,
        name: saved.name,
        avatar: saved.avatar,
        mode: config.mode,
    };
    Some(params.rejoin())
}

fn fresh_params(config: &ClientConfig) -> anyhow::Result<ConnectParams> {
    let Some(code) = config.session_code.clone() else {
        anyhow::bail!("no saved session; set WORDGRID_SESSION_CODE to join one");
    };
    let intent = JoinIntent {
        code,
        player_id: Some(PlayerId::generate()),
        name: config.player_name.clone().unwrap_or_default(),
        avatar: config.avatar.clone(),
        mode: config.mode,
        on_join_screen: false,
    };
    intent.connect_params().context("cannot join session")
}

fn run_command(
    command: ConsoleCommand,
    client: &SessionClient,
    storage: &SessionStorage,
) -> ControlFlow<()> {
    let commands = client.commands();
    let sent = match command {
        ConsoleCommand::Ready => commands.toggle_ready(),
        ConsoleCommand::Size(size) => commands.set_board_size(size.get()),
        ConsoleCommand::Powerup(kind) => commands.use_powerup(kind),
        ConsoleCommand::Reset => commands.reset_game(),
        ConsoleCommand::Again => commands.play_again(),
        ConsoleCommand::Trace(cells) => {
            let state = client.state();
            let state = state.borrow();
            if state.is_frozen() {
                tracing::info!("Board is frozen");
            } else if let Some(submission) =
                console::trace(&cells, &state.board, state.board_size, &*state, &commands)
            {
                tracing::info!(word = %submission.word, "Submitted word");
            }
            return ControlFlow::Continue(());
        }
        ConsoleCommand::Retry => {
            client.retry_now();
            return ControlFlow::Continue(());
        }
        ConsoleCommand::Leave => {
            client.disconnect();
            forget_session(storage);
            return ControlFlow::Break(());
        }
    };
    if let Err(e) = sent {
        tracing::warn!("Command not sent: {}", e);
    }
    ControlFlow::Continue(())
}

fn on_event(event: ClientEvent, params: &ConnectParams, storage: &SessionStorage) -> ControlFlow<()> {
    match event {
        ClientEvent::Connection(ConnectionNotice::Opened) => {
            tracing::info!(code = %params.code, "Connected to session");
            if let Err(e) = storage.save(&SavedSession::from(params)) {
                tracing::warn!(error = %e, "Failed to save session");
            }
        }
        ClientEvent::Connection(ConnectionNotice::Reconnecting { failures, delay }) => {
            tracing::warn!(failures, delay_ms = delay.as_millis() as u64, "Connection lost, reconnecting");
        }
        ClientEvent::Connection(ConnectionNotice::Rejected { code, reason }) => {
            tracing::error!(code, reason = %reason, "Session refused the connection");
            forget_session(storage);
            return ControlFlow::Break(());
        }
        ClientEvent::Connection(ConnectionNotice::RetriesExhausted { failures }) => {
            tracing::error!(failures, "Could not reach the session server; type `retry` to try again");
        }
        ClientEvent::Connection(ConnectionNotice::Closed) => {
            tracing::info!("Session closed by server; type `retry` to rejoin");
        }
        ClientEvent::SessionEnded { reason } => {
            tracing::error!(reason = %reason, "Session ended");
            forget_session(storage);
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

fn forget_session(storage: &SessionStorage) {
    if let Err(e) = storage.clear() {
        tracing::warn!(error = %e, "Failed to clear saved session");
    }
}
