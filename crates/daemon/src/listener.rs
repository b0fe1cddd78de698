// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections and answers one request per connection without
//! blocking the engine loops.

use std::sync::Arc;

use gdx_adapters::{CliRunner, NotifyAdapter, SessionStore, SystemProbe, UsageSink};
use gdx_core::{Clock, JobId, SessionId};
use gdx_engine::Engine;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::protocol::{self, ErrorCode, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Listener task for accepting socket connections.
pub struct Listener<R, S, U, N, P, C: Clock> {
    socket: UnixListener,
    engine: Arc<Engine<R, S, U, N, P, C>>,
    shutdown: Arc<Notify>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl<R, S, U, N, P, C> Listener<R, S, U, N, P, C>
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    P: SystemProbe,
    C: Clock,
{
    pub fn new(
        socket: UnixListener,
        engine: Arc<Engine<R, S, U, N, P, C>>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            socket,
            engine,
            shutdown,
        }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&self.engine);
                    let shutdown = Arc::clone(&self.shutdown);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &engine, &shutdown).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection<R, S, U, N, P, C>(
    stream: UnixStream,
    engine: &Engine<R, S, U, N, P, C>,
    shutdown: &Notify,
) -> Result<(), ConnectionError>
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    P: SystemProbe,
    C: Clock,
{
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Clients poll Status and Health; keep those out of the info log.
    match &request {
        Request::Status { .. } | Request::Health { .. } | Request::Ping => {
            debug!(request = ?request, "received request")
        }
        Request::Submit {
            kind, session_id, ..
        } => info!(%kind, session_id = %session_id, "received submit"),
        _ => info!(request = ?request, "received request"),
    }

    let stop = matches!(request, Request::Shutdown);
    let response = handle_request(request, engine).await;
    debug!("Sending response: {:?}", response);

    // The reply goes out before the main loop starts tearing down.
    let written = protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await;
    if stop {
        shutdown.notify_one();
    }
    written?;
    Ok(())
}

/// Answer a single request. Shutdown is only acknowledged here; the caller
/// signals the main loop once the reply is written.
pub(crate) async fn handle_request<R, S, U, N, P, C>(
    request: Request,
    engine: &Engine<R, S, U, N, P, C>,
) -> Response
where
    R: CliRunner,
    S: SessionStore,
    U: UsageSink,
    N: NotifyAdapter,
    P: SystemProbe,
    C: Clock,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Submit {
            kind,
            session_id,
            game_json,
        } => match engine
            .submit(kind, SessionId::new(session_id), game_json)
            .await
        {
            Ok(job) => Response::Job { job },
            Err(e) => Response::from(e),
        },

        Request::Status { job_id } => match engine.status(&JobId::new(job_id.clone())) {
            Some(job) => Response::Job { job },
            None => Response::error(ErrorCode::NotFound, format!("job not found: {}", job_id)),
        },

        Request::Jobs => Response::Jobs {
            jobs: engine.jobs(),
        },

        Request::Cancel { job_id } => {
            let id = JobId::new(job_id.clone());
            if engine.status(&id).is_none() {
                return Response::error(ErrorCode::NotFound, format!("job not found: {}", job_id));
            }
            Response::Cancelled {
                cancelled: engine.cancel(&id),
                job_id,
            }
        }

        Request::Health { refresh } => {
            let report = if refresh {
                engine.refresh_health().await
            } else {
                engine.health().await
            };
            Response::Health {
                report: Box::new(report),
            }
        }

        Request::Shutdown => Response::ShuttingDown,
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
