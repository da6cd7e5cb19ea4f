//! warnetd - the cybercafe billing and session-lifecycle service
//!
//! This is the main entry point for warnetd. It wires together:
//! - Configuration loading
//! - Store initialization
//! - The session engine
//! - Boot-time recovery of crash-left sessions
//! - The IPC server and the 1 Hz ticker

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use warnet_api::{
    Audience, ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus,
    EndReason, Response, ResponsePayload,
};
use warnet_config::{load_settings, Settings};
use warnet_core::{Notifier, SessionEngine};
use warnet_ipc::{IpcServer, ServerMessage};
use warnet_store::{ActivityEntry, ActivityEvent, SqliteStore, Store};
use warnet_util::{default_config_path, ClientId, CustomerId, RateLimiter, WarnetError};

/// warnetd - billing and session lifecycle for cybercafe stations
#[derive(Parser, Debug)]
#[command(name = "warnetd")]
#[command(about = "Billing and session-lifecycle service for cybercafe stations", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set WARNET_SOCKET env var)
    #[arg(short, long, env = "WARNET_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set WARNET_DATA_DIR env var)
    #[arg(short, long, env = "WARNET_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Routes engine notifications onto the IPC transport.
struct IpcNotifier(Arc<IpcServer>);

impl Notifier for IpcNotifier {
    fn to_customer(&self, customer_id: CustomerId, event: EventPayload) {
        self.0.notify(Audience::Customer(customer_id), Event::new(event));
    }

    fn to_admins(&self, event: EventPayload) {
        self.0.notify(Audience::Admins, Event::new(event));
    }

    fn to_all(&self, event: EventPayload) {
        self.0.notify(Audience::All, Event::new(event));
    }
}

/// Main service state
struct Service {
    engine: SessionEngine,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
    settings: Settings,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration; a missing file means stock settings.
        let settings = if args.config.exists() {
            load_settings(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            info!(config_path = %args.config.display(), "No config file, using defaults");
            Settings::default()
        };

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| settings.daemon.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.daemon.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("warnetd.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_activity(ActivityEntry::new(ActivityEvent::DaemonStarted))?;

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;
        let ipc = Arc::new(ipc);

        info!(socket_path = %socket_path.display(), "IPC server started");

        let notifier: Arc<dyn Notifier> = Arc::new(IpcNotifier(ipc.clone()));
        let engine = SessionEngine::new(
            settings.billing,
            settings.session,
            store.clone(),
            notifier,
        );

        // 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            engine,
            ipc,
            store,
            rate_limiter,
            settings,
        })
    }

    async fn run(self) -> Result<()> {
        let Service {
            mut engine,
            ipc,
            store,
            rate_limiter,
            settings,
        } = self;

        // Reconcile crash-left sessions before the first tick, so a
        // freshly recovered registration never races the ticker.
        engine
            .recover(warnet_util::now())
            .context("Recovery pass failed")?;

        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        let engine = Arc::new(Mutex::new(engine));
        let rate_limiter = Arc::new(Mutex::new(rate_limiter));

        // Spawn IPC accept task
        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut tick_timer = tokio::time::interval(settings.session.tick_interval);

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Ticker: advance countdowns, process expiries
                _ = tick_timer.tick() => {
                    let now = warnet_util::now();
                    engine.lock().await.tick(now);
                }

                // IPC messages
                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&engine, &ipc, &store, &rate_limiter, msg).await;
                }
            }
        }

        // Graceful shutdown: cancel every live session, tell clients.
        info!("Shutting down warnetd");
        {
            let now = warnet_util::now();
            engine.lock().await.shutdown_all(now);
        }
        ipc.notify(Audience::All, Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_activity(ActivityEntry::new(ActivityEvent::DaemonStopped)) {
            warn!(error = %e, "Failed to journal daemon shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        engine: &Arc<Mutex<SessionEngine>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        rate_limiter: &Arc<Mutex<RateLimiter>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let response = Self::handle_command(
                    engine,
                    ipc,
                    store,
                    &client_id,
                    request.request_id,
                    request.command,
                )
                .await;

                let _ = ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );

                let _ = store.append_activity(ActivityEntry::new(ActivityEvent::ClientConnected {
                    client_id: client_id.to_string(),
                    role: format!("{:?}", info.role),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = store.append_activity(ActivityEntry::new(
                    ActivityEvent::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                ));

                let mut limiter = rate_limiter.lock().await;
                limiter.remove_client(&client_id);
            }
        }
    }

    async fn handle_command(
        engine: &Arc<Mutex<SessionEngine>>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = warnet_util::now();

        // Unknown connections get the least privileged role.
        let role = ipc
            .get_client_info(client_id)
            .await
            .map(|info| info.role)
            .unwrap_or(ClientRole::Observer);

        match command {
            Command::StartSession { customer_id } => {
                if !role.can_start_session() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Station role required"),
                    );
                }

                match engine.lock().await.start_session(customer_id, now) {
                    Ok(outcome) => Response::success(
                        request_id,
                        ResponsePayload::SessionStarted {
                            session_id: outcome.session_id,
                            balance: outcome.balance,
                            time_remaining: outcome.time_remaining,
                            converted: outcome.converted,
                        },
                    ),
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::EndSession {
                customer_id,
                reason,
            } => {
                if !role.can_end_session() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Station role required"),
                    );
                }

                let reason = reason.unwrap_or(EndReason::UserLogout);
                if reason == EndReason::AdminKick && !role.can_kick() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }

                match engine.lock().await.end_session(customer_id, reason, now) {
                    Ok(()) => Response::success(request_id, ResponsePayload::SessionEnded),
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::UpdateBalance {
                customer_id,
                new_balance,
            } => {
                if !role.can_update_balance() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }

                // Store first, then the live snapshot; the engine pushes
                // the fresh counters to the station itself.
                if let Err(e) = store.update_balance(customer_id, new_balance) {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::StoreError, e.to_string()),
                    );
                }
                engine.lock().await.update_balance(customer_id, new_balance);

                Response::success(
                    request_id,
                    ResponsePayload::BalanceUpdated {
                        customer_id,
                        balance: new_balance,
                    },
                )
            }

            Command::AttachCustomer { customer_id } => {
                // The IPC layer already bound the connection to the
                // customer's channel when it parsed the request.
                Response::success(request_id, ResponsePayload::Attached { customer_id })
            }

            Command::GetState => {
                let state = engine.lock().await.state_snapshot();
                Response::success(request_id, ResponsePayload::State(state))
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::GetHealth => {
                let health = HealthStatus {
                    live: true,
                    ready: true,
                    store_ok: store.is_healthy(),
                };
                Response::success(request_id, ResponsePayload::Health(health))
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

fn error_info(e: WarnetError) -> ErrorInfo {
    let code = match &e {
        WarnetError::CustomerNotFound(_) => ErrorCode::CustomerNotFound,
        WarnetError::InsufficientResources => ErrorCode::InsufficientResources,
        WarnetError::SessionAlreadyActive(_) => ErrorCode::SessionAlreadyActive,
        WarnetError::StoreError(_) => ErrorCode::StoreError,
        WarnetError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        WarnetError::RateLimited => ErrorCode::RateLimited,
        _ => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "warnetd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
