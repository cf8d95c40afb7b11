//! Process wiring: builds every component from [`AppConfig`] and tears them
//! down in order.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use udplog_config::AppConfig;
use udplog_core::{
    EngineConfig, EntryForwarder, IntakeEngine, RetentionSweeper, SharedEngine,
};
use udplog_notify::TelegramNotifier;

use crate::error::{ServerError, ServerResult};
use crate::intake::{intake_channel, spawn_intake_worker};
use crate::listener::{AllowList, DatagramListener};
use crate::routes::create_router;
use crate::state::AppState;

/// Builder for the running service.
#[derive(Debug, Clone)]
pub struct LogServer {
    config: AppConfig,
    bind_ip: IpAddr,
}

impl LogServer {
    /// Creates a server for `config`, binding all interfaces.
    #[must_use]
    pub const fn new(config: AppConfig) -> Self {
        Self {
            config,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }

    /// Binds the UDP and HTTP sockets to `ip` instead of all interfaces.
    #[must_use]
    pub const fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Binds sockets and starts every background task.
    ///
    /// Nothing is spawned unless both sockets bind.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created, a socket
    /// cannot be bound, or the notifier client cannot be built.
    pub async fn start(self) -> ServerResult<RunningServer> {
        let config = self.config;

        let notifier = Arc::new(TelegramNotifier::from_settings(
            config.telegram_enabled,
            config.telegram_bot_token.as_deref(),
            config.telegram_chat_id.as_deref(),
        ));

        let mut engine_config = EngineConfig::new(config.max_memory_logs)
            .with_subscriber_queue_capacity(config.subscriber_queue_size);
        if let Some(dir) = config.persistence_dir() {
            engine_config = engine_config.with_log_dir(dir);
        }
        let mut engine = IntakeEngine::new(engine_config)?;
        if notifier.is_enabled() {
            engine = engine.with_forwarder(Arc::clone(&notifier) as Arc<dyn EntryForwarder>);
        }
        let engine: SharedEngine = Arc::new(engine);

        let (intake_tx, intake_rx) = intake_channel(config.ingest_queue_size);
        let udp_addr = SocketAddr::new(self.bind_ip, config.udp_port);
        let listener = DatagramListener::bind(
            udp_addr,
            AllowList::new(config.udp_whitelist.iter().cloned()),
            intake_tx,
        )
        .await?;
        let udp_addr = listener.local_addr().map_err(|e| ServerError::UdpBind(udp_addr, e))?;

        let http_addr = SocketAddr::new(self.bind_ip, config.web_port);
        let tcp = TcpListener::bind(http_addr)
            .await
            .map_err(|e| ServerError::HttpBind(http_addr, e))?;
        let http_addr = tcp.local_addr().map_err(|e| ServerError::HttpBind(http_addr, e))?;

        notifier.start()?;

        let intake = spawn_intake_worker(Arc::clone(&engine), intake_rx);

        let listener_cancel = CancellationToken::new();
        let listener_task = tokio::spawn(listener.run(listener_cancel.clone()));

        let sweeper_cancel = CancellationToken::new();
        let sweeper_task = if config.retention_enabled() {
            let sweeper = RetentionSweeper::new(&config.log_dir, config.keep_days);
            Some(tokio::spawn(
                sweeper.run(config.retention_interval(), sweeper_cancel.clone()),
            ))
        } else {
            None
        };

        let http_cancel = CancellationToken::new();
        let state = AppState::new(Arc::clone(&engine))
            .with_websocket_token(config.websocket_token.clone())
            .with_allowed_origins(config.allowed_origins.clone())
            .with_subscriber_queue_size(config.subscriber_queue_size)
            .with_shutdown(http_cancel.clone());
        let router = create_router(Arc::new(state));
        let http_shutdown = http_cancel.clone();
        let http_task = tokio::spawn(async move {
            axum::serve(tcp, router)
                .with_graceful_shutdown(http_shutdown.cancelled_owned())
                .await
        });

        info!(
            udp = %udp_addr,
            http = %http_addr,
            persistence = engine.persistence_enabled(),
            retention = sweeper_task.is_some(),
            telegram = notifier.is_enabled(),
            "udplog started"
        );

        Ok(RunningServer {
            engine,
            notifier,
            udp_addr,
            http_addr,
            sweeper_cancel,
            sweeper_task,
            listener_cancel,
            listener_task,
            intake,
            http_cancel,
            http_task,
        })
    }

    /// Runs until `shutdown` completes, then stops everything.
    ///
    /// # Errors
    ///
    /// Returns an error if startup fails or the HTTP server failed.
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.start().await?;
        shutdown.await;
        info!("shutdown requested");
        running.shutdown().await
    }
}

/// Handles to a started service.
#[derive(Debug)]
pub struct RunningServer {
    engine: SharedEngine,
    notifier: Arc<TelegramNotifier>,
    udp_addr: SocketAddr,
    http_addr: SocketAddr,
    sweeper_cancel: CancellationToken,
    sweeper_task: Option<JoinHandle<()>>,
    listener_cancel: CancellationToken,
    listener_task: JoinHandle<()>,
    intake: JoinHandle<u64>,
    http_cancel: CancellationToken,
    http_task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Bound UDP address.
    #[must_use]
    pub const fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Bound HTTP address.
    #[must_use]
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// The intake engine.
    #[must_use]
    pub const fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Stops every component.
    ///
    /// Order: sweeper and notifier worker, UDP listener, intake worker (after
    /// draining), HTTP server, log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server had failed.
    pub async fn shutdown(self) -> ServerResult<()> {
        self.sweeper_cancel.cancel();
        if let Some(task) = self.sweeper_task {
            if let Err(e) = task.await {
                warn!(error = %e, "retention sweeper ended abnormally");
            }
        }
        self.notifier.stop().await;

        self.listener_cancel.cancel();
        if let Err(e) = self.listener_task.await {
            warn!(error = %e, "UDP listener ended abnormally");
        }
        match self.intake.await {
            Ok(ingested) => info!(ingested, "intake drained"),
            Err(e) => warn!(error = %e, "intake worker ended abnormally"),
        }

        self.http_cancel.cancel();
        let served = match self.http_task.await {
            Ok(result) => result.map_err(ServerError::Serve),
            Err(e) => {
                warn!(error = %e, "HTTP server task ended abnormally");
                Ok(())
            }
        };

        if let Err(e) = self.engine.close() {
            warn!(error = %e, "failed to close log file");
        }
        info!("udplog stopped");
        served
    }
}
