//! A builder pattern implementation for constructing the circulation
//! service: the record store, the circulation engine, the notification
//! worker pool and the scheduler, wired for cooperative shutdown.
//!
//! ## Key Design Points
//! - **Default Components**: sled-backed store, logging transport.
//! - **Customization**: the chat layer overrides the transport (and
//!   optionally supplies a credential verifier) via setter methods.
//! - **Lifecycle Management**:
//!   - `build()`: opens the store and assembles the engine.
//!   - `start_workers()`/`start_scheduler()`: launch the background loops.
//!   - `ready()`: finalizes construction and returns the running service.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let service = ServiceBuilder::init(config, shutdown_rx)
//!     .transport(my_chat_transport) // Optional override
//!     .build()?
//!     .start_workers()
//!     .start_scheduler()
//!     .ready()?;
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::info;

use crate::utils::task::spawn_task;
use crate::BackupManager;
use crate::CirculationEngine;
use crate::CirculationPolicy;
use crate::CredentialVerifier;
use crate::DispatchWorkerPool;
use crate::EngineConfig;
use crate::Error;
use crate::HealthChecker;
use crate::LoanScanner;
use crate::LoggingTransport;
use crate::LoginGuard;
use crate::NotificationDispatcher;
use crate::NotificationJob;
use crate::Result;
use crate::Scheduler;
use crate::SledCirculationStore;
use crate::Transport;

/// The assembled, running service. Ownership of the engine and dispatcher
/// is shared with the calling layer; the background loops stop when the
/// shutdown watch channel fires.
pub struct CirculationService {
    pub store: Arc<SledCirculationStore>,
    pub engine: Arc<CirculationEngine>,
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Present only when a credential verifier was supplied
    pub guard: Option<Arc<LoginGuard>>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl CirculationService {
    /// Blocks until every background loop has exited (after shutdown).
    pub async fn run(self) -> Result<()> {
        for handle in self.handles {
            handle.await?;
        }
        Ok(())
    }
}

pub struct ServiceBuilder {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    shutdown_signal: watch::Receiver<()>,

    store: Option<Arc<SledCirculationStore>>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
    engine: Option<Arc<CirculationEngine>>,
    guard: Option<Arc<LoginGuard>>,
    job_rx: Option<mpsc::UnboundedReceiver<NotificationJob>>,
    worker_heartbeat: Arc<AtomicU64>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl ServiceBuilder {
    /// Core initialization logic shared by all construction paths
    pub fn init(
        config: EngineConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            transport: Arc::new(LoggingTransport),
            verifier: None,
            shutdown_signal,
            store: None,
            dispatcher: None,
            engine: None,
            guard: None,
            job_rx: None,
            worker_heartbeat: Arc::new(AtomicU64::new(0)),
            handles: Vec::new(),
        }
    }

    /// Sets the outbound chat transport implementation
    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the credential verifier; without one the login guard is not
    /// constructed and `checkLogin` stays with the calling layer.
    pub fn verifier(
        mut self,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Opens the store and assembles engine, dispatcher and login guard.
    pub fn build(mut self) -> Result<Self> {
        let store = Arc::new(SledCirculationStore::open(&self.config.store.db_root_dir)?);
        let (dispatcher, job_rx) = NotificationDispatcher::new(store.clone(), &self.config.dispatch);
        let dispatcher = Arc::new(dispatcher);
        let engine = Arc::new(CirculationEngine::new(
            store.clone(),
            dispatcher.clone(),
            CirculationPolicy::from_config(&self.config.circulation),
        ));
        self.guard = self.verifier.clone().map(|verifier| {
            Arc::new(LoginGuard::new(verifier, dispatcher.clone(), &self.config.auth))
        });

        self.store = Some(store);
        self.dispatcher = Some(dispatcher);
        self.engine = Some(engine);
        self.job_rx = Some(job_rx);
        Ok(self)
    }

    /// Launches the notification worker pool.
    pub fn start_workers(mut self) -> Self {
        let store = self.store.clone().expect("build() must run before start_workers()");
        let dispatcher = self
            .dispatcher
            .clone()
            .expect("build() must run before start_workers()");
        let job_rx = self
            .job_rx
            .take()
            .expect("start_workers() may only run once");

        let mut pool = DispatchWorkerPool::new(
            job_rx,
            self.transport.clone(),
            store.clone(),
            store,
            dispatcher.limiter(),
            dispatcher.stats(),
            &self.config.dispatch,
            self.config.retry.transport,
            self.shutdown_signal.clone(),
        );
        self.worker_heartbeat = pool.heartbeat();
        spawn_task(
            "dispatch-worker-pool",
            move || async move { pool.run().await },
            Some(&mut self.handles),
        );
        self
    }

    /// Launches the time-driven scheduler.
    pub fn start_scheduler(mut self) -> Self {
        let store = self
            .store
            .clone()
            .expect("build() must run before start_scheduler()");
        let dispatcher = self
            .dispatcher
            .clone()
            .expect("build() must run before start_scheduler()");

        let scanner = Arc::new(LoanScanner::new(
            store.clone(),
            dispatcher.clone(),
            self.config.scheduler.due_soon_lookahead_days,
        ));
        let health = Arc::new(HealthChecker::new(
            store.clone(),
            dispatcher.clone(),
            dispatcher.stats(),
            self.worker_heartbeat.clone(),
            &self.config.dispatch,
        ));
        let backup = Arc::new(BackupManager::new(
            store,
            self.config.store.backup_dir.clone(),
            self.config.store.backup_retention_days,
        ));
        let mut scheduler = Scheduler::new(
            scanner,
            health,
            backup,
            dispatcher,
            self.config.scheduler,
            self.shutdown_signal.clone(),
        );
        spawn_task(
            "scheduler",
            move || async move { scheduler.run().await },
            Some(&mut self.handles),
        );
        self
    }

    /// Finalizes construction and returns the running service.
    pub fn ready(self) -> Result<CirculationService> {
        let store = self
            .store
            .ok_or_else(|| Error::Fatal("service built without a store".to_string()))?;
        let engine = self
            .engine
            .ok_or_else(|| Error::Fatal("service built without an engine".to_string()))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| Error::Fatal("service built without a dispatcher".to_string()))?;
        info!("circulation service ready");
        Ok(CirculationService {
            store,
            engine,
            dispatcher,
            guard: self.guard,
            handles: self.handles,
        })
    }
}
