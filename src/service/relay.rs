use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{listen_for_signals, AppResult, RelayConfig, ShutdownCoordinator};
use crate::network::{Establisher, Role};
use crate::session::{Session, SessionCounters};

/// One process worth of relaying: establish the connection for `role`, run
/// a duplex session between it and stdio, then tear down.
pub struct Relay {
    config: RelayConfig,
    role: Role,
    print_counters_on_exit: bool,
    counters: Arc<SessionCounters>,
    coordinator: ShutdownCoordinator,
}

impl Relay {
    pub fn new(config: RelayConfig, role: Role, print_counters_on_exit: bool) -> Self {
        Relay {
            config,
            role,
            print_counters_on_exit,
            counters: Arc::new(SessionCounters::new()),
            coordinator: ShutdownCoordinator::new(),
        }
    }

    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    pub fn coordinator(&self) -> ShutdownCoordinator {
        self.coordinator.clone()
    }

    pub fn start(&self, rt: &Runtime) -> AppResult<()> {
        rt.block_on(self.run())
    }

    /// Setup errors are returned. Everything that goes wrong once data flows
    /// only ends the session and still counts as a clean exit.
    pub async fn run(&self) -> AppResult<()> {
        let signals = listen_for_signals(self.coordinator.clone())?;
        let result = self.run_session().await;
        signals.abort();
        result?;

        if self.print_counters_on_exit {
            eprintln!("{}", self.counters.snapshot());
        }
        Ok(())
    }

    async fn run_session(&self) -> AppResult<()> {
        let establisher = Establisher::new(self.config.network.clone());
        let stream = match establisher.establish(&self.role, &self.coordinator).await? {
            Some(stream) => stream,
            None => {
                info!("stopped before a peer connected");
                return Ok(());
            }
        };

        let (reader, writer) = stream.into_split();
        let session = Session::new(
            Arc::clone(&self.counters),
            self.coordinator.clone(),
            &self.config.protocol,
        );
        let end = session
            .run(
                reader,
                writer,
                tokio::io::stdin(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            )
            .await;
        debug!("session finished: {:?}", end);
        Ok(())
    }
}
