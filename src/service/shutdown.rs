// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    /// operator asked to stop (SIGINT / SIGTERM)
    StopRequested,
    /// the remote end closed or dropped the connection
    PeerLost,
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<ShutdownState>,
    status: Notify,
}

/// Turns signals and connection loss into one stop condition shared by both
/// flows of a session, and carries status report requests.
///
/// The state leaves `Running` at most once; whichever cause comes first is
/// kept.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        ShutdownCoordinator {
            inner: Arc::new(Inner {
                state,
                status: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.inner.state.borrow()
    }

    /// Returns false when a stop cause was already recorded.
    pub fn request_stop(&self) -> bool {
        self.transition(ShutdownState::StopRequested)
    }

    /// Also wakes a flow blocked on local input.
    pub fn peer_lost(&self) -> bool {
        self.transition(ShutdownState::PeerLost)
    }

    fn transition(&self, next: ShutdownState) -> bool {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("shutdown state changed to {:?}", next);
        }
        changed
    }

    /// Never stops anything. Requests arriving while the previous one is not
    /// yet served collapse into one report.
    pub fn request_status(&self) {
        self.inner.status.notify_one();
    }

    pub async fn status_requested(&self) {
        self.inner.status.notified().await;
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown::new(self.inner.state.subscribe())
    }
}

/// One flow's view of the stop condition.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<ShutdownState>,
}

impl Shutdown {
    pub fn new(notify: watch::Receiver<ShutdownState>) -> Shutdown {
        Shutdown {
            is_shutdown: false,
            notify,
        }
    }
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown || *self.notify.borrow() != ShutdownState::Running
    }

    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }
        // a dropped coordinator counts as a stop
        let _ = self
            .notify
            .wait_for(|state| *state != ShutdownState::Running)
            .await;
        self.is_shutdown = true;
    }
}

#[cfg(unix)]
mod unix_signals {
    use tokio::signal::unix::SignalKind;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    const SIGURG: i32 = 23;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    const SIGURG: i32 = 16;

    pub(super) fn urgent_data() -> SignalKind {
        SignalKind::from_raw(SIGURG)
    }
}

/// Routes process signals into the coordinator until aborted.
///
/// SIGINT and SIGTERM request a stop, SIGUSR1 requests a status report,
/// SIGPIPE and SIGURG are swallowed so they never terminate the process.
#[cfg(unix)]
pub fn listen_for_signals(coordinator: ShutdownCoordinator) -> AppResult<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut user_defined = signal(SignalKind::user_defined1())?;
    let mut broken_pipe = signal(SignalKind::pipe())?;
    let mut urgent = signal(unix_signals::urgent_data())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = interrupt.recv() => {
                    info!("received SIGINT");
                    coordinator.request_stop();
                }
                Some(()) = terminate.recv() => {
                    info!("received SIGTERM");
                    coordinator.request_stop();
                }
                Some(()) = user_defined.recv() => {
                    coordinator.request_status();
                }
                Some(()) = broken_pipe.recv() => trace!("ignoring SIGPIPE"),
                Some(()) = urgent.recv() => trace!("ignoring SIGURG"),
                else => break,
            }
        }
        debug!("signal listener exited");
    }))
}

#[cfg(not(unix))]
pub fn listen_for_signals(coordinator: ShutdownCoordinator) -> AppResult<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C");
            coordinator.request_stop();
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    #[test]
    fn test_first_cause_wins() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.state(), ShutdownState::Running);

        assert!(coordinator.peer_lost());
        assert!(!coordinator.request_stop());
        assert!(!coordinator.peer_lost());
        assert_eq!(coordinator.state(), ShutdownState::PeerLost);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_stop() {
        let coordinator = ShutdownCoordinator::new();
        let mut shutdown = coordinator.subscribe();
        assert!(!shutdown.is_shutdown());

        let waiter = tokio::spawn(async move {
            shutdown.recv().await;
            shutdown.is_shutdown()
        });
        coordinator.request_stop();

        let woke = time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("subscriber was not woken")
            .unwrap();
        assert!(woke);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_prior_stop() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.peer_lost();

        let mut shutdown = coordinator.subscribe();
        assert!(shutdown.is_shutdown());
        time::timeout(Duration::from_millis(100), shutdown.recv())
            .await
            .expect("recv should return at once");
    }

    #[tokio::test]
    async fn test_status_request_does_not_stop() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.request_status();
        coordinator.request_status();

        time::timeout(Duration::from_millis(100), coordinator.status_requested())
            .await
            .expect("pending status request");
        assert_eq!(coordinator.state(), ShutdownState::Running);

        // both requests were collapsed into the one permit
        let second =
            time::timeout(Duration::from_millis(50), coordinator.status_requested()).await;
        assert!(second.is_err());
    }
}
