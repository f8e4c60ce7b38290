use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Result of one refresh call: the new access token, or why it failed.
pub type RefreshOutcome = Result<String>;

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Outcome of [`RefreshCoordinator::begin`].
#[derive(Debug)]
pub enum Ticket<'a> {
    /// The caller owns the refresh and must settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is already running; [`Ticket::wait`] yields its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl Ticket<'_> {
    /// Await the leader's outcome. A leader that vanished reads as aborted.
    pub async fn wait(receiver: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
        receiver.await.unwrap_or(Err(GatewayError::RefreshAborted))
    }
}

/// Held by whoever performs the refresh. Dropping it unsettled (a cancelled
/// or panicking leader) releases every waiter with [`GatewayError::RefreshAborted`].
#[derive(Debug)]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Finish the refresh and release the queue. Returns how many waiters were woken.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.finish(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.finish(Err(GatewayError::RefreshAborted));
        }
    }
}

/// Keeps at most one refresh in flight and parks every other caller that hits
/// a 401 meanwhile. Waiters are released in arrival order.
///
/// The lock is never held across an await, so a plain mutex is enough.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket<'_> {
        let mut state = self.lock();
        match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    waiters: VecDeque::new(),
                };
                debug!("refresh started");
                Ticket::Leader(RefreshLease {
                    coordinator: self,
                    settled: false,
                })
            }
            RefreshState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                debug!(queued = waiters.len(), "request queued behind refresh");
                Ticket::Waiter(rx)
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers parked behind the running refresh.
    pub fn waiting(&self) -> usize {
        match &*self.lock() {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    fn finish(&self, outcome: RefreshOutcome) -> usize {
        let waiters = match std::mem::take(&mut *self.lock()) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };
        let released = waiters.len();
        for waiter in waiters {
            // receiver gone means that caller was dropped
            let _ = waiter.send(outcome.clone());
        }
        debug!(released, ok = outcome.is_ok(), "refresh settled");
        released
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
