//! Bounded concurrency with a FIFO wait queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RouteLimits;
use crate::error::SwitchyardError;

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct LimiterState {
    in_flight: usize,
    queue: VecDeque<Waiter>,
    next_id: u64,
}

struct Shared {
    route: String,
    /// `None` means unbounded.
    max_concurrent: Option<usize>,
    max_queue_size: usize,
    /// `None` waits until granted or cancelled.
    queue_timeout: Option<Duration>,
    state: Mutex<LimiterState>,
}

/// At most `max_concurrent` holders of an [`AdmissionSlot`]; later callers
/// queue in arrival order.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    shared: Arc<Shared>,
}

enum Wait {
    Granted,
    TimedOut,
    Cancelled,
    Closed,
}

impl ConcurrencyLimiter {
    pub fn new(route: impl Into<String>, limits: &RouteLimits) -> Self {
        Self {
            shared: Arc::new(Shared {
                route: route.into(),
                max_concurrent: usize::try_from(limits.max_concurrent)
                    .ok()
                    .filter(|&n| n > 0),
                max_queue_size: limits.max_queue_size,
                queue_timeout: (limits.queue_timeout_ms > 0)
                    .then(|| Duration::from_millis(limits.queue_timeout_ms)),
                state: Mutex::new(LimiterState::default()),
            }),
        }
    }

    pub fn route(&self) -> &str {
        &self.shared.route
    }

    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Wait for a slot.
    ///
    /// Fails with `ServerBusy` when the queue is full, `QueueTimeout` when
    /// the wait exceeds the queue timeout and `ClientAborted` when `cancel`
    /// fires first. Dropping the returned future gives up the place in line.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AdmissionSlot, SwitchyardError> {
        let (id, mut granted) = {
            let mut state = self.shared.state.lock();
            let has_capacity = match self.shared.max_concurrent {
                None => true,
                Some(max) => state.in_flight < max && state.queue.is_empty(),
            };
            if has_capacity {
                state.in_flight += 1;
                return Ok(self.slot());
            }
            if state.queue.len() >= self.shared.max_queue_size {
                tracing::debug!(route = %self.shared.route, "admission queue full");
                return Err(SwitchyardError::ServerBusy {
                    route: self.shared.route.clone(),
                });
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_id;
            state.next_id += 1;
            state.queue.push_back(Waiter { id, grant: tx });
            (id, rx)
        };

        let mut place = QueuePlace {
            limiter: self,
            id,
            armed: true,
        };
        let started = Instant::now();
        let deadline = async {
            match self.shared.queue_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let wait = tokio::select! {
            biased;
            res = &mut granted => if res.is_ok() { Wait::Granted } else { Wait::Closed },
            _ = cancel.cancelled() => Wait::Cancelled,
            _ = deadline => Wait::TimedOut,
        };
        place.armed = false;

        let waited_ms = started.elapsed().as_millis() as u64;
        match wait {
            Wait::Granted => Ok(self.slot()),
            Wait::Closed => Err(SwitchyardError::ServerBusy {
                route: self.shared.route.clone(),
            }),
            Wait::TimedOut => {
                if self.leave_queue(id) {
                    tracing::debug!(route = %self.shared.route, waited_ms, "admission wait timed out");
                    Err(SwitchyardError::QueueTimeout {
                        route: self.shared.route.clone(),
                        waited_ms,
                    })
                } else {
                    Ok(self.slot())
                }
            }
            Wait::Cancelled => {
                if !self.leave_queue(id) {
                    self.release_one();
                }
                Err(SwitchyardError::ClientAborted)
            }
        }
    }

    fn slot(&self) -> AdmissionSlot {
        AdmissionSlot {
            limiter: Some(self.clone()),
            released: AtomicBool::new(false),
        }
    }

    /// Remove waiter `id`. False when it was already handed a slot.
    fn leave_queue(&self, id: u64) -> bool {
        let mut state = self.shared.state.lock();
        match state.queue.iter().position(|w| w.id == id) {
            Some(pos) => {
                state.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Pass one slot to the next live waiter, or free it.
    fn release_one(&self) {
        let mut state = self.shared.state.lock();
        while let Some(waiter) = state.queue.pop_front() {
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("route", &self.shared.route)
            .field("max_concurrent", &self.shared.max_concurrent)
            .field("max_queue_size", &self.shared.max_queue_size)
            .finish()
    }
}

/// A queued caller. Dropped while armed, it leaves the queue and returns a
/// slot it was handed in the meantime.
struct QueuePlace<'a> {
    limiter: &'a ConcurrencyLimiter,
    id: u64,
    armed: bool,
}

impl Drop for QueuePlace<'_> {
    fn drop(&mut self) {
        if self.armed && !self.limiter.leave_queue(self.id) {
            self.limiter.release_one();
        }
    }
}

/// Permission to run one request. Released on drop or by [`Self::release`],
/// exactly once.
pub struct AdmissionSlot {
    limiter: Option<ConcurrencyLimiter>,
    released: AtomicBool,
}

impl AdmissionSlot {
    /// A slot not backed by any limiter.
    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            released: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(limiter) = &self.limiter {
            limiter.release_one();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionSlot")
            .field("route", &self.limiter.as_ref().map(|l| l.route()))
            .field("released", &self.is_released())
            .finish()
    }
}
