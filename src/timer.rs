//! Cancellable one-shot timers and periodic tickers.
//!
//! A cancelled timer guarantees its callback has not run and will not run;
//! a `cancel` that returns `false` means the callback has already been
//! committed to execution (it may be in flight). Both paths race on the
//! same per-timer mutex so the two never observe a window where both
//! "cancelled" and "fired" are true.
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub type TimerCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;
pub type TickerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Pending,
    Fired,
    Cancelled,
}

struct TimerInner {
    state: Mutex<TimerState>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Handle returned by `schedule`. Clone freely; cancellation is shared.
#[derive(Clone)]
pub struct TimerHandle(Arc<TimerInner>);

struct TickerInner {
    cancelled: std::sync::atomic::AtomicBool,
    join: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct TickerHandle(Arc<TickerInner>);

impl TickerHandle {
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.0.join.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Wall-clock and scheduling primitive for the lifecycle/alert subsystems.
/// `now()` returns whole seconds since the epoch, matching the storage
/// model's timestamp resolution.
#[derive(Clone, Default)]
pub struct TimerService {
    epoch_base: Arc<AtomicU64>,
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            epoch_base: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn now(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    pub fn now_ms(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Fires `callback` once after `delay_ms` unless cancelled first.
    pub fn schedule<F, Fut>(&self, delay_ms: u64, callback: F) -> TimerHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState::Pending),
            join: Mutex::new(None),
        });
        let inner_for_task = inner.clone();

        let join = tokio::spawn(async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let should_run = {
                let mut state = inner_for_task.state.lock().unwrap();
                if *state == TimerState::Pending {
                    *state = TimerState::Fired;
                    true
                } else {
                    false
                }
            };
            if should_run {
                callback().await;
            }
        });
        *inner.join.lock().unwrap() = Some(join);

        TimerHandle(inner)
    }

    /// Schedules `callback` to run every `interval_ms` until cancelled.
    pub fn every<F, Fut>(&self, interval_ms: u64, callback: F) -> TickerHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::new(TickerInner {
            cancelled: std::sync::atomic::AtomicBool::new(false),
            join: Mutex::new(None),
        });
        let inner_for_task = inner.clone();
        let interval_ms = interval_ms.max(1);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if inner_for_task.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                callback().await;
            }
        });
        *inner.join.lock().unwrap() = Some(join);

        TickerHandle(inner)
    }

    /// Cancels a pending timer. Returns `true` iff the callback is
    /// guaranteed not to run.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        let mut state = handle.0.state.lock().unwrap();
        if *state == TimerState::Pending {
            *state = TimerState::Cancelled;
            drop(state);
            if let Some(join) = handle.0.join.lock().unwrap().take() {
                join.abort();
            }
            true
        } else {
            false
        }
    }
}

/// Boxes an async closure into a one-shot `TimerCallback`.
pub fn boxed<F, Fut>(f: F) -> TimerCallback
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as Pin<Box<dyn Future<Output = ()> + Send>>)
}
