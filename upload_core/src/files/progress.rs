//! Cosmetic upload progress.
//!
//! The percentage is a heartbeat, not a byte count: while a gateway call is in
//! flight it climbs by `step` every `tick_interval` up to `ceiling`, jumps to
//! 100 only once the call succeeded, and drops back to 0 after `reset_delay`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const COMPLETE: u8 = 100;

/// Highest value the heartbeat may reach on its own.
pub const MAX_HEARTBEAT: u8 = COMPLETE - 1;

pub type ProgressListener = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSettings {
    pub tick_interval: Duration,
    pub step: u8,
    pub ceiling: u8,
    pub reset_delay: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            step: 10,
            ceiling: 90,
            reset_delay: Duration::from_millis(1000),
        }
    }
}

/// Progress owned by a single upload invocation.
#[derive(Clone)]
pub struct UploadProgress {
    state: Arc<watch::Sender<u8>>,
    settings: ProgressSettings,
    listener: Option<ProgressListener>,
}

impl UploadProgress {
    pub fn new(settings: ProgressSettings) -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            state: Arc::new(sender),
            settings,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Option<ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.state.subscribe()
    }

    pub fn current(&self) -> u8 {
        *self.state.borrow()
    }

    /// One heartbeat tick. Never lowers the value and never reaches 100.
    pub fn advance(&self) -> u8 {
        let ceiling = self.settings.ceiling.min(MAX_HEARTBEAT);
        let step = self.settings.step;
        let mut value = 0;

        let changed = self.state.send_if_modified(|current| {
            let next = current.saturating_add(step).min(ceiling).max(*current);
            value = next;
            if next != *current {
                *current = next;
                true
            } else {
                false
            }
        });

        if changed {
            self.notify(value);
        }
        value
    }

    pub fn complete(&self) {
        self.set(COMPLETE);
    }

    pub fn reset(&self) {
        self.set(0);
    }

    fn set(&self, value: u8) {
        let previous = self.state.send_replace(value);
        if previous != value {
            self.notify(value);
        }
    }

    fn notify(&self, value: u8) {
        if let Some(listener) = &self.listener {
            listener(value);
        }
    }

    /// Starts ticking in the background until the returned handle is stopped or dropped.
    pub fn start_heartbeat(&self) -> Heartbeat {
        let progress = self.clone();
        let period = self.settings.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                progress.advance();
            }
        });

        Heartbeat { handle: Some(handle) }
    }

    /// Returns the value to 0 once `reset_delay` has elapsed.
    pub fn schedule_reset(&self) -> JoinHandle<()> {
        let progress = self.clone();
        let delay = self.settings.reset_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            progress.reset();
        })
    }
}

pub struct Heartbeat {
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Aborts the ticker and waits for it so no tick lands after this returns.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
