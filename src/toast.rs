//! Self-expiring user notifications.
//!
//! [`Toaster::show`] pushes a toast and schedules its removal after the display duration. An
//! explicit [`Toaster::dismiss`] removes it early and cancels the timer. Front ends either poll
//! [`Toaster::active`] or follow [`Toaster::subscribe`].
//!
//! Timers run as tokio tasks, so `show` must be called from within a Tokio runtime.

use crate::{ApiError, Sleeper, TokioSleeper};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ToastId(Uuid);

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
    #[serde(skip)]
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Shown(Toast),
    Dismissed(ToastId),
    Expired(ToastId),
}

#[derive(Debug, Default)]
struct Board {
    toasts: Vec<Toast>,
    timers: HashMap<ToastId, JoinHandle<()>>,
}

/// Shared notification list. Clones refer to the same list.
#[derive(Clone)]
pub struct Toaster {
    board: Arc<Mutex<Board>>,
    events: broadcast::Sender<ToastEvent>,
    sleeper: Arc<dyn Sleeper>,
    default_duration: Duration,
}

impl fmt::Debug for Toaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toaster")
            .field("active", &self.board().toasts.len())
            .field("default_duration", &self.default_duration)
            .finish_non_exhaustive()
    }
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Toaster {
    pub fn new(default_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            board: Arc::default(),
            events,
            sleeper: Arc::new(TokioSleeper),
            default_duration,
        }
    }

    /// Replace the sleeper that measures display lifetimes.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the toasts currently on display, oldest first.
    pub fn active(&self) -> Vec<Toast> {
        self.board().toasts.clone()
    }

    /// Show `message` for the default duration.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> ToastId {
        self.show(message, severity, self.default_duration)
    }

    pub fn show(&self, message: impl Into<String>, severity: Severity, duration: Duration) -> ToastId {
        let toast =
            Toast { id: ToastId(Uuid::new_v4()), message: message.into(), severity, duration };
        let id = toast.id;

        let expiry = {
            let board = Arc::clone(&self.board);
            let events = self.events.clone();
            let sleeper = Arc::clone(&self.sleeper);
            async move {
                sleeper.sleep(duration).await;
                let removed = {
                    let mut board = board.lock().unwrap_or_else(PoisonError::into_inner);
                    board.timers.remove(&id);
                    remove_toast(&mut board.toasts, id)
                };
                if removed {
                    let _ = events.send(ToastEvent::Expired(id));
                }
            }
        };

        {
            let mut board = self.board();
            board.toasts.push(toast.clone());
            board.timers.insert(id, tokio::spawn(expiry));
        }
        tracing::debug!(%id, severity = %toast.severity, message = %toast.message, "toast shown");
        let _ = self.events.send(ToastEvent::Shown(toast));
        id
    }

    /// Remove a toast before its timer runs out. Returns whether it was still displayed.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let removed = {
            let mut board = self.board();
            if let Some(timer) = board.timers.remove(&id) {
                timer.abort();
            }
            remove_toast(&mut board.toasts, id)
        };
        if removed {
            let _ = self.events.send(ToastEvent::Dismissed(id));
        }
        removed
    }

    /// Turn a terminal client failure into an error toast, unless it was a cancellation.
    pub fn handle_error(&self, error: &ApiError) -> Option<ToastId> {
        self.handle_error_for(error, self.default_duration)
    }

    pub fn handle_error_for(&self, error: &ApiError, duration: Duration) -> Option<ToastId> {
        let kind = error.message_kind();
        let Some(text) = kind.text() else {
            tracing::debug!(%error, "suppressing notification");
            return None;
        };
        Some(self.show(text, Severity::Error, duration))
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_toast(toasts: &mut Vec<Toast>, id: ToastId) -> bool {
    let before = toasts.len();
    toasts.retain(|t| t.id != id);
    toasts.len() != before
}
