//! Connectivity monitor.
//!
//! Tracks whether the client is online from platform "online"/"offline"
//! events, exposes a short-lived "just reconnected" flag for user-facing
//! messaging, and broadcasts transitions to subscribers such as the offline
//! queue's auto-sync task.

mod probe;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

pub use probe::{spawn_probe, ConnectivityProbe, HttpProbe, ProbeHandle};

const DEFAULT_RECONNECT_WINDOW: Duration = Duration::from_secs(5);
const TRANSITION_CAPACITY: usize = 64;

/// Platform-level connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl From<bool> for ConnectivityEvent {
    fn from(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// An observed change of connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    WentOnline,
    WentOffline,
}

#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// How long `was_offline` stays set after a reconnect.
    pub reconnect_window: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            reconnect_window: DEFAULT_RECONNECT_WINDOW,
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    online: bool,
    reconnected_at: Option<Instant>,
}

/// Observational connectivity state. Never fails and never blocks on I/O.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: Mutex<MonitorState>,
    transitions: broadcast::Sender<ConnectivityTransition>,
    config: ConnectivityConfig,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded with the platform's current state.
    pub fn new(initially_online: bool) -> Self {
        Self::with_config(initially_online, ConnectivityConfig::default())
    }

    pub fn with_config(initially_online: bool, config: ConnectivityConfig) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            state: Mutex::new(MonitorState {
                online: initially_online,
                reconnected_at: None,
            }),
            transitions,
            config,
        }
    }

    /// Create a monitor seeded from a single probe check.
    pub async fn detect<P: ConnectivityProbe>(probe: &P) -> Self {
        Self::new(probe.check().await)
    }

    pub fn is_online(&self) -> bool {
        self.lock_state().online
    }

    /// True within the reconnect window that follows an offline→online
    /// transition. The window is not renewed by further transitions inside it.
    pub fn was_offline(&self) -> bool {
        self.lock_state()
            .reconnected_at
            .is_some_and(|at| at.elapsed() < self.config.reconnect_window)
    }

    /// Receive every transition observed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityTransition> {
        self.transitions.subscribe()
    }

    pub fn set_online(&self, online: bool) -> Option<ConnectivityTransition> {
        self.handle_event(ConnectivityEvent::from(online))
    }

    /// Apply a platform event. Returns the transition it caused, if any;
    /// events that repeat the current state are ignored.
    pub fn handle_event(&self, event: ConnectivityEvent) -> Option<ConnectivityTransition> {
        let online = event == ConnectivityEvent::Online;
        let transition = {
            let mut state = self.lock_state();
            if state.online == online {
                return None;
            }
            state.online = online;

            if online {
                let window_open = state
                    .reconnected_at
                    .is_some_and(|at| at.elapsed() < self.config.reconnect_window);
                if !window_open {
                    state.reconnected_at = Some(Instant::now());
                }
                ConnectivityTransition::WentOnline
            } else {
                ConnectivityTransition::WentOffline
            }
        };

        match transition {
            ConnectivityTransition::WentOnline => tracing::info!("Connectivity restored"),
            ConnectivityTransition::WentOffline => tracing::info!("Connectivity lost"),
        }
        // No subscribers is fine; the state change above already happened.
        let _ = self.transitions.send(transition);
        Some(transition)
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
