/*!
 * Per-key artifact state.
 *
 * Each translation or audio key moves through
 * `Idle -> Requesting -> {Cached, Failed}`, with `Idle -> Cached` when the
 * artifact is already available locally and `Failed -> Idle` when the user
 * retries. Every key owns a `watch` channel so subscribers see the latest
 * state without polling.
 */

use std::collections::HashMap;
use std::fmt;

use log::warn;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Lifecycle of one cached artifact
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArtifactState {
    /// Nothing requested yet in this session
    #[default]
    Idle,
    /// One external request is in flight
    Requesting,
    /// The artifact is available
    Cached,
    /// The last request failed; holds the error message
    Failed(String),
}

impl ArtifactState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: &ArtifactState) -> bool {
        use ArtifactState::*;
        matches!(
            (self, next),
            (Idle, Requesting)
                | (Idle, Cached)
                | (Requesting, Cached)
                | (Requesting, Failed(_))
                | (Failed(_), Idle)
                // Explicit regenerate or retranslate
                | (Cached, Requesting)
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Cached => "cached",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "failed: {}", message),
            other => f.write_str(other.label()),
        }
    }
}

/// Watch channels of every key seen in this session
#[derive(Debug, Default)]
pub struct StateBoard {
    channels: Mutex<HashMap<String, watch::Sender<ArtifactState>>>,
}

impl StateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a key; `Idle` when never touched
    pub fn get(&self, key: &str) -> ArtifactState {
        self.channels
            .lock()
            .get(key)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_default()
    }

    /// Receiver that observes every notified change of the key
    pub fn subscribe(&self, key: &str) -> watch::Receiver<ArtifactState> {
        let mut channels = self.channels.lock();
        channels
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(ArtifactState::Idle).0)
            .subscribe()
    }

    /// Move a key to `next` if the transition is legal
    ///
    /// With `notify == false` the state is still updated but receivers are
    /// not woken; they see the new value on their next read. Returns whether
    /// the transition was applied.
    pub fn transition(&self, key: &str, next: ArtifactState, notify: bool) -> bool {
        let mut channels = self.channels.lock();
        let sender = channels
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(ArtifactState::Idle).0);

        let mut applied = false;
        sender.send_if_modified(|state| {
            if !state.can_transition_to(&next) {
                return false;
            }
            *state = next.clone();
            applied = true;
            notify
        });

        if !applied {
            warn!("Ignoring illegal state transition for {}: {} -> {}", key, sender.borrow().label(), next.label());
        }
        applied
    }

    /// Mark a key as available, resetting a previous failure first
    pub fn mark_cached(&self, key: &str, notify: bool) {
        match self.get(key) {
            ArtifactState::Cached => {}
            ArtifactState::Failed(_) => {
                self.transition(key, ArtifactState::Idle, notify);
                self.transition(key, ArtifactState::Cached, notify);
            }
            _ => {
                self.transition(key, ArtifactState::Cached, notify);
            }
        }
    }

    /// Move a key into `Requesting`, resetting a previous failure first
    pub fn begin_request(&self, key: &str) -> bool {
        if self.get(key).is_failed() {
            self.transition(key, ArtifactState::Idle, true);
        }
        self.transition(key, ArtifactState::Requesting, true)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
