//! Autoplay unlock handshake.
//!
//! Touch platforms keep a fresh context suspended until a sound is started from inside
//! a user gesture. [`UnlockMachine`] listens for the first qualifying gesture, plays the
//! scratch buffer from within it, and goes quiet once the context reports `running`.
//!
//! ```text
//!   arm() ──(no touch / already running)──────────────────────▶ Unlocked
//!     │
//!     └─ attempt() ──(running)─────────────────────────────────▶ Unlocked
//!          │
//!          └─(still suspended) listen ─▶ Locked ─gesture─▶ Unlocking ─(running)─▶ Unlocked
//!                                                          ▲   │
//!                                                          └───┘ (still suspended)
//! ```

use hashbrown::HashSet;
use tracing::{debug, info, trace};

use crate::graph::AudioGraph;
use crate::host::{AudioHost, ContextState, Gesture};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockState {
    Locked,
    Unlocking,
    /// Terminal
    Unlocked,
}

/// Explicit unlock state machine. Listener registration happens only as a side effect
/// of [`arm`](Self::arm) and of the transition to [`UnlockState::Unlocked`].
#[derive(Debug)]
pub struct UnlockMachine {
    state: UnlockState,
    listening: HashSet<Gesture>,
    armed: bool,
}

impl Default for UnlockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UnlockMachine {
    pub fn new() -> Self {
        Self {
            state: UnlockState::Locked,
            listening: HashSet::new(),
            armed: false,
        }
    }

    pub fn state(&self) -> UnlockState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == UnlockState::Unlocked
    }

    pub fn is_listening(&self, gesture: Gesture) -> bool {
        self.listening.contains(&gesture)
    }

    /// Decide whether unlocking is needed and, if so, start listening.
    ///
    /// Arming twice is a no-op.
    pub fn arm<H: AudioHost>(
        &mut self,
        host: &mut H,
        graph: &mut AudioGraph<H::Context>,
        gestures: &[Gesture],
    ) -> UnlockState {
        if self.armed {
            return self.state;
        }
        self.armed = true;

        if !host.has_touch_input() || graph.state() == Some(ContextState::Running) {
            debug!("audio playback not gated on a gesture");
            self.state = UnlockState::Unlocked;
            return self.state;
        }

        // setup may itself be running inside a gesture
        if self.attempt(host, graph) == UnlockState::Unlocked {
            return self.state;
        }

        for &gesture in gestures {
            if self.listening.insert(gesture) {
                host.add_gesture_listener(gesture);
            }
        }
        debug!(listeners = self.listening.len(), "waiting for a gesture to unlock audio");
        self.state
    }

    /// Play the probe sound and check whether the context started running.
    ///
    /// Must be called synchronously from the gesture's handler.
    pub fn attempt<H: AudioHost>(&mut self, host: &mut H, graph: &mut AudioGraph<H::Context>) -> UnlockState {
        if self.state == UnlockState::Unlocked {
            return self.state;
        }

        if let Err(err) = graph.play_probe_sound() {
            trace!(%err, "probe sound did not start");
        }

        if graph.state() == Some(ContextState::Running) {
            for gesture in self.listening.drain() {
                host.remove_gesture_listener(gesture);
            }
            self.state = UnlockState::Unlocked;
            info!("audio unlocked");
        } else {
            trace!(state = ?graph.state(), "context still suspended");
        }
        self.state
    }

    /// Handle a gesture event delivered by the host.
    ///
    /// Gestures nobody listens for are ignored.
    pub fn on_gesture<H: AudioHost>(
        &mut self,
        gesture: Gesture,
        host: &mut H,
        graph: &mut AudioGraph<H::Context>,
    ) -> UnlockState {
        if !self.listening.contains(&gesture) {
            return self.state;
        }
        if self.state == UnlockState::Locked {
            self.state = UnlockState::Unlocking;
        }
        self.attempt(host, graph)
    }
}
