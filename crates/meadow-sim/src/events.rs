//! Typed UI event surface.
//!
//! Systems [`emit`](EventBus::emit) during the tick; [`flush`](EventBus::flush)
//! at the end of the tick hands each event to the subscribers of its
//! [`EventKind`] and moves it to the drain queue for pull-style consumers.
//! The drain queue keeps at most [`DRAIN_CAPACITY`] events; when nobody
//! drains, the oldest are dropped.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::debug;

use meadow_gameplay::{QuestId, Reward, StatKind, StepId};
use meadow_net::{ConnectionState, LeaveReason, PeerId};

/// Tag of a [`SimEvent`], used to route subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AvailabilityChanged,
    Dialogue,
    Custom,
    QuestStarted,
    QuestProgress,
    QuestComplete,
    StatUpdate,
    PeerJoined,
    PeerLeft,
    ConnectionChanged,
    StructurePlaced,
}

/// Something the UI may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// The interaction prompt changed; `None` hides it.
    AvailabilityChanged { label: Option<String> },
    /// An interactable produced a line of dialogue.
    Dialogue { text: String },
    /// An interactable fired a game-specific action.
    Custom { name: String },
    /// A locked quest became active.
    QuestStarted { quest: QuestId },
    /// A quest step advanced.
    QuestProgress {
        quest: QuestId,
        step: StepId,
        current: f64,
        target: f64,
    },
    /// A quest finished.
    QuestComplete {
        quest: QuestId,
        title: String,
        rewards: Vec<Reward>,
    },
    /// A displayed stat changed.
    StatUpdate { stat: StatKind, value: f32 },
    /// A remote player appeared.
    PeerJoined {
        peer: PeerId,
        display_name: Option<String>,
    },
    /// A remote player went away.
    PeerLeft { peer: PeerId, reason: LeaveReason },
    /// The room connection changed state.
    ConnectionChanged(ConnectionState),
    /// A structure was placed in the world.
    StructurePlaced { id: u64, kind: String },
}

impl SimEvent {
    /// Routing tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AvailabilityChanged { .. } => EventKind::AvailabilityChanged,
            Self::Dialogue { .. } => EventKind::Dialogue,
            Self::Custom { .. } => EventKind::Custom,
            Self::QuestStarted { .. } => EventKind::QuestStarted,
            Self::QuestProgress { .. } => EventKind::QuestProgress,
            Self::QuestComplete { .. } => EventKind::QuestComplete,
            Self::StatUpdate { .. } => EventKind::StatUpdate,
            Self::PeerJoined { .. } => EventKind::PeerJoined,
            Self::PeerLeft { .. } => EventKind::PeerLeft,
            Self::ConnectionChanged(_) => EventKind::ConnectionChanged,
            Self::StructurePlaced { .. } => EventKind::StructurePlaced,
        }
    }
}

/// Flushed events retained for [`EventBus::drain`].
pub const DRAIN_CAPACITY: usize = 256;

/// Subscriber callback.
pub type EventHandler = Box<dyn FnMut(&SimEvent)>;

/// Per-tick event queue with per-kind subscribers.
#[derive(Default)]
pub struct EventBus {
    pending: Vec<SimEvent>,
    delivered: VecDeque<SimEvent>,
    dropped: u64,
    handlers: FxHashMap<EventKind, Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every future event of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&SimEvent) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Queues an event for the next [`flush`](Self::flush).
    pub fn emit(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    /// Events queued but not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Delivers queued events to subscribers in emission order.
    pub fn flush(&mut self) {
        for event in self.pending.drain(..) {
            if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
                for handler in handlers.iter_mut() {
                    handler(&event);
                }
            }
            if self.delivered.len() >= DRAIN_CAPACITY
                && let Some(old) = self.delivered.pop_front()
            {
                self.dropped += 1;
                debug!(
                    kind = ?old.kind(),
                    dropped = self.dropped,
                    "Drain queue full; oldest event dropped"
                );
            }
            self.delivered.push_back(event);
        }
    }

    /// Takes every flushed event not drained yet, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.delivered.drain(..).collect()
    }

    /// Flushed events waiting for [`drain`](Self::drain).
    pub fn retained_len(&self) -> usize {
        self.delivered.len()
    }
}
