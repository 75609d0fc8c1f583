//! Proximity interactions.
//!
//! Every tick the manager picks the nearest registered interactable whose own
//! range contains the player, reports availability transitions, and fires
//! auto-trigger interactables once per approach via a latch.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::quest::{QuestId, StepId};

// ---------------------------------------------------------------------------
// Interactables
// ---------------------------------------------------------------------------

/// Handle issued by [`InteractionManager::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractableId(pub u32);

/// What happens when an interactable fires. The simulation dispatches these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteractionAction {
    /// Show a line of dialogue.
    Dialogue(String),
    /// Activate a quest registered as locked.
    StartQuest(QuestId),
    /// Progress a quest step.
    AdvanceStep {
        /// Step to advance.
        step: StepId,
        /// Amount added to the step's current value.
        amount: f64,
    },
    /// Game-specific action identified by name.
    Custom(String),
}

/// A world object the player can interact with when close enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactable {
    /// World position.
    pub position: Vec3,
    /// Interaction range in metres.
    pub range: f32,
    /// Fire automatically on approach instead of waiting for `interact()`.
    pub auto_trigger: bool,
    /// Prompt text shown while available.
    pub label: String,
    /// Action dispatched on interaction.
    pub action: InteractionAction,
}

impl Interactable {
    /// Manual interactable at `position`.
    pub fn new(
        position: Vec3,
        range: f32,
        label: impl Into<String>,
        action: InteractionAction,
    ) -> Self {
        Self {
            position,
            range,
            auto_trigger: false,
            label: label.into(),
            action,
        }
    }

    /// Builder: fire on approach.
    pub fn auto(mut self) -> Self {
        self.auto_trigger = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Update output
// ---------------------------------------------------------------------------

/// New availability after the active interactable changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    /// An interactable is now in range.
    Available {
        /// Its handle.
        id: InteractableId,
        /// Its prompt text.
        label: String,
    },
    /// Nothing is in range any more.
    Unavailable,
}

/// Result of one [`InteractionManager::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionUpdate {
    /// Set when the active interactable changed this tick.
    pub availability: Option<Availability>,
    /// Set when an auto-trigger interactable fired this tick.
    pub triggered: Option<InteractableId>,
}

// ---------------------------------------------------------------------------
// InteractionManager
// ---------------------------------------------------------------------------

/// Tracks interactables and which one the player can currently use.
#[derive(Debug, Default)]
pub struct InteractionManager {
    entries: Vec<(InteractableId, Interactable)>,
    next_id: u32,
    active: Option<InteractableId>,
    latched: bool,
}

impl InteractionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interactable and returns its handle.
    pub fn register(&mut self, interactable: Interactable) -> InteractableId {
        let id = InteractableId(self.next_id);
        self.next_id += 1;
        debug!(id = id.0, label = %interactable.label, "interactable registered");
        self.entries.push((id, interactable));
        id
    }

    /// Removes an interactable. If it was active, availability becomes none
    /// on the next [`update`](Self::update).
    pub fn unregister(&mut self, id: InteractableId) -> Option<Interactable> {
        let index = self.entries.iter().position(|(e, _)| *e == id)?;
        Some(self.entries.remove(index).1)
    }

    /// Looks up an interactable by handle.
    pub fn get(&self, id: InteractableId) -> Option<&Interactable> {
        self.entries.iter().find(|(e, _)| *e == id).map(|(_, i)| i)
    }

    /// Currently active interactable, if it is still registered.
    pub fn active(&self) -> Option<InteractableId> {
        self.active.filter(|id| self.get(*id).is_some())
    }

    /// Number of registered interactables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest interactable whose range contains `position`. Ties go to the
    /// earliest registered.
    fn select(&self, position: Vec3) -> Option<InteractableId> {
        let mut best: Option<(InteractableId, f32)> = None;
        for (id, it) in &self.entries {
            let distance = it.position.distance(position);
            if distance > it.range {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((*id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Re-evaluate proximity from the player's `position`.
    pub fn update(&mut self, position: Vec3) -> InteractionUpdate {
        let mut out = InteractionUpdate::default();
        let selected = self.select(position);

        if selected != self.active {
            self.active = selected;
            self.latched = false;
            let entry = selected.and_then(|id| self.get(id).map(|it| (id, it)));
            out.availability = Some(match entry {
                Some((id, it)) => Availability::Available {
                    id,
                    label: it.label.clone(),
                },
                None => Availability::Unavailable,
            });
        }

        if let Some(id) = self.active
            && !self.latched
            && self.get(id).is_some_and(|it| it.auto_trigger)
        {
            self.latched = true;
            info!(id = id.0, "interactable auto-triggered");
            out.triggered = Some(id);
        }
        out
    }

    /// Manually use the active interactable. Not latched: every call fires.
    pub fn interact(&self) -> Option<InteractableId> {
        let id = self.active()?;
        info!(id = id.0, "interactable used");
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn talk(x: f32, range: f32, label: &str) -> Interactable {
        Interactable::new(
            Vec3::new(x, 0.0, 0.0),
            range,
            label,
            InteractionAction::Dialogue(label.to_string()),
        )
    }

    #[test]
    fn test_nearest_in_range_is_active() {
        let mut mgr = InteractionManager::new();
        let near = mgr.register(talk(40.0, 50.0, "near"));
        let _far = mgr.register(talk(90.0, 100.0, "far"));

        let update = mgr.update(Vec3::ZERO);
        assert_eq!(
            update.availability,
            Some(Availability::Available {
                id: near,
                label: "near".into()
            })
        );
        assert_eq!(mgr.active(), Some(near));
    }

    #[test]
    fn test_out_of_own_range_is_ignored() {
        let mut mgr = InteractionManager::new();
        let _short = mgr.register(talk(10.0, 5.0, "short"));
        let long = mgr.register(talk(30.0, 50.0, "long"));
        mgr.update(Vec3::ZERO);
        assert_eq!(mgr.active(), Some(long), "nearest is out of its own range");
    }

    #[test]
    fn test_availability_reported_only_on_change() {
        let mut mgr = InteractionManager::new();
        mgr.register(talk(2.0, 3.0, "sign"));

        assert!(mgr.update(Vec3::ZERO).availability.is_some());
        assert!(mgr.update(Vec3::new(0.5, 0.0, 0.0)).availability.is_none());
        assert_eq!(
            mgr.update(Vec3::new(-10.0, 0.0, 0.0)).availability,
            Some(Availability::Unavailable)
        );
        assert!(mgr.update(Vec3::new(-11.0, 0.0, 0.0)).availability.is_none());
    }

    #[test]
    fn test_auto_trigger_latches_until_active_changes() {
        let mut mgr = InteractionManager::new();
        let fire = mgr.register(talk(1.0, 2.0, "fire").auto());

        assert_eq!(mgr.update(Vec3::ZERO).triggered, Some(fire));
        for _ in 0..10 {
            assert_eq!(mgr.update(Vec3::ZERO).triggered, None, "latched");
        }

        mgr.update(Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(
            mgr.update(Vec3::ZERO).triggered,
            Some(fire),
            "leaving and returning re-arms"
        );
    }

    #[test]
    fn test_manual_interact_is_unlatched() {
        let mut mgr = InteractionManager::new();
        let sign = mgr.register(talk(1.0, 2.0, "sign"));
        assert_eq!(mgr.interact(), None, "nothing active yet");

        let update = mgr.update(Vec3::ZERO);
        assert_eq!(update.triggered, None, "manual interactables never auto-fire");
        assert_eq!(mgr.interact(), Some(sign));
        assert_eq!(mgr.interact(), Some(sign));
    }

    #[test]
    fn test_unregister_active_clears_next_tick() {
        let mut mgr = InteractionManager::new();
        let sign = mgr.register(talk(1.0, 2.0, "sign"));
        mgr.update(Vec3::ZERO);

        assert!(mgr.unregister(sign).is_some());
        assert_eq!(mgr.interact(), None);
        assert_eq!(
            mgr.update(Vec3::ZERO).availability,
            Some(Availability::Unavailable)
        );
        assert!(mgr.unregister(sign).is_none());
    }

    #[test]
    fn test_distance_is_three_dimensional() {
        let mut mgr = InteractionManager::new();
        mgr.register(Interactable::new(
            Vec3::new(0.0, 10.0, 0.0),
            3.0,
            "ledge",
            InteractionAction::Custom("ledge".into()),
        ));
        mgr.update(Vec3::ZERO);
        assert_eq!(mgr.active(), None);
    }
}
