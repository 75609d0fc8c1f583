//! Quest progression.
//!
//! A quest moves `Locked -> Active -> Complete`; each of its steps moves
//! `pending -> completed` once its current value reaches the target. Values
//! only grow and completion never reverts, so repeated or late updates are
//! harmless no-ops.

use std::fmt;

use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Quest identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestId(pub String);

impl QuestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Step identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Quest data
// ---------------------------------------------------------------------------

/// How a step's current value is sourced. Every kind completes the same way:
/// `current >= target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    /// Visit a location: reaching it sets the value to the target.
    Location {
        /// Centre of the goal area.
        center: Vec3,
        /// Radius of the goal area in metres.
        radius: f32,
    },
    /// Hold a number of some item.
    ItemCount {
        /// Item kind.
        item: String,
    },
    /// Reach a named numeric goal (distance walked, logs burned, ...).
    Metric {
        /// Metric name.
        name: String,
    },
    /// Reach a rank on a named track.
    Rank {
        /// Track name.
        track: String,
    },
}

/// One objective inside a quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub description: String,
    pub condition: ConditionKind,
    pub target: f64,
    pub current: f64,
    pub completed: bool,
}

impl Step {
    /// Pending step with a current value of zero.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        condition: ConditionKind,
        target: f64,
    ) -> Self {
        Self {
            id: StepId::new(id),
            description: description.into(),
            condition,
            target,
            current: 0.0,
            completed: false,
        }
    }

    /// Fraction of the target reached, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target <= 0.0 {
            1.0
        } else {
            (self.current / self.target).clamp(0.0, 1.0)
        }
    }
}

/// Reward granted on quest completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub kind: String,
    pub amount: u32,
}

/// A quest definition plus its step progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub steps: Vec<Step>,
    pub rewards: Vec<Reward>,
}

impl Quest {
    /// Quest with no steps or rewards yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: QuestId::new(id),
            title: title.into(),
            steps: Vec::new(),
            rewards: Vec::new(),
        }
    }

    /// Builder: append a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Builder: append a reward.
    pub fn with_reward(mut self, kind: impl Into<String>, amount: u32) -> Self {
        self.rewards.push(Reward {
            kind: kind.into(),
            amount,
        });
        self
    }

    /// `true` once every step is complete.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }

    /// First step that is not yet complete.
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| !s.completed)
    }
}

/// Lifecycle of a tracked quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestStatus {
    Locked,
    Active,
    Complete,
}

/// Emitted when a quest makes progress.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestEvent {
    /// A step advanced but the quest is not complete yet.
    StepProgress {
        quest: QuestId,
        step: StepId,
        current: f64,
        target: f64,
        completed: bool,
    },
    /// The last step completed.
    QuestComplete {
        quest: QuestId,
        title: String,
        rewards: Vec<Reward>,
    },
}

// ---------------------------------------------------------------------------
// QuestStateMachine
// ---------------------------------------------------------------------------

struct Tracked {
    quest: Quest,
    status: QuestStatus,
}

/// Owns every known quest and applies progress to active ones.
///
/// Quests are kept in the order they were first tracked; the active quest is
/// the earliest one still active.
#[derive(Default)]
pub struct QuestStateMachine {
    quests: Vec<Tracked>,
    index: FxHashMap<QuestId, usize>,
}

impl QuestStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, quest: Quest, status: QuestStatus) {
        self.index.insert(quest.id.clone(), self.quests.len());
        self.quests.push(Tracked { quest, status });
    }

    /// Tracks `quest` as locked so an interaction can start it later.
    /// Ignored when the id is already tracked.
    pub fn register_locked(&mut self, quest: Quest) -> bool {
        if self.index.contains_key(&quest.id) {
            debug!(quest = %quest.id, "quest already tracked; register ignored");
            return false;
        }
        self.track(quest, QuestStatus::Locked);
        true
    }

    /// Starts `quest`. A locked quest with the same id is activated (its
    /// registered definition wins); an active or complete one is left alone.
    ///
    /// Returns `true` if a quest became active.
    pub fn start_quest(&mut self, quest: Quest) -> bool {
        if self.index.contains_key(&quest.id) {
            return self.unlock(&quest.id);
        }
        let id = quest.id.clone();
        self.track(quest, QuestStatus::Locked);
        self.unlock(&id)
    }

    /// Activates a locked quest by id.
    pub fn unlock(&mut self, id: &QuestId) -> bool {
        let Some(tracked) = self.index.get(id).map(|&i| &mut self.quests[i]) else {
            debug!(quest = %id, "unknown quest; start ignored");
            return false;
        };
        if tracked.status != QuestStatus::Locked {
            debug!(quest = %id, status = ?tracked.status, "quest already started");
            return false;
        }
        if tracked.quest.is_complete() {
            // Nothing left to do: a quest without steps completes on start.
            tracked.status = QuestStatus::Complete;
            info!(quest = %id, "quest has no pending steps; completed on start");
            return false;
        }
        tracked.status = QuestStatus::Active;
        info!(quest = %id, title = %tracked.quest.title, "quest started");
        true
    }

    /// Adds `delta` to the first pending step named `step_id` in an active
    /// quest. Unknown or complete steps, locked quests, and non-positive
    /// deltas are no-ops.
    pub fn update_step(&mut self, step_id: &StepId, delta: f64) -> Option<QuestEvent> {
        if delta <= 0.0 || delta.is_nan() {
            debug!(step = %step_id, delta, "non-positive delta ignored");
            return None;
        }
        let found = self.quests.iter().enumerate().find_map(|(qi, t)| {
            if t.status != QuestStatus::Active {
                return None;
            }
            t.quest
                .steps
                .iter()
                .position(|s| s.id == *step_id && !s.completed)
                .map(|si| (qi, si))
        });
        match found {
            Some((qi, si)) => Some(self.advance(qi, si, delta)),
            None => {
                debug!(step = %step_id, "no pending step in an active quest; update ignored");
                None
            }
        }
    }

    /// Applies `delta` to step `si` of quest `qi`, which must be active and
    /// pending.
    fn advance(&mut self, qi: usize, si: usize, delta: f64) -> QuestEvent {
        let tracked = &mut self.quests[qi];
        let step = &mut tracked.quest.steps[si];
        step.current = (step.current + delta).min(step.target);
        if step.current >= step.target {
            step.completed = true;
        }
        let progress = QuestEvent::StepProgress {
            quest: tracked.quest.id.clone(),
            step: step.id.clone(),
            current: step.current,
            target: step.target,
            completed: step.completed,
        };

        if tracked.quest.is_complete() {
            tracked.status = QuestStatus::Complete;
            info!(quest = %tracked.quest.id, "quest complete");
            return QuestEvent::QuestComplete {
                quest: tracked.quest.id.clone(),
                title: tracked.quest.title.clone(),
                rewards: tracked.quest.rewards.clone(),
            };
        }
        debug!(event = ?progress, "quest step progressed");
        progress
    }

    /// Applies an absolute observation to every matching pending step of
    /// every active quest. `value_for` maps a condition to the observed value,
    /// or `None` when the condition does not apply.
    fn observe(&mut self, value_for: impl Fn(&ConditionKind, f64) -> Option<f64>) -> Vec<QuestEvent> {
        let mut pending = Vec::new();
        for (qi, tracked) in self.quests.iter().enumerate() {
            if tracked.status != QuestStatus::Active {
                continue;
            }
            for (si, step) in tracked.quest.steps.iter().enumerate() {
                if step.completed {
                    continue;
                }
                if let Some(value) = value_for(&step.condition, step.target) {
                    let delta = value - step.current;
                    if delta > 0.0 {
                        pending.push((qi, si, delta));
                    }
                }
            }
        }
        pending
            .into_iter()
            .map(|(qi, si, delta)| self.advance(qi, si, delta))
            .collect()
    }

    /// Completes location steps whose area contains `position`.
    pub fn observe_location(&mut self, position: Vec3) -> Vec<QuestEvent> {
        self.observe(|condition, target| match condition {
            ConditionKind::Location { center, radius } if center.distance(position) <= *radius => {
                Some(target)
            }
            _ => None,
        })
    }

    /// Sets item-count steps for `item` to `count`.
    pub fn observe_item_count(&mut self, item: &str, count: u32) -> Vec<QuestEvent> {
        self.observe(|condition, _| match condition {
            ConditionKind::ItemCount { item: wanted } if wanted == item => Some(f64::from(count)),
            _ => None,
        })
    }

    /// Sets metric steps named `name` to `value`.
    pub fn observe_metric(&mut self, name: &str, value: f64) -> Vec<QuestEvent> {
        self.observe(|condition, _| match condition {
            ConditionKind::Metric { name: wanted } if wanted == name => Some(value),
            _ => None,
        })
    }

    /// Sets rank steps on `track` to `rank`.
    pub fn observe_rank(&mut self, track: &str, rank: u32) -> Vec<QuestEvent> {
        self.observe(|condition, _| match condition {
            ConditionKind::Rank { track: wanted } if wanted == track => Some(f64::from(rank)),
            _ => None,
        })
    }

    /// Earliest-tracked active quest.
    pub fn active_quest(&self) -> Option<&Quest> {
        self.quests
            .iter()
            .find(|t| t.status == QuestStatus::Active)
            .map(|t| &t.quest)
    }

    /// First pending step of the active quest.
    pub fn current_step(&self) -> Option<&Step> {
        self.active_quest()?.current_step()
    }

    /// Status of a tracked quest.
    pub fn status(&self, id: &QuestId) -> Option<QuestStatus> {
        self.index.get(id).map(|&i| self.quests[i].status)
    }

    /// A tracked quest by id.
    pub fn quest(&self, id: &QuestId) -> Option<&Quest> {
        self.index.get(id).map(|&i| &self.quests[i].quest)
    }
}
