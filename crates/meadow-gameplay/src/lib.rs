//! Gameplay rules layered on top of movement: proximity interactions, quest
//! progression, and the warmth stat.

pub mod interaction;
pub mod quest;
pub mod status;

pub use interaction::{
    Availability, Interactable, InteractableId, InteractionAction, InteractionManager,
    InteractionUpdate,
};
pub use quest::{
    ConditionKind, Quest, QuestEvent, QuestId, QuestStateMachine, QuestStatus, Reward, Step,
    StepId,
};
pub use status::{StatKind, StatUpdate, StatusTracker};
