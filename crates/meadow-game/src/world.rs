//! The demo meadow: rolling terrain, a few rocks and trees, a campfire, a
//! ranger who hands out a quest, and a signpost.

use glam::Vec3;
use meadow_gameplay::{ConditionKind, Interactable, InteractionAction, Quest, QuestId, Step};
use meadow_movement::{Aabb, HeightField};
use meadow_sim::SimContext;

/// Campfire location; also the heat source.
pub const CAMPFIRE: Vec3 = Vec3::new(12.0, 0.0, -12.0);

/// Where the ranger stands.
pub const RANGER: Vec3 = Vec3::new(0.0, 0.0, -4.0);

/// Id of the quest the ranger starts.
pub const KINDLING_QUEST: &str = "kindling";

/// Custom action fired by the campfire.
pub const FEED_FIRE: &str = "feed-fire";

/// Metric counting logs fed to the campfire.
pub const LOGS_BURNED: &str = "logs_burned";

/// Gentle hills over a 128 m square centred on the origin.
pub fn terrain() -> Option<HeightField> {
    HeightField::from_fn(-64.0, -64.0, 2.0, 65, 65, |x, z| {
        0.6 * (x * 0.08).sin() * (z * 0.06).cos()
    })
}

/// Rocks and tree trunks.
pub fn obstacles() -> Vec<Aabb> {
    vec![
        Aabb::from_center_half_extents(Vec3::new(-6.0, 0.5, -8.0), Vec3::new(1.2, 1.0, 1.0)),
        Aabb::from_center_half_extents(Vec3::new(8.0, 0.5, 3.0), Vec3::new(0.8, 1.0, 1.5)),
        Aabb::from_center_half_extents(Vec3::new(4.0, 3.0, -20.0), Vec3::new(0.4, 4.0, 0.4)),
        Aabb::from_center_half_extents(Vec3::new(-12.0, 3.0, 6.0), Vec3::new(0.4, 4.0, 0.4)),
    ]
}

fn kindling_quest() -> Quest {
    Quest::new(KINDLING_QUEST, "Kindling for the night")
        .with_step(Step::new(
            "reach-fire",
            "Find the campfire",
            ConditionKind::Location {
                center: CAMPFIRE,
                radius: 4.0,
            },
            1.0,
        ))
        .with_step(Step::new(
            "feed-fire",
            "Feed the fire three times",
            ConditionKind::Metric {
                name: LOGS_BURNED.into(),
            },
            3.0,
        ))
        .with_reward("warmth", 25)
}

/// Populates a freshly created context with the demo world.
pub fn populate(ctx: &mut SimContext) {
    ctx.obstacles.extend(obstacles());
    ctx.status.add_heat_source(CAMPFIRE);
    ctx.quests.register_locked(kindling_quest());

    ctx.interactions.register(
        Interactable::new(
            RANGER,
            3.0,
            "Talk to the ranger",
            InteractionAction::StartQuest(QuestId::new(KINDLING_QUEST)),
        )
        .auto(),
    );
    ctx.interactions.register(Interactable::new(
        CAMPFIRE,
        3.0,
        "Feed the fire",
        InteractionAction::Custom(FEED_FIRE.into()),
    ));
    ctx.interactions.register(Interactable::new(
        Vec3::new(-3.0, 0.0, 2.0),
        2.5,
        "Read the signpost",
        InteractionAction::Dialogue("Campfire: north-east. Lake: closed for winter.".into()),
    ));
}
