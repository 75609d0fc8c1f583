//! Headless Meadow demo.
//!
//! Runs two clients in one process on a loopback room: the local player
//! follows a short script (talk to the ranger, walk to the campfire, feed it,
//! build a lean-to), while a companion wanders in a circle. Both see each
//! other through the same sync path a networked client uses.
//!
//! Run with: `cargo run -p meadow-game -- --name Ada --ticks 900`

mod world;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use glam::{Vec2, Vec3};
use meadow_config::{CliArgs, Config, default_config_dir};
use meadow_gameplay::{QuestId, QuestStatus};
use meadow_movement::{Aabb, FlatGround, GroundQuery, MovementInput};
use meadow_net::{LoopbackHub, PeerId};
use meadow_sim::{
    EventKind, NullStore, PersistenceStore, RonFileStore, SimContext, SimEvent, Simulation,
};
use tracing::{debug, info, warn};

/// Fixed demo timestep (60 Hz).
const DT: f32 = 1.0 / 60.0;

/// CLI arguments for the demo binary.
#[derive(Parser, Debug)]
#[command(name = "meadow", about = "Headless Meadow demo: two clients, one room")]
struct GameArgs {
    #[command(flatten)]
    common: CliArgs,

    /// Number of 60 Hz ticks to simulate.
    #[arg(long, default_value_t = 900)]
    ticks: u32,

    /// Directory for saved positions and structures (nothing is saved if
    /// omitted).
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

fn ground() -> Box<dyn GroundQuery> {
    match world::terrain() {
        Some(field) => Box::new(field),
        None => Box::new(FlatGround::at(0.0)),
    }
}

fn store(save_dir: Option<&PathBuf>) -> Box<dyn PersistenceStore> {
    let Some(dir) = save_dir else {
        return Box::new(NullStore);
    };
    match RonFileStore::open(dir) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "Falling back to no persistence");
            Box::new(NullStore)
        }
    }
}

/// Steers the local player toward `target`, in camera space for the default
/// camera (yaw 0: forward is -Z, right is +X).
fn steer(from: Vec3, target: Vec3) -> MovementInput {
    let to = Vec2::new(target.x - from.x, target.z - from.z);
    if to.length() < 1.0 {
        return MovementInput::default();
    }
    MovementInput {
        direction: Vec2::new(to.x, -to.y).normalize(),
        ..Default::default()
    }
}

fn log_event(who: &str, event: &SimEvent) {
    match event {
        SimEvent::AvailabilityChanged { label: Some(label) } => info!(who, %label, "Prompt"),
        SimEvent::AvailabilityChanged { label: None } => {}
        SimEvent::Dialogue { text } => info!(who, %text, "Dialogue"),
        SimEvent::QuestStarted { quest } => info!(who, %quest, "Quest started"),
        SimEvent::QuestProgress {
            quest,
            step,
            current,
            target,
        } => info!(who, %quest, %step, current, target, "Quest progress"),
        SimEvent::QuestComplete { title, rewards, .. } => {
            info!(who, %title, ?rewards, "Quest complete")
        }
        SimEvent::PeerJoined { peer, display_name } => {
            info!(who, %peer, name = ?display_name, "Peer joined")
        }
        SimEvent::PeerLeft { peer, reason } => info!(who, %peer, ?reason, "Peer left"),
        SimEvent::StructurePlaced { id, kind } => info!(who, id, %kind, "Structure placed"),
        SimEvent::StatUpdate { stat, value } => debug!(who, ?stat, value, "Stat"),
        SimEvent::ConnectionChanged(state) => info!(who, ?state, "Connection"),
        SimEvent::Custom { name } => debug!(who, %name, "Custom action"),
    }
}

fn main() {
    let args = GameArgs::parse();

    let config_dir = args.common.config.clone().unwrap_or_else(default_config_dir);
    let (mut config, config_error) = match Config::load_or_create(&config_dir) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_cli_overrides(&args.common);

    let log_dir = config_dir.join("logs");
    meadow_log::init_logging(Some(log_dir.as_path()), Some(&config));
    if let Some(e) = config_error {
        warn!(error = %e, dir = %config_dir.display(), "Using default config");
    }
    info!(
        room = %config.network.room_id,
        name = %config.network.display_name,
        ticks = args.ticks,
        "Meadow demo starting"
    );

    let hub = LoopbackHub::new();

    let mut local_ctx =
        SimContext::new(config.clone(), Box::new(hub.channel(PeerId::new("local"))));
    world::populate(&mut local_ctx);
    let mut local = Simulation::new(
        local_ctx,
        ground(),
        store(args.save_dir.as_ref()),
        Vec3::ZERO,
    );

    let mut companion_config = config;
    companion_config.network.display_name = "companion".into();
    let mut companion_ctx =
        SimContext::new(companion_config, Box::new(hub.channel(PeerId::new("companion"))));
    world::populate(&mut companion_ctx);
    let mut companion = Simulation::new(
        companion_ctx,
        ground(),
        Box::new(NullStore),
        Vec3::new(6.0, 0.0, 6.0),
    );

    let completed = Rc::new(Cell::new(0u32));
    {
        let completed = Rc::clone(&completed);
        local
            .events_mut()
            .subscribe(EventKind::QuestComplete, move |_| completed.set(completed.get() + 1));
    }

    let kindling = QuestId::new(world::KINDLING_QUEST);
    let mut fed = 0u32;
    let mut built = false;
    for tick in 0..args.ticks {
        let position = local.local_position();
        let near_fire = position.distance(world::CAMPFIRE) < 2.5;

        let target = match local.context().quests.status(&kindling) {
            Some(QuestStatus::Locked) => world::RANGER,
            _ => world::CAMPFIRE,
        };
        let input = steer(position, target);

        if near_fire && fed < 3 && tick % 30 == 0 {
            local.interact();
        }
        if fed >= 3 && !built {
            let corner = world::CAMPFIRE + Vec3::new(3.0, 0.0, 0.0);
            let lean_to = Aabb::new(corner, corner + Vec3::new(2.0, 1.5, 3.0));
            built = local.place_structure("lean-to", lean_to).is_some();
        }

        let angle = tick as f32 * DT * 0.8;
        let wander = MovementInput {
            direction: Vec2::new(angle.cos(), angle.sin()),
            ..Default::default()
        };

        local.update(DT, &input);
        companion.update(DT, &wander);

        let mut stoked = 0;
        for event in local.drain_events() {
            if matches!(&event, SimEvent::Custom { name } if name == world::FEED_FIRE) {
                stoked += 1;
            }
            log_event("local", &event);
        }
        if stoked > 0 {
            fed += stoked;
            local.observe_metric(world::LOGS_BURNED, f64::from(fed));
        }
        for event in companion.drain_events() {
            log_event("companion", &event);
        }
    }

    for remote in local.remote_states() {
        info!(
            peer = %remote.id,
            position = ?remote.position,
            anim = ?remote.anim,
            "Remote view at exit"
        );
    }
    info!(
        position = ?local.local_position(),
        warmth = local.context().status.warmth(),
        quests_completed = completed.get(),
        "Local player at exit"
    );

    local.shutdown();
    companion.shutdown();
    info!("Meadow demo finished");
}
