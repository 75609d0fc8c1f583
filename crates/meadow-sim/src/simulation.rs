//! The per-frame simulation loop.

use std::time::Duration;

use glam::Vec3;
use meadow_gameplay::{Availability, InteractableId, InteractionAction, QuestEvent, StepId};
use meadow_movement::{Aabb, GroundQuery, MotionPhase, MovementController, MovementInput};
use meadow_net::{AnimState, EntitySnapshot, NetEvent};
use tracing::{debug, info, trace, warn};

use crate::context::SimContext;
use crate::events::{EventBus, SimEvent};
use crate::persistence::{PersistenceStore, PlacedStructure};

/// Frames longer than this are clamped and the simulation runs slow.
pub const MAX_FRAME_TIME: f32 = 0.25;

/// How long the avatar shows the interact animation after an interaction.
const INTERACT_ANIM: Duration = Duration::from_millis(600);

fn anim_for(phase: MotionPhase) -> AnimState {
    match phase {
        MotionPhase::Idle => AnimState::Idle,
        MotionPhase::Walk => AnimState::Walk,
        MotionPhase::Run => AnimState::Run,
        MotionPhase::Jump => AnimState::Jump,
        MotionPhase::Fall => AnimState::Fall,
    }
}

fn quest_event(event: QuestEvent) -> SimEvent {
    match event {
        QuestEvent::StepProgress {
            quest,
            step,
            current,
            target,
            ..
        } => SimEvent::QuestProgress {
            quest,
            step,
            current,
            target,
        },
        QuestEvent::QuestComplete {
            quest,
            title,
            rewards,
        } => SimEvent::QuestComplete {
            quest,
            title,
            rewards,
        },
    }
}

/// One client's view of the shared world.
///
/// Tick order: network poll, movement, interactions, quest location checks,
/// status, outbound broadcast, stale-peer cull, position save, remote-state
/// refresh, event flush.
pub struct Simulation {
    ctx: SimContext,
    movement: MovementController,
    ground: Box<dyn GroundQuery>,
    store: Box<dyn PersistenceStore>,
    events: EventBus,
    now: Duration,
    tick: u64,
    save_elapsed: f32,
    next_structure_id: u64,
    interacting_until: Option<Duration>,
    remote: Vec<EntitySnapshot>,
}

impl Simulation {
    /// Builds the simulation, restores saved structures into the obstacle
    /// set, and joins the room. A failed join only arms the reconnect timer.
    pub fn new(
        mut ctx: SimContext,
        ground: Box<dyn GroundQuery>,
        store: Box<dyn PersistenceStore>,
        spawn: Vec3,
    ) -> Self {
        let mut next_structure_id = 1;
        match store.load_structures() {
            Ok(structures) => {
                for s in &structures {
                    ctx.obstacles.push(s.bounds);
                    next_structure_id = next_structure_id.max(s.id + 1);
                }
                if !structures.is_empty() {
                    info!(count = structures.len(), "Restored placed structures");
                }
            }
            Err(e) => warn!(error = %e, "Could not load placed structures"),
        }

        let movement = MovementController::new(ctx.config.movement.clone(), spawn);
        ctx.network.connect(Duration::ZERO);

        Self {
            ctx,
            movement,
            ground,
            store,
            events: EventBus::new(),
            now: Duration::ZERO,
            tick: 0,
            save_elapsed: 0.0,
            next_structure_id,
            interacting_until: None,
            remote: Vec::new(),
        }
    }

    /// Advance one frame of `dt` seconds with the player's `input`.
    pub fn update(&mut self, dt: f32, input: &MovementInput) {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_TIME) } else { 0.0 };
        self.now += Duration::from_secs_f32(dt);
        self.tick += 1;
        let now = self.now;

        self.ctx.network.poll(now);

        self.movement
            .update(dt, input, self.ground.as_ref(), &self.ctx.obstacles);
        let position = self.movement.position();

        let interaction = self.ctx.interactions.update(position);
        if let Some(availability) = interaction.availability {
            let label = match availability {
                Availability::Available { label, .. } => Some(label),
                Availability::Unavailable => None,
            };
            self.events.emit(SimEvent::AvailabilityChanged { label });
        }
        if let Some(id) = interaction.triggered {
            self.dispatch(id);
        }

        let located = self.ctx.quests.observe_location(position);
        self.emit_quest_events(located);

        if let Some(update) = self.ctx.status.update(dt, position) {
            self.events.emit(SimEvent::StatUpdate {
                stat: update.stat,
                value: update.value,
            });
        }

        let anim = self.current_anim();
        self.ctx
            .network
            .broadcast_local_state(now, position, self.movement.heading(), anim);
        self.ctx.network.cull_stale_peers(now);
        self.forward_net_events();

        self.save_elapsed += dt;
        if self.save_elapsed >= self.ctx.config.gameplay.position_save_interval_secs {
            self.save_elapsed = 0.0;
            self.store
                .save_entity_position(self.ctx.network.local_id(), position);
        }

        self.remote = self.ctx.network.interpolated_peers(now);
        self.events.flush();

        if self.ctx.config.debug.debug_mode {
            debug!(
                tick = self.tick,
                ?position,
                peers = self.remote.len(),
                state = ?self.ctx.network.connection_state(),
                "sim tick"
            );
        } else {
            trace!(tick = self.tick, "sim tick");
        }
    }

    fn current_anim(&mut self) -> AnimState {
        match self.interacting_until {
            Some(until) if self.now < until => AnimState::Interact,
            Some(_) => {
                self.interacting_until = None;
                anim_for(self.movement.phase())
            }
            None => anim_for(self.movement.phase()),
        }
    }

    fn forward_net_events(&mut self) {
        for event in self.ctx.network.drain_events() {
            let event = match event {
                NetEvent::PeerJoined { peer, display_name } => {
                    SimEvent::PeerJoined { peer, display_name }
                }
                NetEvent::PeerLeft { peer, reason } => SimEvent::PeerLeft { peer, reason },
                NetEvent::ConnectionChanged(state) => SimEvent::ConnectionChanged(state),
            };
            self.events.emit(event);
        }
    }

    /// Runs the action of interactable `id`.
    fn dispatch(&mut self, id: InteractableId) {
        let Some(action) = self.ctx.interactions.get(id).map(|i| i.action.clone()) else {
            return;
        };
        self.interacting_until = Some(self.now + INTERACT_ANIM);
        match action {
            InteractionAction::Dialogue(text) => self.events.emit(SimEvent::Dialogue { text }),
            InteractionAction::StartQuest(quest) => {
                if self.ctx.quests.unlock(&quest) {
                    self.events.emit(SimEvent::QuestStarted { quest });
                }
            }
            InteractionAction::AdvanceStep { step, amount } => {
                self.update_step(&step, amount);
            }
            InteractionAction::Custom(name) => self.events.emit(SimEvent::Custom { name }),
        }
    }

    /// Uses the active interactable, if any. Resulting events are delivered
    /// with the next tick's flush.
    pub fn interact(&mut self) -> bool {
        match self.ctx.interactions.interact() {
            Some(id) => {
                self.dispatch(id);
                true
            }
            None => false,
        }
    }

    fn emit_quest_events(&mut self, events: impl IntoIterator<Item = QuestEvent>) {
        for event in events {
            self.events.emit(quest_event(event));
        }
    }

    /// Reports how many of `item` the player now holds. Quest events land
    /// on the bus with the next tick's flush, as do those of the other
    /// observers below.
    pub fn observe_item_count(&mut self, item: &str, count: u32) {
        let events = self.ctx.quests.observe_item_count(item, count);
        self.emit_quest_events(events);
    }

    /// Reports the current value of numeric goal `name`.
    pub fn observe_metric(&mut self, name: &str, value: f64) {
        let events = self.ctx.quests.observe_metric(name, value);
        self.emit_quest_events(events);
    }

    /// Reports the player's rank on `track`.
    pub fn observe_rank(&mut self, track: &str, rank: u32) {
        let events = self.ctx.quests.observe_rank(track, rank);
        self.emit_quest_events(events);
    }

    /// Adds `delta` to a pending step of an active quest.
    pub fn update_step(&mut self, step: &StepId, delta: f64) -> bool {
        let event = self.ctx.quests.update_step(step, delta);
        let advanced = event.is_some();
        self.emit_quest_events(event);
        advanced
    }

    /// Places a structure with collision volume `bounds`, appending it to the
    /// obstacle set and saving it. Refused when it would enclose the avatar.
    pub fn place_structure(&mut self, kind: impl Into<String>, bounds: Aabb) -> Option<u64> {
        let core = self.movement.core_volume();
        let shrink = self.ctx.config.movement.obstacle_shrink;
        if bounds.shrunk(shrink).is_some_and(|b| b.intersects(&core)) {
            debug!(?bounds, "structure overlaps the avatar; placement refused");
            return None;
        }

        let structure = PlacedStructure {
            id: self.next_structure_id,
            kind: kind.into(),
            bounds,
        };
        self.next_structure_id += 1;
        self.ctx.obstacles.push(bounds);
        self.store.save_structure(&structure);
        info!(id = structure.id, kind = %structure.kind, "Placed structure");
        self.events.emit(SimEvent::StructurePlaced {
            id: structure.id,
            kind: structure.kind,
        });
        Some(structure.id)
    }

    /// Saves the final position and leaves the room.
    pub fn shutdown(&mut self) {
        self.store
            .save_entity_position(self.ctx.network.local_id(), self.movement.position());
        self.ctx.network.disconnect();
        self.forward_net_events();
        self.events.flush();
    }

    /// Interpolated remote avatars as of the last tick, ordered by peer id.
    pub fn remote_states(&self) -> &[EntitySnapshot] {
        &self.remote
    }

    /// Local avatar feet position.
    pub fn local_position(&self) -> Vec3 {
        self.movement.position()
    }

    /// Local movement controller.
    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    /// Shared collaborators.
    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Shared collaborators, for world edits between ticks.
    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    /// Event bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Takes every event flushed since the last call.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    /// Simulation clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}
