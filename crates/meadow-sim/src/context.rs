//! Explicit owner of every long-lived collaborator the simulation drives.

use meadow_config::Config;
use meadow_gameplay::{InteractionManager, QuestStateMachine, StatusTracker};
use meadow_movement::ObstacleSet;
use meadow_net::{NetworkSync, PeerChannel, SyncConfig};

/// Everything a [`Simulation`](crate::Simulation) needs besides terrain and
/// storage. Built once, populated during world construction (interactables,
/// quests, heat sources, obstacles), then moved into the simulation.
pub struct SimContext {
    pub config: Config,
    pub network: NetworkSync,
    pub quests: QuestStateMachine,
    pub interactions: InteractionManager,
    pub status: StatusTracker,
    pub obstacles: ObstacleSet,
}

impl SimContext {
    /// Context whose network sync runs over `channel` with the settings in
    /// `config.network`.
    pub fn new(config: Config, channel: Box<dyn PeerChannel>) -> Self {
        let network = NetworkSync::new(SyncConfig::from(&config.network), channel);
        let status = StatusTracker::new(&config.gameplay);
        Self {
            config,
            network,
            quests: QuestStateMachine::new(),
            interactions: InteractionManager::new(),
            status,
            obstacles: ObstacleSet::new(),
        }
    }
}
