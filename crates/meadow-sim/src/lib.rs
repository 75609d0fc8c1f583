//! Per-frame orchestration of the shared-world client.
//!
//! [`Simulation`] owns a [`SimContext`] (config, network sync, gameplay
//! state, obstacles), the local movement controller, the terrain handle, and
//! a persistence store. Each [`Simulation::update`] advances all of them in a
//! fixed order and publishes typed [`SimEvent`]s for the UI.

pub mod context;
pub mod events;
pub mod persistence;
pub mod simulation;

pub use context::SimContext;
pub use events::{DRAIN_CAPACITY, EventBus, EventHandler, EventKind, SimEvent};
pub use persistence::{
    NullStore, POSITIONS_FILE, PersistenceError, PersistenceStore, PlacedStructure,
    RonFileStore, STRUCTURES_FILE,
};
pub use simulation::Simulation;
