//! Fire-and-forget persistence of positions and placed structures.
//!
//! The tick never blocks on disk: [`RonFileStore`] hands every save to a
//! background writer thread over a `crossbeam_channel` and the writer
//! rewrites the affected RON file. Failures are logged and dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use glam::Vec3;
use meadow_movement::Aabb;
use meadow_net::PeerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// File holding the last saved position of every entity.
pub const POSITIONS_FILE: &str = "positions.ron";

/// File holding every placed structure.
pub const STRUCTURES_FILE: &str = "structures.ron";

/// Errors surfaced by [`PersistenceStore::load_structures`] and store setup.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Reading, writing, or creating a file failed.
    #[error("persistence I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored file is not valid RON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// Encoding to RON failed.
    #[error("failed to serialize: {0}")]
    Serialize(#[source] ron::Error),

    /// The writer thread could not be started.
    #[error("failed to spawn persistence writer: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A structure the player placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedStructure {
    pub id: u64,
    pub kind: String,
    /// Collision volume, appended to the obstacle set.
    pub bounds: Aabb,
}

/// Where the simulation persists state. Saves never report failure to the
/// caller.
pub trait PersistenceStore {
    /// Record the latest position of `entity`.
    fn save_entity_position(&self, entity: &PeerId, position: Vec3);

    /// Record a newly placed structure.
    fn save_structure(&self, structure: &PlacedStructure);

    /// Every structure saved so far, in placement order.
    fn load_structures(&self) -> Result<Vec<PlacedStructure>, PersistenceError>;
}

/// Store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl PersistenceStore for NullStore {
    fn save_entity_position(&self, _entity: &PeerId, _position: Vec3) {}

    fn save_structure(&self, _structure: &PlacedStructure) {}

    fn load_structures(&self) -> Result<Vec<PlacedStructure>, PersistenceError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// RON file store
// ---------------------------------------------------------------------------

enum WriteCommand {
    Position { entity: String, position: Vec3 },
    Structure(PlacedStructure),
    Flush(Sender<()>),
}

/// RON files in one directory, written by a background thread.
pub struct RonFileStore {
    dir: PathBuf,
    commands: Option<Sender<WriteCommand>>,
    writer: Option<JoinHandle<()>>,
}

impl RonFileStore {
    /// Opens (creating if needed) a store in `dir` and starts its writer.
    pub fn open(dir: &Path) -> Result<Self, PersistenceError> {
        fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let positions: BTreeMap<String, Vec3> =
            read_ron(&dir.join(POSITIONS_FILE))?.unwrap_or_default();
        let structures: Vec<PlacedStructure> =
            read_ron(&dir.join(STRUCTURES_FILE))?.unwrap_or_default();

        let (tx, rx) = unbounded();
        let writer = Writer {
            dir: dir.to_path_buf(),
            positions,
            structures,
        };
        let handle = std::thread::Builder::new()
            .name("meadow-persistence".into())
            .spawn(move || writer.run(rx))
            .map_err(PersistenceError::Spawn)?;

        info!(dir = %dir.display(), "Opened persistence store");
        Ok(Self {
            dir: dir.to_path_buf(),
            commands: Some(tx),
            writer: Some(handle),
        })
    }

    /// Directory the store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Blocks until every save issued so far has reached disk.
    pub fn flush(&self) {
        let Some(commands) = &self.commands else {
            return;
        };
        let (done_tx, done_rx) = bounded(1);
        if commands.send(WriteCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Last saved position of `entity`, read from disk.
    pub fn load_position(&self, entity: &PeerId) -> Result<Option<Vec3>, PersistenceError> {
        self.flush();
        let positions: BTreeMap<String, Vec3> =
            read_ron(&self.dir.join(POSITIONS_FILE))?.unwrap_or_default();
        Ok(positions.get(entity.as_str()).copied())
    }

    fn enqueue(&self, command: WriteCommand) {
        let sent = self
            .commands
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok());
        if !sent {
            warn!("Persistence writer is gone; save dropped");
        }
    }
}

impl PersistenceStore for RonFileStore {
    fn save_entity_position(&self, entity: &PeerId, position: Vec3) {
        self.enqueue(WriteCommand::Position {
            entity: entity.as_str().to_owned(),
            position,
        });
    }

    fn save_structure(&self, structure: &PlacedStructure) {
        self.enqueue(WriteCommand::Structure(structure.clone()));
    }

    fn load_structures(&self) -> Result<Vec<PlacedStructure>, PersistenceError> {
        self.flush();
        Ok(read_ron(&self.dir.join(STRUCTURES_FILE))?.unwrap_or_default())
    }
}

impl Drop for RonFileStore {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop after it drains.
        self.commands = None;
        if let Some(handle) = self.writer.take()
            && handle.join().is_err()
        {
            warn!("Persistence writer panicked");
        }
    }
}

struct Writer {
    dir: PathBuf,
    positions: BTreeMap<String, Vec3>,
    structures: Vec<PlacedStructure>,
}

impl Writer {
    fn run(mut self, rx: Receiver<WriteCommand>) {
        while let Ok(command) = rx.recv() {
            let result = match command {
                WriteCommand::Position { entity, position } => {
                    self.positions.insert(entity, position);
                    write_ron(&self.dir.join(POSITIONS_FILE), &self.positions)
                }
                WriteCommand::Structure(structure) => {
                    debug!(id = structure.id, kind = %structure.kind, "Saving structure");
                    self.structures.push(structure);
                    write_ron(&self.dir.join(STRUCTURES_FILE), &self.structures)
                }
                WriteCommand::Flush(done) => {
                    let _ = done.send(());
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "Persistence write failed");
            }
        }
        debug!("Persistence writer stopped");
    }
}

/// Reads a RON file, `Ok(None)` when it does not exist.
fn read_ron<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    ron::from_str(&contents)
        .map(Some)
        .map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes through a temporary file so a crash never leaves half a file.
fn write_ron<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
        .map_err(PersistenceError::Serialize)?;
    let tmp = path.with_extension("ron.tmp");
    let io = |source: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, text).map_err(io)?;
    fs::rename(&tmp, path).map_err(io)
}
