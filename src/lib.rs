pub mod engine;
pub mod error;
pub mod export;
pub mod host;
pub mod media;
pub mod model;
pub mod overrides;
pub mod resolver;
pub mod scanner;
pub mod selector;
pub mod sheet;
pub mod store;
pub mod value;
pub mod watcher;

#[cfg(feature = "wasm")]
pub mod wasm;

use std::path::Path;

use error::Result;
use model::VariableSet;
use sheet::{Snapshot, StyleSource};

pub use engine::{Engine, EngineConfig, Host};
pub use error::DialsError;
pub use host::SnapshotHost;
pub use media::Viewport;
pub use model::{Condition, ConditionKind, Context, ContextualVariable};

/// Scan `source` and build the contextual variable model.
pub fn detect(source: &dyn StyleSource) -> VariableSet {
    VariableSet::detect(source).0
}

/// Detect variables from a JSON stylesheet snapshot.
pub fn detect_snapshot(json: &str) -> Result<VariableSet> {
    let snapshot = Snapshot::from_json(json)?;
    Ok(detect(&snapshot))
}

/// Detect variables from a snapshot file on disk.
pub fn detect_file(path: &Path) -> Result<VariableSet> {
    let snapshot = Snapshot::load(path)?;
    Ok(detect(&snapshot))
}
