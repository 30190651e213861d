//! Replica re-simulation
//!
//! Level 2 - Phase-level implementation

use hexline_core::{ChangeResult, Move, Rules, Session, SessionSnapshot, StateError, WorldError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What one replica produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub index: usize,
    pub changes: Vec<ChangeResult>,
    pub state_hash: u64,
}

#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("replica {index} could not restore snapshot: {source}")]
    Snapshot {
        index: usize,
        #[source]
        source: WorldError,
    },

    #[error("replica {index} aborted the batch: {source}")]
    Aborted {
        index: usize,
        #[source]
        source: StateError,
    },
}

impl ReplicaError {
    pub fn index(&self) -> usize {
        match self {
            ReplicaError::Snapshot { index, .. } | ReplicaError::Aborted { index, .. } => *index,
        }
    }
}

/// Re-run a batch once from `snapshot`
pub fn resimulate(snapshot: &SessionSnapshot, rules: &Rules, moves: &[Move]) -> Result<Replica, ReplicaError> {
    run_replica(0, snapshot, rules, moves)
}

/// Run replicas one after another
pub fn resimulate_sequential(
    snapshot: &SessionSnapshot,
    rules: &Rules,
    moves: &[Move],
    replicas: usize,
) -> Vec<Result<Replica, ReplicaError>> {
    (0..replicas)
        .map(|index| run_replica(index, snapshot, rules, moves))
        .collect()
}

/// Run replicas in parallel using rayon. Results keep replica order.
pub fn resimulate_parallel(
    snapshot: &SessionSnapshot,
    rules: &Rules,
    moves: &[Move],
    replicas: usize,
) -> Vec<Result<Replica, ReplicaError>> {
    (0..replicas)
        .into_par_iter()
        .map(|index| run_replica(index, snapshot, rules, moves))
        .collect()
}

// Each replica owns its session: root, RNG and rules are never shared
fn run_replica(
    index: usize,
    snapshot: &SessionSnapshot,
    rules: &Rules,
    moves: &[Move],
) -> Result<Replica, ReplicaError> {
    let mut session = Session::from_snapshot(snapshot, rules.clone())
        .map_err(|source| ReplicaError::Snapshot { index, source })?;
    let changes = session
        .process_moves(moves)
        .map_err(|source| ReplicaError::Aborted { index, source })?;

    tracing::debug!("Replica {} produced {} changes", index, changes.len());
    Ok(Replica {
        index,
        changes,
        state_hash: session.state_hash(),
    })
}
