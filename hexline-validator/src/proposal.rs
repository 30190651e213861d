//! The artifact a proposer publishes for validation

use hexline_core::{ChangeResult, Move, Session, SessionSnapshot, StateError};
use serde::{Deserialize, Serialize};

/// A committed batch together with the state it started from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub snapshot: SessionSnapshot,
    pub moves: Vec<Move>,
    pub changes: Vec<ChangeResult>,
    pub state_hash: u64,
}

impl Proposal {
    /// Process `moves` on the proposer's session and record the result.
    /// On error the session is left as it was.
    pub fn from_session(session: &mut Session, moves: Vec<Move>) -> Result<Self, StateError> {
        let snapshot = session.snapshot();
        let changes = session.process_moves(&moves)?;
        Ok(Self {
            snapshot,
            moves,
            changes,
            state_hash: session.state_hash(),
        })
    }
}
