//! Agreement summary across replicas
//!
//! Level 3 - Step-level implementation

use serde::{Deserialize, Serialize};

use crate::proposal::Proposal;
use crate::replica::{Replica, ReplicaError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Hash the proposer claims
    pub expected_hash: u64,
    /// Replicas that ran
    pub total: usize,
    /// Replicas matching both the proposer's changes and hash
    pub agreeing: usize,
    /// Replicas that finished with different changes or a different hash
    pub diverged: Vec<usize>,
    /// Replicas that could not finish the batch
    pub failed: Vec<usize>,
    /// Agreeing replicas required for acceptance
    pub quorum: usize,
    /// At least `quorum` replicas agree
    pub accepted: bool,
}

impl ValidationReport {
    pub fn from_replicas(proposal: &Proposal, replicas: &[Result<Replica, ReplicaError>], quorum: usize) -> Self {
        let mut report = Self {
            expected_hash: proposal.state_hash,
            total: replicas.len(),
            agreeing: 0,
            diverged: Vec::new(),
            failed: Vec::new(),
            quorum,
            accepted: false,
        };

        for result in replicas {
            match result {
                Ok(replica) if replica.state_hash == proposal.state_hash && replica.changes == proposal.changes => {
                    report.agreeing += 1;
                }
                Ok(replica) => {
                    tracing::warn!(
                        "Replica {} diverged: hash {:016x}, expected {:016x}",
                        replica.index,
                        replica.state_hash,
                        proposal.state_hash
                    );
                    report.diverged.push(replica.index);
                }
                Err(err) => {
                    tracing::warn!("{}", err);
                    report.failed.push(err.index());
                }
            }
        }
        report.accepted = report.agrees(quorum);
        report
    }

    /// K-of-N check
    pub fn agrees(&self, k: usize) -> bool {
        self.agreeing >= k
    }

    pub fn is_unanimous(&self) -> bool {
        self.total > 0 && self.agreeing == self.total
    }
}
