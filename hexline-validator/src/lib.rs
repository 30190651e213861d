//! Hexline Validator - independent re-simulation of proposed batches
//!
//! A proposer runs a batch of moves against its session and publishes a
//! [`Proposal`]: the starting snapshot, the moves, the changes it produced and
//! the resulting state hash. Validators re-run the same batch, each over its
//! own copy of root, and a [`ValidationReport`] counts how many agree.
//!
//! ## Architecture
//!
//! - Level 1: validate (orchestration)
//! - Level 2: resimulate, resimulate_parallel (replicas)
//! - Level 3: ValidationReport::from_replicas (comparison)
//! - Level 4: configuration

mod config;
mod proposal;
mod replica;
mod report;

pub use config::ValidatorConfig;
pub use proposal::Proposal;
pub use replica::{resimulate, resimulate_parallel, resimulate_sequential, Replica, ReplicaError};
pub use report::ValidationReport;

use hexline_core::Rules;

/// Re-run a proposal on `config.replicas` independent replicas and report
/// agreement; the batch is accepted once `config.quorum` of them agree
pub fn validate(proposal: &Proposal, rules: &Rules, config: &ValidatorConfig) -> ValidationReport {
    tracing::info!(
        "Validating batch of {} moves on {} replicas",
        proposal.moves.len(),
        config.replicas
    );

    let replicas = if config.parallel {
        resimulate_parallel(&proposal.snapshot, rules, &proposal.moves, config.replicas)
    } else {
        resimulate_sequential(&proposal.snapshot, rules, &proposal.moves, config.replicas)
    };

    let report = ValidationReport::from_replicas(proposal, &replicas, config.quorum);
    tracing::info!(
        "{}/{} replicas agree with hash {:016x}, quorum {}: {}",
        report.agreeing,
        report.total,
        report.expected_hash,
        report.quorum,
        if report.accepted { "accepted" } else { "rejected" }
    );
    report
}
