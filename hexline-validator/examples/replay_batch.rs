//! Propose a batch on one session and validate it on parallel replicas
//!
//! Run with: RUST_LOG=info cargo run -p hexline-validator --example replay_batch

use hexline_core::{
    rules::{terrain_ids, unit_ids},
    AxialCoord, Bounds, Move, Rules, Session, SessionConfig, Tile, Unit, UnitId,
};
use hexline_validator::{validate, Proposal, ValidatorConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rules = Rules::default();
    let config = SessionConfig::default()
        .with_seed(2024)
        .with_bounds(Bounds::from_radius(5));
    let mut session = Session::new(config, rules.clone());

    let world = session.world_mut();
    for coord in AxialCoord::new(0, 0).range(5) {
        world.set_tile(Tile::new(coord, terrain_ids::PLAINS))?;
    }
    world.set_tile(Tile::new(AxialCoord::new(-4, 0), terrain_ids::BASE).owned_by(0))?;
    world.set_tile(Tile::new(AxialCoord::new(4, 0), terrain_ids::BASE).owned_by(1))?;
    world.add_unit(Unit::new(UnitId(1), unit_ids::TANK, AxialCoord::new(-1, 0), 0, 100, 0))?;
    world.add_unit(Unit::new(UnitId(2), unit_ids::INFANTRY, AxialCoord::new(2, 0), 1, 100, 0))?;
    world.add_unit(Unit::new(UnitId(3), unit_ids::ARTILLERY, AxialCoord::new(3, 0), 1, 100, 0))?;
    let mut turn = world.turn_state();
    turn.next_unit_id = 4;
    world.set_turn_state(turn);

    let moves = vec![
        Move::move_unit(0, UnitId(1), AxialCoord::new(-1, 0), AxialCoord::new(1, 0)),
        Move::attack(0, UnitId(1), AxialCoord::new(1, 0), AxialCoord::new(2, 0)),
        Move::build(0, AxialCoord::new(-4, 0), unit_ids::INFANTRY),
        Move::end_turn(0),
    ];

    let proposal = Proposal::from_session(&mut session, moves)?;
    println!("Proposer produced {} changes", proposal.changes.len());
    println!("Player 0 holds {} coins after the batch", session.world().coins(0));
    println!("{}", serde_json::to_string_pretty(&proposal.changes)?);

    let validator = ValidatorConfig::default().with_replicas(5).with_quorum(4);
    let report = validate(&proposal, &rules, &validator);

    println!(
        "{}/{} replicas agree (quorum {}): {}",
        report.agreeing,
        report.total,
        report.quorum,
        if report.accepted { "accepted" } else { "rejected" }
    );
    Ok(())
}
