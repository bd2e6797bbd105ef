//! Teleportation.
//!
//! Every system holds three particles: the payload (prepared by the driver)
//! and a Bell pair. Alice sends one half of the pair to Bob, runs the Bell
//! measurement and sends the two outcomes; Bob applies the corrections and
//! measures.

use super::{agent, execute, random_bits, take, Outcome};
use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::runner::ScenarioMetrics;
use qlink_core::{connect, gates, AgentContext, AgentError, QuantumArena, Simulation};
use std::sync::Arc;
use tracing::debug;

/// Particles per system.
pub const PARTICLES: usize = 3;

/// Bob's view of each system: the measured bit, or `None` if anything was lost.
pub type Received = Vec<Option<u8>>;

type Ctx = AgentContext<[u8; 2], Received>;

pub fn sender(ctx: &mut Ctx) -> Result<(), AgentError> {
    for mut system in ctx.stream() {
        let mut qubits = system.qubits();
        let (Some(payload), Some(a), Some(b)) = (qubits.next(), qubits.next(), qubits.next()) else {
            return Err(AgentError::protocol("teleportation needs 3 particles per system"));
        };
        gates::h(&a)?;
        gates::cnot_on(&a, &b)?;
        ctx.qsend("Bob", b)?;

        gates::cnot_on(&payload, &a)?;
        gates::h(&payload)?;
        let mz = ctx.measure(payload)?;
        let mx = ctx.measure(a)?;
        ctx.csend("Bob", [mx, mz])?;
    }
    Ok(())
}

pub fn receiver(ctx: &mut Ctx) -> Result<(), AgentError> {
    let systems = ctx.arena().system_count();
    let mut bits = Vec::with_capacity(systems);
    for _ in 0..systems {
        let particle = ctx.qrecv("Alice")?;
        let corrections = ctx.crecv("Alice")?;
        let bit = match (particle, corrections) {
            (Some(b), Some([mx, mz])) => {
                if mx == 1 {
                    gates::x(&b)?;
                }
                if mz == 1 {
                    gates::z(&b)?;
                }
                Some(ctx.measure(b)?)
            }
            _ => None,
        };
        bits.push(bit);
        ctx.increment_progress();
    }
    ctx.output(bits)?;
    Ok(())
}

/// Flips particle 0 of system `i` to |1> wherever `bits[i]` is set.
pub fn prepare(arena: &Arc<QuantumArena>, bits: &[u8]) -> Result<(), HarnessError> {
    for (i, &bit) in bits.iter().enumerate() {
        if bit == 1 {
            gates::x(&arena.view_system(i)?.qubit(0)?)?;
        }
    }
    Ok(())
}

pub fn run(config: &SimConfig, seed: u64, progress: bool) -> Result<Outcome, HarnessError> {
    let bits = random_bits(seed, "teleport", config.systems);
    let arena = QuantumArena::allocate(PARTICLES, config.systems)?;
    prepare(&arena, &bits)?;

    let mut sim = Simulation::new(&arena, seed);
    let mut alice = agent(&sim, config, "Alice", sender)?;
    let mut bob = agent(&sim, config, "Bob", receiver)?;
    connect(&mut alice, &mut bob, &config.link())?;
    sim.add(alice)?;
    sim.add(bob)?;

    let mut report = execute(sim, "teleport", progress)?;
    let received = take(&mut report.results, "Bob")?;
    let mismatches = bits
        .iter()
        .zip(&received)
        .filter(|&(sent, got)| *got != Some(*sent))
        .count()
        + bits.len().abs_diff(received.len());
    debug!("Teleported {} bits, {} mismatches", bits.len(), mismatches);

    let metrics = ScenarioMetrics {
        checked: bits.len(),
        mismatches,
        ..ScenarioMetrics::from_agents(&report.agents)
    };
    let failure = (mismatches > 0).then(|| format!("{}/{} teleported bits differ", mismatches, bits.len()));
    Ok(Outcome::new(&report, metrics, failure))
}
