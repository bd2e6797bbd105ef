//! Superdense coding: Alice shares a Bell pair with Bob, encodes two bits on
//! her half with X/Z and sends it over. Bob undoes the entangling circuit
//! and reads both bits.

use super::{agent, execute, random_bits, take, Outcome};
use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::runner::ScenarioMetrics;
use qlink_core::{gates, qconnect, AgentContext, AgentError, QuantumArena, Simulation};

/// Decoded messages, `None` where a particle was lost.
pub type Decoded = Vec<Option<[u8; 2]>>;

type Ctx = AgentContext<(), Decoded>;

/// Alice's protocol: one message per system, in arena order.
pub fn encoder(messages: Vec<[u8; 2]>) -> impl FnMut(&mut Ctx) -> Result<(), AgentError> + Send + 'static {
    move |ctx| {
        for (mut system, &[b1, b2]) in ctx.stream().zip(&messages) {
            let mut qubits = system.qubits();
            let (Some(a), Some(b)) = (qubits.next(), qubits.next()) else {
                return Err(AgentError::protocol("superdense coding needs 2 particles per system"));
            };
            gates::h(&a)?;
            gates::cnot_on(&a, &b)?;
            ctx.qsend("Bob", b)?;
            if b2 == 1 {
                gates::x(&a)?;
            }
            if b1 == 1 {
                gates::z(&a)?;
            }
            ctx.qsend("Bob", a)?;
        }
        Ok(())
    }
}

pub fn decoder(ctx: &mut Ctx) -> Result<(), AgentError> {
    let systems = ctx.arena().system_count();
    let mut decoded = Vec::with_capacity(systems);
    for _ in 0..systems {
        let b = ctx.qrecv("Alice")?;
        let a = ctx.qrecv("Alice")?;
        let message = match (a, b) {
            (Some(a), Some(b)) => {
                gates::cnot_on(&a, &b)?;
                gates::h(&a)?;
                Some([ctx.measure(a)?, ctx.measure(b)?])
            }
            // Measure whatever survived so nothing stays held
            (a, b) => {
                for particle in a.into_iter().chain(b) {
                    ctx.measure(particle)?;
                }
                None
            }
        };
        decoded.push(message);
        ctx.increment_progress();
    }
    ctx.output(decoded)?;
    Ok(())
}

pub fn run(config: &SimConfig, seed: u64, progress: bool) -> Result<Outcome, HarnessError> {
    let messages: Vec<[u8; 2]> = random_bits(seed, "superdense", 2 * config.systems)
        .chunks_exact(2)
        .map(|pair| [pair[0], pair[1]])
        .collect();
    let arena = QuantumArena::allocate(2, config.systems)?;

    let mut sim = Simulation::new(&arena, seed);
    let mut alice = agent(&sim, config, "Alice", encoder(messages.clone()))?;
    let mut bob = agent(&sim, config, "Bob", decoder)?;
    qconnect(&mut alice, &mut bob, &config.link())?;
    sim.add(alice)?;
    sim.add(bob)?;

    let mut report = execute(sim, "superdense", progress)?;
    let decoded = take(&mut report.results, "Bob")?;
    let mismatches = messages
        .iter()
        .zip(&decoded)
        .filter(|&(sent, got)| *got != Some(*sent))
        .count()
        + messages.len().abs_diff(decoded.len());

    let metrics = ScenarioMetrics {
        checked: messages.len(),
        mismatches,
        ..ScenarioMetrics::from_agents(&report.agents)
    };
    let failure = (mismatches > 0).then(|| format!("{}/{} messages decoded wrong", mismatches, messages.len()));
    Ok(Outcome::new(&report, metrics, failure))
}
