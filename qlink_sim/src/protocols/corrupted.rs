//! Quantum link with positional corruption.
//!
//! Alice sends particle 0 of every system, still in |0>, over a link that
//! corrupts at most one particle per group. Bob measures each arrival; a
//! group may contain at most one flipped bit.

use super::{agent, execute, take, Outcome};
use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::runner::ScenarioMetrics;
use qlink_core::{qconnect, AgentContext, AgentError, NoiseSpec, QuantumArena, Simulation};
use tracing::debug;

type Ctx = AgentContext<(), Vec<Option<u8>>>;

pub fn sender(ctx: &mut Ctx) -> Result<(), AgentError> {
    for system in ctx.stream() {
        ctx.qsend("Bob", system.qubit(0)?)?;
    }
    Ok(())
}

pub fn receiver(ctx: &mut Ctx) -> Result<(), AgentError> {
    let systems = ctx.arena().system_count();
    let mut bits = Vec::with_capacity(systems);
    for _ in 0..systems {
        let bit = match ctx.qrecv("Alice")? {
            Some(q) => Some(ctx.measure(q)?),
            None => None,
        };
        bits.push(bit);
        ctx.increment_progress();
    }
    ctx.output(bits)?;
    Ok(())
}

/// Number of groups holding more than one flipped bit.
pub fn overfull_groups(bits: &[Option<u8>], group_size: usize) -> usize {
    bits.chunks(group_size.max(1))
        .filter(|group| group.iter().filter(|&&bit| bit == Some(1)).count() > 1)
        .count()
}

pub fn run(config: &SimConfig, seed: u64, progress: bool) -> Result<Outcome, HarnessError> {
    let arena = QuantumArena::allocate(1, config.systems)?;
    let mut sim = Simulation::new(&arena, seed);
    let mut alice = agent(&sim, config, "Alice", sender)?;
    let mut bob = agent(&sim, config, "Bob", receiver)?;
    let corrupting = config.link().with_noise(NoiseSpec::PositionalCorruption {
        group_size: config.group_size,
        probability: config.corruption_probability,
    });
    qconnect(&mut alice, &mut bob, &corrupting)?;
    sim.add(alice)?;
    sim.add(bob)?;

    let mut report = execute(sim, "corruption", progress)?;
    let bits = take(&mut report.results, "Bob")?;
    let flips = bits.iter().filter(|&&bit| bit == Some(1)).count();
    let groups = bits.len().div_ceil(config.group_size);
    let overfull = overfull_groups(&bits, config.group_size);
    debug!("{} flips over {} groups", flips, groups);

    let metrics = ScenarioMetrics {
        checked: groups,
        mismatches: overfull,
        flips: Some(flips),
        ..ScenarioMetrics::from_agents(&report.agents)
    };
    let failure = (overfull > 0).then(|| format!("{}/{} groups corrupted more than once", overfull, groups));
    Ok(Outcome::new(&report, metrics, failure))
}
