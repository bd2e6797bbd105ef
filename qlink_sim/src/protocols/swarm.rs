//! Ring of agents over one shared arena.
//!
//! Node `i` owns particle `i` of every system: it flips it, passes it to the
//! next node together with its own index, then takes the previous node's
//! particle and measures it. Every measurement must read 1.

use super::{agent, execute, take, Outcome};
use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::runner::ScenarioMetrics;
use qlink_core::{connect, gates, AgentContext, AgentError, QuantumArena, Simulation};

/// One received particle: (system, particle, measured bit).
pub type Hop = (usize, usize, u8);

type Ctx = AgentContext<u8, Vec<Hop>>;

pub fn node_name(i: usize) -> String {
    format!("node-{i}")
}

/// Protocol of node `index` in a ring of `size`.
pub fn node(index: usize, size: usize) -> impl FnMut(&mut Ctx) -> Result<(), AgentError> + Send + 'static {
    let next = node_name((index + 1) % size);
    let prev = node_name((index + size - 1) % size);
    move |ctx| {
        let mut hops = Vec::new();
        for system in ctx.stream() {
            let q = system.qubit(index)?;
            gates::x(&q)?;
            ctx.qsend(&next, q)?;
            ctx.csend(&next, index as u8)?;

            let Some(q) = ctx.qrecv(&prev)? else {
                return Err(AgentError::protocol(format!("particle from {prev} lost")));
            };
            let from = ctx.crecv(&prev)?;
            if from.map(usize::from) != Some(q.particle_index()) {
                return Err(AgentError::protocol(format!(
                    "{prev} announced {from:?} but sent particle {}",
                    q.particle_index()
                )));
            }
            let (system, particle) = q.address();
            let bit = ctx.measure(q)?;
            hops.push((system, particle, bit));
        }
        ctx.output(hops)?;
        Ok(())
    }
}

/// Mutable references to two distinct elements.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

pub fn run(config: &SimConfig, seed: u64, progress: bool) -> Result<Outcome, HarnessError> {
    let size = config.agents;
    if size < 2 {
        return Err(HarnessError::setting("agents", "a ring needs at least 2 agents"));
    }
    let arena = QuantumArena::allocate(size, config.systems)?;
    let mut sim = Simulation::new(&arena, seed);

    let mut nodes = (0..size)
        .map(|i| agent(&sim, config, &node_name(i), node(i, size)))
        .collect::<Result<Vec<_>, _>>()?;

    // Links are bidirectional: two nodes share a single link
    let links = if size == 2 { 1 } else { size };
    for i in 0..links {
        let (a, b) = pair_mut(&mut nodes, i, (i + 1) % size);
        connect(a, b, &config.link())?;
    }
    for node in nodes {
        sim.add(node)?;
    }

    let mut report = execute(sim, "swarm", progress)?;
    let mut mismatches = 0;
    for i in 0..size {
        let hops = take(&mut report.results, &node_name(i))?;
        let prev = (i + size - 1) % size;
        let expected = (0..config.systems).map(|s| (s, prev, 1));
        mismatches += hops.len().abs_diff(config.systems);
        mismatches += hops.iter().zip(expected).filter(|(got, want)| **got != *want).count();
    }

    let checked = size * config.systems;
    let metrics = ScenarioMetrics {
        checked,
        mismatches,
        ..ScenarioMetrics::from_agents(&report.agents)
    };
    let failure = (mismatches > 0).then(|| format!("{}/{} ring hops wrong", mismatches, checked));
    Ok(Outcome::new(&report, metrics, failure))
}
