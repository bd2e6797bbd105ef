//! Concurrency tests: many agents, many runs.
//!
//! Every run starts real OS threads over one shared arena; these tests repeat
//! runs to shake out ordering races between agents.

use qlink_core::{
    connect, gates, qconnect, ChannelConfig, ParticleStatus, QuantumArena, Simulation,
};
use std::collections::HashSet;

const AGENTS: usize = 4;
const RUNS: usize = 100;

/// Builds a ring of `AGENTS` agents. Each sends its own particle of every
/// system to the next agent and receives one from the previous agent.
fn ring_run(seed: u64) -> Simulation<u8, Vec<(usize, usize)>> {
    let arena = QuantumArena::allocate(AGENTS, 4).unwrap();
    let mut sim = Simulation::new(&arena, seed);
    let names: Vec<String> = (0..AGENTS).map(|i| format!("agent-{i}")).collect();

    let mut agents: Vec<_> = (0..AGENTS)
        .map(|i| {
            let next = names[(i + 1) % AGENTS].clone();
            let prev = names[(i + AGENTS - 1) % AGENTS].clone();
            sim.agent(names[i].as_str(), move |ctx| {
                let mut received = Vec::new();
                for system in ctx.stream() {
                    let q = system.qubit(i)?;
                    gates::x(&q)?;
                    ctx.qsend(&next, q)?;
                    ctx.csend(&next, i as u8)?;

                    let q = ctx.qrecv(&prev)?.expect("lossless ring");
                    let from = ctx.crecv(&prev)?.expect("lossless ring");
                    assert_eq!(from as usize, (i + AGENTS - 1) % AGENTS);
                    received.push(q.address());
                    assert_eq!(ctx.measure(q)?, 1);
                }
                ctx.output(received)?;
                Ok(())
            })
        })
        .collect();

    let config = ChannelConfig::new(5.0);
    for i in 0..AGENTS {
        let j = (i + 1) % AGENTS;
        let (left, right) = agents.split_at_mut(i.max(j));
        let (a, b) = if i < j { (&mut left[i], &mut right[0]) } else { (&mut right[0], &mut left[j]) };
        connect(a, b, &config).unwrap();
    }
    for agent in agents {
        sim.add(agent).unwrap();
    }
    sim
}

/// Test that the sink always ends up with exactly one result per agent.
#[test]
fn test_results_complete_over_repeated_runs() {
    for run in 0..RUNS {
        let report = ring_run(run as u64).run().unwrap();
        assert_eq!(report.results.len(), AGENTS, "run {run}");
        assert_eq!(report.agents.len(), AGENTS, "run {run}");

        for i in 0..AGENTS {
            let received = report.results.get(format!("agent-{i}").as_str()).unwrap();
            let prev = (i + AGENTS - 1) % AGENTS;
            let expected: Vec<_> = (0..4).map(|s| (s, prev)).collect();
            assert_eq!(received, &expected, "run {run}, agent {i}");
        }
    }
}

/// Test that particles end up held by their receivers.
#[test]
fn test_ledger_after_ring() {
    let sim = ring_run(1);
    let arena = sim.arena().clone();
    sim.run().unwrap();

    for system in 0..4 {
        let holders: HashSet<_> = (0..AGENTS)
            .map(|p| match arena.particle_status(system, p).unwrap() {
                ParticleStatus::Held(holder) => holder,
                other => panic!("particle ({system}, {p}) is {other}"),
            })
            .collect();
        assert_eq!(holders.len(), AGENTS);
    }
}

/// Test independent pairs sharing one arena but disjoint systems.
#[test]
fn test_disjoint_pairs_share_arena() {
    const PAIRS: usize = 4;
    for run in 0..20u64 {
        let arena = QuantumArena::allocate(2, PAIRS).unwrap();
        let mut sim = Simulation::<u8, u8>::new(&arena, run);

        for pair in 0..PAIRS {
            let sender = format!("s{pair}");
            let receiver = format!("r{pair}");
            let to = receiver.clone();
            let from = sender.clone();
            let mut a = sim.agent(sender, move |ctx| {
                let mut system = ctx.system(pair)?;
                let mut qubits = system.qubits();
                let (a, b) = (qubits.next().unwrap(), qubits.next().unwrap());
                gates::h(&a)?;
                gates::cnot_on(&a, &b)?;
                ctx.qsend(&to, b)?;
                let bit = ctx.measure(a)?;
                ctx.output(bit)?;
                Ok(())
            });
            let mut b = sim.agent(receiver, move |ctx| {
                let b = ctx.qrecv(&from)?.expect("lossless");
                let bit = ctx.measure(b)?;
                ctx.output(bit)?;
                Ok(())
            });
            qconnect(&mut a, &mut b, &ChannelConfig::default()).unwrap();
            sim.add(a).unwrap();
            sim.add(b).unwrap();
        }

        let report = sim.run().unwrap();
        assert_eq!(report.results.len(), 2 * PAIRS);
        for pair in 0..PAIRS {
            assert_eq!(
                report.results.get(format!("s{pair}").as_str()),
                report.results.get(format!("r{pair}").as_str()),
                "Bell pair {pair} disagrees in run {run}"
            );
        }
    }
}
