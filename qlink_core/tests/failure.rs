//! Failure propagation: a failing agent must not hang the run.

use qlink_core::{
    cconnect, connect, AgentError, ArenaError, ChannelConfig, ChannelError, QuantumArena,
    SimError, Simulation,
};
use std::time::Duration;

/// Test that a peer blocked on a failed agent wakes up and the driver names
/// the agent that actually failed.
#[test]
fn test_failed_agent_releases_peers() {
    let arena = QuantumArena::allocate(1, 1).unwrap();
    let mut sim = Simulation::<u8, u8>::new(&arena, 0);

    let mut alice = sim.agent("Alice", |_ctx| Err(AgentError::protocol("refusing to send")));
    let mut bob = sim.agent("Bob", |ctx| {
        let value = ctx.crecv("Alice")?;
        ctx.output(value.unwrap_or(0))?;
        Ok(())
    });
    let mut carol = sim.agent("Carol", |ctx| {
        // Waits on Bob, who fails because of Alice
        let value = ctx.crecv("Bob")?;
        ctx.output(value.unwrap_or(0))?;
        Ok(())
    });
    cconnect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
    cconnect(&mut bob, &mut carol, &ChannelConfig::default()).unwrap();
    sim.add(carol).unwrap();
    sim.add(bob).unwrap();
    sim.add(alice).unwrap();

    match sim.run().unwrap_err() {
        SimError::AgentFailed { agent, source } => {
            assert_eq!(agent.as_str(), "Alice");
            assert!(matches!(source, AgentError::Protocol(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Test that a panicking agent is reported as such.
#[test]
fn test_panicking_agent_releases_peers() {
    let arena = QuantumArena::allocate(1, 1).unwrap();
    let mut sim = Simulation::<u8, u8>::new(&arena, 0);

    let mut alice = sim.agent("Alice", |_ctx| -> Result<(), AgentError> { panic!("lost the plot") });
    let mut bob = sim.agent("Bob", |ctx| {
        ctx.qrecv("Alice")?;
        Ok(())
    });
    connect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
    sim.add(alice).unwrap();
    sim.add(bob).unwrap();

    match sim.run().unwrap_err() {
        SimError::AgentPanicked { agent, message } => {
            assert_eq!(agent.as_str(), "Alice");
            assert!(message.contains("lost the plot"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Test that protocols can bound their waits on a live peer.
#[test]
fn test_receive_timeout() {
    let arena = QuantumArena::allocate(1, 1).unwrap();
    let mut sim = Simulation::<u8, u8>::new(&arena, 0);

    let mut alice = sim.agent("Alice", |ctx| {
        // Keep the link open until Bob has given up
        let _ = ctx.crecv("Bob")?;
        Ok(())
    });
    let mut bob = sim.agent("Bob", |ctx| {
        match ctx.crecv_timeout("Alice", Duration::from_millis(20)) {
            Err(ChannelError::Timeout { millis, .. }) => ctx.output(millis as u8)?,
            other => return Err(AgentError::protocol(format!("expected timeout, got {other:?}"))),
        }
        ctx.csend("Alice", 1)?;
        Ok(())
    });
    cconnect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
    sim.add(alice).unwrap();
    sim.add(bob).unwrap();

    let report = sim.run().unwrap();
    assert_eq!(report.results.get("Bob"), Some(&20));
}

/// Test that using a particle one does not hold fails the agent.
#[test]
fn test_non_holder_is_rejected() {
    let arena = QuantumArena::allocate(2, 1).unwrap();
    let mut sim = Simulation::<u8, u8>::new(&arena, 0);

    let mut alice = sim.agent("Alice", |ctx| {
        let q = ctx.system(0)?.qubit(0)?;
        qlink_core::gates::x(&q)?;
        ctx.csend("Bob", 1)?;
        Ok(())
    });
    let mut bob = sim.agent("Bob", |ctx| {
        ctx.crecv("Alice")?;
        // Alice claimed this particle and never sent it
        let stolen = ctx.system(0)?.qubit(0)?;
        qlink_core::gates::x(&stolen)?;
        Ok(())
    });
    cconnect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
    sim.add(alice).unwrap();
    sim.add(bob).unwrap();

    match sim.run().unwrap_err() {
        SimError::AgentFailed { agent, source } => {
            assert_eq!(agent.as_str(), "Bob");
            assert!(matches!(source, AgentError::Arena(ArenaError::NotHolder { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Test that sending a particle twice is impossible: the second handle is stale.
#[test]
fn test_cannot_send_particle_not_held() {
    let arena = QuantumArena::allocate(1, 1).unwrap();
    let mut sim = Simulation::<u8, u8>::new(&arena, 0);

    let mut alice = sim.agent("Alice", |ctx| {
        let q = ctx.system(0)?.qubit(0)?;
        let copy = ctx.system(0)?.qubit(0)?;
        ctx.qsend("Bob", q)?;
        ctx.qsend("Bob", copy)?;
        Ok(())
    });
    let mut bob = sim.agent("Bob", |ctx| {
        while ctx.qrecv("Alice").is_ok() {}
        Ok(())
    });
    connect(&mut alice, &mut bob, &ChannelConfig::default()).unwrap();
    sim.add(alice).unwrap();
    sim.add(bob).unwrap();

    match sim.run().unwrap_err() {
        SimError::AgentFailed { agent, source } => {
            assert_eq!(agent.as_str(), "Alice");
            assert!(matches!(source, AgentError::Channel(ChannelError::Transfer { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
}
