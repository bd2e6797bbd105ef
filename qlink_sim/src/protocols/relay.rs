//! Lossy classical relay A -> B -> C.
//!
//! B forwards whatever it receives, including the loss marker, so C's lost
//! fraction reflects both hops: `1 - (1 - p)^2` for per-hop loss `p`.

use super::{agent, execute, take, Outcome};
use crate::config::SimConfig;
use crate::error::HarnessError;
use crate::runner::ScenarioMetrics;
use qlink_core::{cconnect, AgentContext, AgentError, NoiseSpec, QuantumArena, Simulation};
use tracing::debug;

/// Lower bound on the accepted deviation from the expected lost fraction.
pub const MIN_TOLERANCE: f64 = 0.03;

type Ctx = AgentContext<Option<u8>, usize>;

pub fn source(items: usize) -> impl FnMut(&mut Ctx) -> Result<(), AgentError> + Send + 'static {
    move |ctx| {
        for i in 0..items {
            ctx.csend("B", Some((i % 256) as u8))?;
        }
        Ok(())
    }
}

/// Forwards every item; publishes the number forwarded.
pub fn forwarder(items: usize) -> impl FnMut(&mut Ctx) -> Result<(), AgentError> + Send + 'static {
    move |ctx| {
        let mut forwarded = 0;
        for _ in 0..items {
            let item = ctx.crecv("A")?;
            ctx.csend("C", item.flatten())?;
            forwarded += 1;
        }
        ctx.output(forwarded)?;
        Ok(())
    }
}

/// Publishes how many items arrived lost.
pub fn sink(items: usize) -> impl FnMut(&mut Ctx) -> Result<(), AgentError> + Send + 'static {
    move |ctx| {
        let mut lost = 0;
        for _ in 0..items {
            if ctx.crecv("B")?.flatten().is_none() {
                lost += 1;
            }
        }
        ctx.output(lost)?;
        Ok(())
    }
}

/// Expected lost fraction after two hops.
pub fn expected_loss(per_hop: f64) -> f64 {
    1.0 - (1.0 - per_hop).powi(2)
}

/// Accepted deviation: four standard deviations of the binomial estimate,
/// never below [`MIN_TOLERANCE`].
pub fn tolerance(items: usize, expected: f64) -> f64 {
    (4.0 * (expected * (1.0 - expected) / items as f64).sqrt()).max(MIN_TOLERANCE)
}

pub fn run(config: &SimConfig, seed: u64, progress: bool) -> Result<Outcome, HarnessError> {
    let items = config.relay_items;
    let arena = QuantumArena::allocate(1, 1)?;

    let mut sim = Simulation::new(&arena, seed);
    let mut a = agent(&sim, config, "A", source(items))?;
    let mut b = agent(&sim, config, "B", forwarder(items))?;
    let mut c = agent(&sim, config, "C", sink(items))?;
    let lossy = config.link().with_noise(NoiseSpec::Loss { probability: config.loss });
    cconnect(&mut a, &mut b, &lossy)?;
    cconnect(&mut b, &mut c, &lossy)?;
    sim.add(a)?;
    sim.add(b)?;
    sim.add(c)?;

    let mut report = execute(sim, "relay", progress)?;
    let forwarded = take(&mut report.results, "B")?;
    let lost = take(&mut report.results, "C")?;

    let observed = lost as f64 / items as f64;
    let expected = expected_loss(config.loss);
    let bound = tolerance(items, expected);
    debug!("Relay lost {:.4} (expected {:.4} +/- {:.4})", observed, expected, bound);

    let failure = if forwarded != items {
        Some(format!("B forwarded {} of {} items", forwarded, items))
    } else if (observed - expected).abs() > bound {
        Some(format!("lost fraction {:.4} outside {:.4} +/- {:.4}", observed, expected, bound))
    } else {
        None
    };
    let metrics = ScenarioMetrics {
        checked: items,
        loss_fraction: Some(observed),
        expected_loss: Some(expected),
        ..ScenarioMetrics::from_agents(&report.agents)
    };
    Ok(Outcome::new(&report, metrics, failure))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_loss() {
        assert_eq!(expected_loss(0.5), 0.75);
        assert_eq!(expected_loss(0.0), 0.0);
        assert_eq!(expected_loss(1.0), 1.0);
        assert!((expected_loss(0.1) - 0.19).abs() < 1e-12);
    }

    #[test]
    fn test_tolerance_floor() {
        assert_eq!(tolerance(10_000, 0.75), MIN_TOLERANCE);
        assert!(tolerance(100, 0.75) > MIN_TOLERANCE);
        assert_eq!(tolerance(100, 0.0), MIN_TOLERANCE);
    }

    #[test]
    fn test_relay_passes() {
        let config = SimConfig { relay_items: 2_000, ..Default::default() };
        let outcome = run(&config, 2024, false).unwrap();
        assert_eq!(outcome.failure, None);
        assert_eq!(outcome.metrics.expected_loss, Some(0.75));
        // A sent every item, B forwarded every item
        assert_eq!(outcome.metrics.items_sent, 4_000);
    }

    #[test]
    fn test_lossless_relay() {
        let config = SimConfig { relay_items: 500, loss: 0.0, ..Default::default() };
        let outcome = run(&config, 1, false).unwrap();
        assert_eq!(outcome.metrics.loss_fraction, Some(0.0));
        assert_eq!(outcome.metrics.items_lost, 0);
    }
}
