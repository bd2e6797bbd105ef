//! Channels between agents.
//!
//! A channel is one direction of a point-to-point connection: a FIFO
//! [link](qlink_env::link) plus the sender's error pipeline, propagation delay
//! and pulse timing. Connecting two agents always wires both directions, each
//! with its own pipeline and RNG.
//!
//! ```text
//!  Alice                                             Bob
//!  ChannelTx ── pipeline ── clock.emit ── link ──▶ ChannelRx ── clock.observe
//!  ChannelRx ◀── link ── clock.emit ── pipeline ── ChannelTx
//! ```

use crate::agent::Agent;
use crate::error::{ChannelError, ConfigError};
use crate::noise::{ErrorPipeline, NoiseSpec};
use crate::ownership::Holder;
use crate::system::ParticleRef;
use crate::transmit::Transmit;
use qlink_env::{
    link, propagation_delay, validate_length, validate_pulse_length, AgentId, Envelope,
    LinkReceiver, LinkSender, LogicalClock,
};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Particle handles
    Quantum,
    /// Plain values
    Classical,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantum => "quantum",
            Self::Classical => "classical",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical parameters of a connection, shared by both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Fiber length in km
    pub length_km: f64,

    /// Pulse length override in seconds; the sender's own otherwise
    pub pulse_length: Option<f64>,

    /// Queue capacity; unbounded when `None`
    pub capacity: Option<usize>,

    /// Error models, applied in order
    pub noise: Vec<NoiseSpec>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            length_km: 0.0,
            pulse_length: None,
            capacity: None,
            noise: Vec::new(),
        }
    }
}

impl ChannelConfig {
    /// A noiseless, unbounded channel of the given length.
    pub fn new(length_km: f64) -> Self {
        Self { length_km, ..Self::default() }
    }

    pub fn with_pulse_length(mut self, pulse_length: f64) -> Self {
        self.pulse_length = Some(pulse_length);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_noise(mut self, spec: NoiseSpec) -> Self {
        self.noise.push(spec);
        self
    }

    /// Checks length, pulse length and every noise spec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_length(self.length_km)?;
        if let Some(pulse_length) = self.pulse_length {
            validate_pulse_length(pulse_length)?;
        }
        self.noise.iter().try_for_each(NoiseSpec::validate)
    }

    /// One-way propagation delay in seconds.
    pub fn propagation_delay(&self) -> f64 {
        propagation_delay(self.length_km)
    }
}

/// Traffic counters of one channel endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Items emitted (sender) or delivered (receiver), lost ones included
    pub items: u64,
    /// Of those, items lost in transit
    pub lost: u64,
}

/// Sending end of a channel.
pub struct ChannelTx<T> {
    peer: AgentId,
    kind: ChannelKind,
    link: LinkSender<T>,
    pipeline: ErrorPipeline<T>,
    rng: ChaCha8Rng,
    delay: f64,
    pulse_length: Option<f64>,
    stats: ChannelStats,
}

impl<T: Transmit> ChannelTx<T> {
    /// Sends one item.
    ///
    /// The item runs through the pipeline while the sender still holds it,
    /// then the sender's clock advances by its pulses and the envelope is
    /// stamped with the resulting time.
    pub(crate) fn send(
        &mut self,
        item: T,
        clock: &mut LogicalClock,
        default_pulse_length: f64,
        holder: Holder,
    ) -> Result<(), ChannelError> {
        item.claim().map_err(|source| self.transfer_error(source))?;
        let pulses = item.pulses();

        let item = self.pipeline.process(Some(item), &mut self.rng);
        if let Some(item) = &item {
            item.depart().map_err(|source| self.transfer_error(source))?;
        }
        let lost = item.is_none();

        let sent_at = clock.emit(pulses, self.pulse_length.unwrap_or(default_pulse_length));
        match self.link.send(item, sent_at, self.delay) {
            Ok(seq) => {
                self.stats.items += 1;
                if lost {
                    self.stats.lost += 1;
                }
                tracing::debug!(peer = %self.peer, kind = %self.kind, seq, sent_at, "sent");
                Ok(())
            }
            Err((err, payload)) => {
                // Nobody will receive it: hand it back to the sender
                if let Some(mut payload) = payload {
                    payload.arrive(holder);
                }
                Err(ChannelError::from_env(&self.peer, err))
            }
        }
    }

    fn transfer_error(&self, source: crate::error::ArenaError) -> ChannelError {
        ChannelError::Transfer { peer: self.peer.clone(), source }
    }
}

impl<T> ChannelTx<T> {
    pub fn peer(&self) -> &AgentId {
        &self.peer
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Returns the number of items waiting to be received.
    pub fn in_flight(&self) -> usize {
        self.link.in_flight()
    }

    /// Resets every model of the pipeline.
    pub fn reset_noise(&mut self) {
        self.pipeline.reset();
    }
}

impl<T> fmt::Debug for ChannelTx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTx")
            .field("peer", &self.peer)
            .field("kind", &self.kind)
            .field("pipeline", &self.pipeline)
            .field("delay", &self.delay)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Receiving end of a channel.
#[derive(Debug)]
pub struct ChannelRx<T> {
    peer: AgentId,
    kind: ChannelKind,
    link: LinkReceiver<T>,
    stats: ChannelStats,
}

impl<T: Transmit> ChannelRx<T> {
    /// Blocks until the next item from the peer arrives.
    pub(crate) fn recv(&mut self, clock: &mut LogicalClock, holder: Holder) -> Result<Option<T>, ChannelError> {
        let envelope = self
            .link
            .recv()
            .map_err(|err| ChannelError::from_env(&self.peer, err))?;
        Ok(self.deliver(envelope, clock, holder))
    }

    /// Like [`recv`](Self::recv), giving up after `timeout` of wall time.
    pub(crate) fn recv_timeout(
        &mut self,
        timeout: Duration,
        clock: &mut LogicalClock,
        holder: Holder,
    ) -> Result<Option<T>, ChannelError> {
        let envelope = self
            .link
            .recv_timeout(timeout)
            .map_err(|err| ChannelError::from_env(&self.peer, err))?;
        Ok(self.deliver(envelope, clock, holder))
    }

    fn deliver(&mut self, envelope: Envelope<T>, clock: &mut LogicalClock, holder: Holder) -> Option<T> {
        let now = clock.observe(envelope.arrival);
        self.stats.items += 1;
        tracing::debug!(peer = %self.peer, kind = %self.kind, seq = envelope.seq, now, "received");

        match envelope.payload {
            Some(mut item) => {
                item.arrive(holder);
                Some(item)
            }
            None => {
                self.stats.lost += 1;
                None
            }
        }
    }
}

impl<T> ChannelRx<T> {
    pub fn peer(&self) -> &AgentId {
        &self.peer
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }
}

/// One direction of a connection, before it is handed to the agents.
fn channel<T>(
    from: &AgentId,
    to: &AgentId,
    kind: ChannelKind,
    config: &ChannelConfig,
    pipeline: ErrorPipeline<T>,
    rng: ChaCha8Rng,
) -> (ChannelTx<T>, ChannelRx<T>) {
    let (tx, rx) = link(config.capacity);
    tracing::debug!(
        %from,
        %to,
        %kind,
        length_km = config.length_km,
        noise = ?pipeline,
        "channel created"
    );
    (
        ChannelTx {
            peer: to.clone(),
            kind,
            link: tx,
            pipeline,
            rng,
            delay: config.propagation_delay(),
            pulse_length: config.pulse_length,
            stats: ChannelStats::default(),
        },
        ChannelRx {
            peer: from.clone(),
            kind,
            link: rx,
            stats: ChannelStats::default(),
        },
    )
}

fn check_pair<M: Transmit, R: Send + 'static>(
    a: &Agent<M, R>,
    b: &Agent<M, R>,
    kind: ChannelKind,
    config: &ChannelConfig,
) -> Result<(), ConfigError> {
    if a.id() == b.id() {
        return Err(ConfigError::SelfConnection(a.id().clone()));
    }
    if !Arc::ptr_eq(a.arena(), b.arena()) {
        return Err(ConfigError::ArenaMismatch(a.id().clone(), b.id().clone()));
    }
    if a.is_connected(b.id(), kind) || b.is_connected(a.id(), kind) {
        return Err(ConfigError::DuplicateChannel {
            from: a.id().clone(),
            to: b.id().clone(),
            kind: kind.as_str(),
        });
    }
    config.validate()
}

fn seed_label(kind: ChannelKind, peer: &AgentId) -> String {
    match kind {
        ChannelKind::Quantum => format!("q->{peer}"),
        ChannelKind::Classical => format!("c->{peer}"),
    }
}

/// Connects two agents with a quantum channel in each direction.
///
/// Each direction gets its own pipeline built from `config.noise`.
pub fn qconnect<M: Transmit, R: Send + 'static>(
    a: &mut Agent<M, R>,
    b: &mut Agent<M, R>,
    config: &ChannelConfig,
) -> Result<(), ConfigError> {
    qconnect_with(a, b, config, ErrorPipeline::new)
}

/// Like [`qconnect`], starting each direction from `factory()`; the models of
/// `config.noise` are appended after the factory's.
pub fn qconnect_with<M, R, F>(
    a: &mut Agent<M, R>,
    b: &mut Agent<M, R>,
    config: &ChannelConfig,
    mut factory: F,
) -> Result<(), ConfigError>
where
    M: Transmit,
    R: Send + 'static,
    F: FnMut() -> ErrorPipeline<ParticleRef>,
{
    let kind = ChannelKind::Quantum;
    check_pair(a, b, kind, config)?;

    let mut rng_ab = a.seeds().rng(&seed_label(kind, b.id()));
    let mut rng_ba = b.seeds().rng(&seed_label(kind, a.id()));

    let mut pipeline_ab = factory();
    pipeline_ab.extend_quantum(&config.noise, config.length_km, &mut rng_ab)?;
    let mut pipeline_ba = factory();
    pipeline_ba.extend_quantum(&config.noise, config.length_km, &mut rng_ba)?;

    let (tx_ab, rx_ab) = channel(a.id(), b.id(), kind, config, pipeline_ab, rng_ab);
    let (tx_ba, rx_ba) = channel(b.id(), a.id(), kind, config, pipeline_ba, rng_ba);
    a.attach_quantum(tx_ab, rx_ba);
    b.attach_quantum(tx_ba, rx_ab);
    Ok(())
}

/// Connects two agents with a classical channel in each direction.
///
/// Quantum-only noise models in `config` are rejected.
pub fn cconnect<M: Transmit, R: Send + 'static>(
    a: &mut Agent<M, R>,
    b: &mut Agent<M, R>,
    config: &ChannelConfig,
) -> Result<(), ConfigError> {
    cconnect_with(a, b, config, ErrorPipeline::new)
}

/// Like [`cconnect`], starting each direction from `factory()`.
pub fn cconnect_with<M, R, F>(
    a: &mut Agent<M, R>,
    b: &mut Agent<M, R>,
    config: &ChannelConfig,
    mut factory: F,
) -> Result<(), ConfigError>
where
    M: Transmit,
    R: Send + 'static,
    F: FnMut() -> ErrorPipeline<M>,
{
    let kind = ChannelKind::Classical;
    check_pair(a, b, kind, config)?;

    let mut pipeline_ab = factory();
    pipeline_ab.extend_classical(&config.noise, config.length_km)?;
    let mut pipeline_ba = factory();
    pipeline_ba.extend_classical(&config.noise, config.length_km)?;

    let rng_ab = a.seeds().rng(&seed_label(kind, b.id()));
    let rng_ba = b.seeds().rng(&seed_label(kind, a.id()));
    let (tx_ab, rx_ab) = channel(a.id(), b.id(), kind, config, pipeline_ab, rng_ab);
    let (tx_ba, rx_ba) = channel(b.id(), a.id(), kind, config, pipeline_ba, rng_ba);
    a.attach_classical(tx_ab, rx_ba);
    b.attach_classical(tx_ba, rx_ab);
    Ok(())
}

/// Connects two agents with both a quantum and a classical channel.
///
/// The classical direction ignores quantum-only noise in `config`; both are
/// checked before anything is wired.
pub fn connect<M: Transmit, R: Send + 'static>(
    a: &mut Agent<M, R>,
    b: &mut Agent<M, R>,
    config: &ChannelConfig,
) -> Result<(), ConfigError> {
    let classical = ChannelConfig {
        noise: config
            .noise
            .iter()
            .filter(|spec| !spec.is_quantum_only())
            .cloned()
            .collect(),
        ..config.clone()
    };
    check_pair(a, b, ChannelKind::Quantum, config)?;
    check_pair(a, b, ChannelKind::Classical, &classical)?;
    qconnect(a, b, config)?;
    cconnect(a, b, &classical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::Attenuation;

    #[test]
    fn test_config_defaults() {
        let config: ChannelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ChannelConfig::default());
        assert_eq!(config.propagation_delay(), 0.0);
    }

    #[test]
    fn test_config_from_json() {
        let config: ChannelConfig = serde_json::from_str(
            r#"{"length_km": 10.0, "capacity": 4, "noise": [{"model": "loss", "probability": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(config.capacity, Some(4));
        assert_eq!(config.noise, vec![NoiseSpec::Loss { probability: 0.5 }]);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_validation() {
        assert!(ChannelConfig::new(-1.0).validate().is_err());
        assert!(ChannelConfig::new(f64::NAN).validate().is_err());
        assert!(ChannelConfig::new(1.0).with_pulse_length(0.0).validate().is_err());
        assert!(ChannelConfig::new(1.0)
            .with_noise(NoiseSpec::Loss { probability: 2.0 })
            .validate()
            .is_err());
        assert!(ChannelConfig::new(1.0).with_capacity(1).validate().is_ok());
    }

    #[test]
    fn test_channel_direction() {
        let alice = AgentId::from("Alice");
        let bob = AgentId::from("Bob");
        let config = ChannelConfig::new(2.998e5);
        let rng = qlink_env::SeedSequence::new(0).rng("test");
        let (mut tx, mut rx) = channel::<u8>(&alice, &bob, ChannelKind::Classical, &config, ErrorPipeline::new(), rng);
        assert_eq!(tx.peer(), &bob);
        assert_eq!(rx.peer(), &alice);

        let mut sender = LogicalClock::new();
        let mut receiver = LogicalClock::new();
        tx.send(7, &mut sender, 1e-3, Holder::DRIVER).unwrap();
        assert!((sender.now() - 8e-3).abs() < 1e-12);

        assert_eq!(rx.recv(&mut receiver, Holder::DRIVER).unwrap(), Some(7));
        // 8 pulses of 1 ms, then one second of flight
        assert!((receiver.now() - 1.008).abs() < 1e-9);
        assert_eq!(tx.stats(), ChannelStats { items: 1, lost: 0 });
        assert_eq!(rx.stats(), ChannelStats { items: 1, lost: 0 });
    }

    #[test]
    fn test_disconnected_receiver() {
        let alice = AgentId::from("Alice");
        let bob = AgentId::from("Bob");
        let rng = qlink_env::SeedSequence::new(0).rng("test");
        let (mut tx, rx) =
            channel::<u8>(&alice, &bob, ChannelKind::Classical, &ChannelConfig::default(), ErrorPipeline::new(), rng);
        drop(rx);

        let err = tx.send(1, &mut LogicalClock::new(), 1e-12, Holder::DRIVER).unwrap_err();
        assert_eq!(err, ChannelError::Disconnected { peer: bob });
    }

    #[test]
    fn test_failed_send_leaves_stats_untouched() {
        let alice = AgentId::from("Alice");
        let bob = AgentId::from("Bob");
        let rng = qlink_env::SeedSequence::new(0).rng("test");
        let pipeline = ErrorPipeline::<u8>::new().with(Attenuation::with_loss_probability(1.0).unwrap());
        let (mut tx, rx) =
            channel::<u8>(&alice, &bob, ChannelKind::Classical, &ChannelConfig::default(), pipeline, rng);

        // Lost in transit, but counted once it is actually on the link
        tx.send(1, &mut LogicalClock::new(), 1e-12, Holder::DRIVER).unwrap();
        assert_eq!(tx.stats(), ChannelStats { items: 1, lost: 1 });

        drop(rx);
        let err = tx.send(2, &mut LogicalClock::new(), 1e-12, Holder::DRIVER).unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(tx.stats(), ChannelStats { items: 1, lost: 1 });
    }
}
