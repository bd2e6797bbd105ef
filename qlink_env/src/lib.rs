//! qlink Environment Layer
//!
//! This crate provides the pieces of the simulated environment that agents
//! share but that know nothing about quantum state:
//! - Identity (`AgentId`)
//! - Time (`LogicalClock`, propagation delay, pulse timing)
//! - Transport (`link()`: blocking FIFO envelopes between agent threads)
//! - Randomness (`SeedSequence`: every stream derived from one 64-bit seed)
//!
//! # Example
//!
//! ```
//! use qlink_env::{link, LogicalClock, propagation_delay, DEFAULT_PULSE_LENGTH};
//!
//! let (mut tx, rx) = link::<u8>(None);
//! let mut alice = LogicalClock::new();
//! let mut bob = LogicalClock::new();
//!
//! let sent_at = alice.emit(8, DEFAULT_PULSE_LENGTH);
//! tx.send(Some(42), sent_at, propagation_delay(1.0)).unwrap();
//!
//! let envelope = rx.recv().unwrap();
//! bob.observe(envelope.arrival);
//! assert!(bob.now() > alice.now());
//! ```

mod clock;
mod error;
mod seed;
mod transport;
mod types;

pub use clock::{
    propagation_delay, validate_length, validate_pulse_length, LogicalClock, DEFAULT_PULSE_LENGTH,
    SIGNAL_SPEED_KM_S,
};
pub use error::EnvError;
pub use seed::SeedSequence;
pub use transport::{link, LinkReceiver, LinkSender};
pub use types::{AgentId, Envelope};
