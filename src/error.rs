//! Error types for the penalty dynamics engine.
//!
//! Per-step numerical trouble (non-convergence, residual penetration, a
//! singular mass matrix) is never reported here; it is absorbed and logged.

use thiserror::Error;

use crate::session::SessionState;
use crate::utils::allocator::BodyHandle;

/// Errors raised by configuration, registration, activation and archiving.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration parameter was assigned an out-of-range value.
    #[error("invalid value {value} for `{name}`: expected {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    /// The world time step is not a positive finite number.
    #[error("invalid world time step {0}: must be positive and finite")]
    InvalidTimeStep(f64),

    /// A body description cannot be simulated.
    #[error("invalid body `{name}`: {reason}")]
    InvalidBody { name: String, reason: String },

    /// A reference motion cannot drive its body.
    #[error("{0}")]
    ReferenceMotion(String),

    /// A contact referenced a body that is not registered in the world.
    #[error("contact references unregistered body {0:?}")]
    UnregisteredBody(BodyHandle),

    /// A contact referenced a link index the body does not have.
    #[error("contact references link {link} of body {body:?}, which has {num_links} links")]
    InvalidLink {
        body: BodyHandle,
        link: usize,
        num_links: usize,
    },

    /// An operation was requested in a lifecycle state that does not allow it.
    #[error("cannot {operation} while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// An archived enumeration symbol is not recognized.
    #[error("unknown symbol `{symbol}` for archive key `{key}`")]
    UnknownSymbol { key: String, symbol: String },

    /// An archived value has the wrong type for its key.
    #[error("archive key `{key}` holds a value that is not {expected}")]
    ArchiveType { key: String, expected: &'static str },

    /// JSON encoding or decoding of an archive failed.
    #[error("archive serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient result alias used across the crate.
pub type Result<T> = std::result::Result<T, SimError>;
