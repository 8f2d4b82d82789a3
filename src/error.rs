//! # Broker Error Handling
//!
//! This module defines the `BrokerError` enum for conditions that abort an
//! operation outright. Per-frame modeled outcomes (malformed frames, unknown
//! recipients, simulated drops) are *not* errors; they are logged
//! [`crate::drop_oracle::DropReason`] values, never an `Err` variant here.

use thiserror::Error;

/// Fatal or connection-level errors surfaced by the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The listener failed to bind its configured address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
