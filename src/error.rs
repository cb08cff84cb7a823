//! Error types.
//!
//! Routing failures are recoverable and travel next to the rejected
//! message so the scheduler can notify the sender; everything in [`Error`]
//! either fails a single operation (`ShuttingDown`) or is fatal to the
//! host (`ThreadSpawn`). Dispatch errors in user handlers are not errors
//! at this level: they are caught, logged, and swallowed by the scheduler.

use std::io;
use thiserror::Error;

/// Result alias for swarmhost operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for host and scheduler operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The scheduler has been asked to shut down and accepts no new actors.
    #[error("scheduler is shutting down")]
    ShuttingDown,

    /// The host was configured with zero schedulers.
    #[error("host needs at least one scheduler")]
    NoSchedulers,

    /// An OS thread for a scheduler could not be spawned. Fatal.
    #[error("failed to spawn scheduler thread: {source}")]
    ThreadSpawn {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },
}

/// Why a message could not be accepted for cross-thread delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteFailure {
    /// The target lives on another network host; in-process routing does
    /// not cover it and a transport plugin has to take over.
    #[error("target is on another network host")]
    CrossHost,

    /// No peer with the target postcode is known.
    #[error("no peer scheduler with the target postcode")]
    UnknownPeer,

    /// The peer's inbound queue is at capacity.
    #[error("peer inbound queue is full")]
    QueueFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::ShuttingDown.to_string(),
            "scheduler is shutting down"
        );
        assert_eq!(
            RouteFailure::QueueFull.to_string(),
            "peer inbound queue is full"
        );
    }
}
