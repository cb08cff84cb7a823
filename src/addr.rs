//! Identity primitives for actors and schedulers.
//!
//! A [`PostCode`] names a scheduler: a network-host part (one OS process or
//! remote host) and a port that is unique per scheduler within that host.
//! A [`BoxId`] keys an actor within a scheduler's directory, and an
//! [`Addr`] combines the two into a globally unique actor identity.
//!
//! Box identifiers are allocated as `(port << 48) | sequence`, which makes
//! them unique across every scheduler of a host. A migrating actor keeps
//! its box and only changes postcode, so forwarding entries can record the
//! new address with the same key.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Base port assigned to the first scheduler of a host; subsequent
/// schedulers count up from here.
pub const SCHEDULER_PORT_BASE: u16 = 24721;

/// The logical address of a scheduler.
///
/// Two postcodes with equal host parts are co-located in the same process;
/// fully equal postcodes name the same scheduler. The null postcode (empty
/// host, port zero) is the sentinel used in null actor addresses.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostCode {
    host: Arc<str>,
    port: u16,
}

impl PostCode {
    /// Creates a postcode from a host name and scheduler port.
    #[must_use]
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the null postcode sentinel.
    #[must_use]
    pub fn null() -> Self {
        Self {
            host: Arc::from(""),
            port: 0,
        }
    }

    /// Returns true if this is the null sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }

    /// The network-host part.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The scheduler-local part.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns true if both postcodes live in the same OS process.
    #[must_use]
    pub fn same_process(&self, other: &Self) -> bool {
        self.host == other.host
    }
}

impl fmt::Display for PostCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for PostCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostCode({self})")
    }
}

/// A per-scheduler actor key, unique for the lifetime of the scheduler.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BoxId(u64);

impl BoxId {
    /// The null box, reserved for the scheduler itself. Messages addressed
    /// to it are scheduler control messages, never actor dispatches.
    pub const NULL: Self = Self(0);

    /// Creates a box id from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates the box for `seq` on the scheduler listening on `port`.
    ///
    /// The port lands in the top 16 bits, so boxes never collide across the
    /// schedulers of one host.
    #[must_use]
    pub const fn allocate(port: u16, seq: u64) -> Self {
        Self((port as u64) << 48 | seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if this is the null box.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::Debug for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxId({:x})", self.0)
    }
}

/// A globally unique actor identity: a scheduler plus a box within it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addr {
    postcode: PostCode,
    box_id: BoxId,
}

impl Addr {
    /// Creates an address from its parts.
    #[must_use]
    pub const fn new(postcode: PostCode, box_id: BoxId) -> Self {
        Self { postcode, box_id }
    }

    /// The null address sentinel: null postcode, box zero.
    #[must_use]
    pub fn null() -> Self {
        Self {
            postcode: PostCode::null(),
            box_id: BoxId::NULL,
        }
    }

    /// The control address of a scheduler (box zero at its postcode).
    #[must_use]
    pub const fn scheduler(postcode: PostCode) -> Self {
        Self {
            postcode,
            box_id: BoxId::NULL,
        }
    }

    /// Returns true if this is the null sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.postcode.is_null() && self.box_id.is_null()
    }

    /// The scheduler part of the address.
    #[must_use]
    pub const fn postcode(&self) -> &PostCode {
        &self.postcode
    }

    /// The box part of the address.
    #[must_use]
    pub const fn box_id(&self) -> BoxId {
        self.box_id
    }

    /// Returns this address relocated to another scheduler, keeping the box.
    #[must_use]
    pub fn relocated(&self, postcode: PostCode) -> Self {
        Self {
            postcode,
            box_id: self.box_id,
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.postcode, self.box_id)
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr({self})")
    }
}
