//! Error types shared across the controller core.

use thiserror::Error;

use crate::message::SwitchId;
use crate::ofp_header::Xid;

/// Errors surfaced by the controller core.
///
/// Per-switch errors never abort the controller or a fleet-wide update, and
/// per-packet errors never abort the event pump; callers log and move on.
#[derive(Debug, Error)]
pub enum Error {
    /// An internal invariant was broken (empty compiled table, unsupported
    /// output in a consistent update, pipe location on the forwarding path).
    /// Fatal to the enclosing update attempt only.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// A header modification the core cannot realize on this packet.
    #[error("unsupported modification of {field}")]
    UnsupportedMod { field: &'static str },

    /// The switch connection refused the send.
    #[error("switch connection dropped the send")]
    SendDropped,

    /// No barrier reply arrived within the deadline.
    #[error("barrier xid {xid} timed out")]
    BarrierTimeout { xid: Xid },

    /// The session was torn down while an operation was in flight.
    #[error("switch {0:#018x} disconnected")]
    SwitchDisconnect(SwitchId),

    /// An operation was addressed to a switch with no live session.
    #[error("no session for switch {0:#018x}")]
    UnknownSwitch(SwitchId),

    /// The wire codec rejected a message.
    #[error("codec: {0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
