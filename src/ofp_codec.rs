//! Interface to the OpenFlow 1.0 wire codec.
//!
//! The codec itself lives outside the core; the controller hands it parsed
//! headers and raw body bytes on the way in, and data-model messages on the
//! way out.

use crate::error::Error;
use crate::message::Message;
use crate::ofp_header::{OfpHeader, Xid};

/// Marshal and parse OpenFlow 1.0 messages at the byte-buffer level.
///
/// `marshal` produces the complete framed message, header included. `parse`
/// receives the already-framed header and exactly the body bytes the
/// header's length field announced.
pub trait MessageCodec: Send + Sync + 'static {
    fn marshal(&self, xid: Xid, msg: Message) -> Result<Vec<u8>, Error>;

    fn parse(&self, header: &OfpHeader, body: &[u8]) -> Result<(Xid, Message), Error>;
}
