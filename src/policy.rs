//! Interface to the policy compiler.
//!
//! Policies are opaque to the core. The external compiler exposes exactly
//! two operations on a policy: specialize it to one switch's flow table, and
//! evaluate a located packet under it.

use std::sync::Arc;

use crate::message::SwitchId;
use crate::packet::HeadersValues;
use crate::table::FlowEntry;

/// A compiled network policy.
pub trait Policy: Send + Sync {
    /// The flow table realizing this policy on the given switch, ordered
    /// from most to least specific. Priorities are assigned at install time.
    fn compile(&self, sw: SwitchId) -> Vec<FlowEntry>;

    /// Evaluate one located packet, returning the resulting packets with
    /// their final locations (physical ports or application pipes).
    fn eval(&self, sw: SwitchId, pkt: &HeadersValues) -> Vec<HeadersValues>;
}

/// The policy that drops every packet: a single match-all entry with no
/// actions on every switch.
pub struct DropAll;

impl Policy for DropAll {
    fn compile(&self, _sw: SwitchId) -> Vec<FlowEntry> {
        vec![FlowEntry::new(
            crate::message::Pattern::match_all(),
            Vec::new(),
        )]
    }

    fn eval(&self, _sw: SwitchId, _pkt: &HeadersValues) -> Vec<HeadersValues> {
        Vec::new()
    }
}

/// Convenience constructor for the drop-everything policy.
pub fn drop_all() -> Arc<dyn Policy> {
    Arc::new(DropAll)
}
