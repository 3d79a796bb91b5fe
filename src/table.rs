//! Flow tables: entries, install priorities, the table differ, and the
//! flow-mod builders used by the updaters.

use crate::error::Error;
use crate::message::{
    Action, FlowMod, FlowModCmd, Pattern, Priority, Timeout, VlanVersion,
};

/// One rule of a compiled flow table. Install priority is not part of the
/// entry; it is assigned when a table is written to a switch.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowEntry {
    pub pattern: Pattern,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
}

impl FlowEntry {
    pub fn new(pattern: Pattern, actions: Vec<Action>) -> FlowEntry {
        FlowEntry {
            pattern,
            actions,
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
        }
    }
}

/// Highest install priority; entries are installed downward from here.
pub const TOP_PRIORITY: Priority = 65535;

/// Assign strictly decreasing priorities starting at [`TOP_PRIORITY`] to a
/// compiled table, preserving its order.
pub fn prioritize(entries: Vec<FlowEntry>) -> Result<Vec<(Priority, FlowEntry)>, Error> {
    if entries.len() > usize::from(Priority::MAX) + 1 {
        return Err(Error::AssertionFailed(format!(
            "flow table of {} entries exceeds the priority space",
            entries.len()
        )));
    }
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| (TOP_PRIORITY - i as Priority, e))
        .collect())
}

/// Entries of `old` absent from `new`, to be deleted when moving a switch
/// from one table to the other.
///
/// Both inputs are sorted in strictly decreasing priority. Two entries are
/// the same rule when priority and pattern agree; actions are ignored, so an
/// action-only change is realized as an install with no delete. The result
/// is in ascending priority: deleting from the bottom up never leaves the
/// table without a low-priority catch-all before its replacement exists.
pub fn diff(
    old: &[(Priority, FlowEntry)],
    new: &[(Priority, FlowEntry)],
) -> Vec<(Priority, FlowEntry)> {
    let mut deletions = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < old.len() && j < new.len() {
        let (old_prio, old_entry) = &old[i];
        let (new_prio, new_entry) = &new[j];
        if old_prio > new_prio {
            deletions.push((*old_prio, old_entry.clone()));
            i += 1;
        } else if old_prio == new_prio && old_entry.pattern == new_entry.pattern {
            i += 1;
            j += 1;
        } else {
            // The new entry is an addition; nothing to delete for it.
            j += 1;
        }
    }
    for (prio, entry) in &old[i..] {
        deletions.push((*prio, entry.clone()));
    }
    deletions.reverse();
    deletions
}

/// Flow-mod installing one entry at the given priority.
pub fn add_flow(priority: Priority, entry: FlowEntry) -> FlowMod {
    FlowMod {
        command: FlowModCmd::AddFlow,
        pattern: entry.pattern,
        priority,
        actions: entry.actions,
        cookie: entry.cookie,
        idle_timeout: entry.idle_timeout,
        hard_timeout: entry.hard_timeout,
        notify_when_removed: false,
        apply_to_packet: None,
        out_port: None,
        check_overlap: false,
    }
}

/// Flow-mod deleting exactly one previously installed entry.
pub fn delete_strict_flow(priority: Priority, entry: FlowEntry) -> FlowMod {
    FlowMod {
        command: FlowModCmd::DeleteStrictFlow,
        pattern: entry.pattern,
        priority,
        actions: Vec::new(),
        cookie: entry.cookie,
        idle_timeout: Timeout::Permanent,
        hard_timeout: Timeout::Permanent,
        notify_when_removed: false,
        apply_to_packet: None,
        out_port: None,
        check_overlap: false,
    }
}

/// Non-strict flow-mod wiping the whole table.
pub fn delete_all_flows() -> FlowMod {
    FlowMod {
        command: FlowModCmd::DeleteFlow,
        pattern: Pattern::match_all(),
        priority: 0,
        actions: Vec::new(),
        cookie: 0,
        idle_timeout: Timeout::Permanent,
        hard_timeout: Timeout::Permanent,
        notify_when_removed: false,
        apply_to_packet: None,
        out_port: None,
        check_overlap: false,
    }
}

/// Non-strict, pattern-only flow-mod deleting every rule stamped with the
/// given version tag.
pub fn delete_tagged_flows(ver: VlanVersion) -> FlowMod {
    let mut pattern = Pattern::match_all();
    pattern.dl_vlan = Some(Some(ver));
    FlowMod {
        command: FlowModCmd::DeleteFlow,
        pattern,
        priority: 0,
        actions: Vec::new(),
        cookie: 0,
        idle_timeout: Timeout::Permanent,
        hard_timeout: Timeout::Permanent,
        notify_when_removed: false,
        apply_to_packet: None,
        out_port: None,
        check_overlap: false,
    }
}
