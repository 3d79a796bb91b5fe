//! Flow-table installation: the best-effort updater and the two-phase
//! per-packet-consistent updater.
//!
//! The consistent updater stamps every policy generation with a version tag
//! carried in the VLAN field while packets transit the core. Edge rules
//! match untagged traffic and tag it on entry; internal rules match the tag
//! and strip it wherever a packet leaves the network. Replacing a policy is
//! then three phases: install the new internal tables everywhere (barrier),
//! swap the edge tables everywhere (barrier), and finally delete the rules
//! of the previous generation, which nothing can match anymore.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{error, info};

use crate::barrier::{BarrierRegistry, BARRIER_TIMEOUT};
use crate::error::Error;
use crate::message::{Action, Message, PortId, Priority, PseudoPort, SwitchId, VlanVersion};
use crate::ofp_conn::ConnHandle;
use crate::policy::Policy;
use crate::session::SessionMap;
use crate::table::{self, FlowEntry};
use crate::topology::TopoHandle;

/// Rewrite an action list for a versioned table.
///
/// Every physical output is preceded by the VLAN set keeping the packet's
/// tag consistent with where it goes: tagged `ver` toward internal ports,
/// stripped toward edge ports and the controller. Outputs other than
/// physical ports and the controller cannot be versioned.
pub fn rewrite_actions(
    actions: &[Action],
    internal: &BTreeSet<PortId>,
    ver: VlanVersion,
) -> Result<Vec<Action>, Error> {
    let mut out = Vec::with_capacity(actions.len() * 2);
    for action in actions {
        match action {
            Action::Output(PseudoPort::PhysicalPort(p)) => {
                if internal.contains(p) {
                    out.push(Action::SetDlVlan(Some(ver)));
                } else {
                    out.push(Action::SetDlVlan(None));
                }
                out.push(*action);
            }
            Action::Output(PseudoPort::Controller(n)) => {
                out.push(Action::SetDlVlan(None));
                out.push(Action::Output(PseudoPort::Controller(*n)));
            }
            Action::Output(other) => {
                return Err(Error::AssertionFailed(format!(
                    "consistent update cannot version output {:?}",
                    other
                )))
            }
            other => out.push(*other),
        }
    }
    Ok(out)
}

/// The internal table for version `ver`: every rule of the compiled table,
/// matching only packets already stamped `ver`.
pub fn internal_table(
    table: Vec<FlowEntry>,
    internal: &BTreeSet<PortId>,
    ver: VlanVersion,
) -> Result<Vec<FlowEntry>, Error> {
    table
        .into_iter()
        .map(|mut entry| {
            entry.pattern.dl_vlan = Some(Some(ver));
            entry.actions = rewrite_actions(&entry.actions, internal, ver)?;
            Ok(entry)
        })
        .collect()
}

/// The edge table for version `ver`: the rules reachable from edge ports,
/// matching only untagged packets entering the network.
pub fn edge_table(
    table: Vec<FlowEntry>,
    internal: &BTreeSet<PortId>,
    ver: VlanVersion,
) -> Result<Vec<FlowEntry>, Error> {
    table
        .into_iter()
        .filter(|entry| match entry.pattern.in_port {
            None => true,
            Some(p) => !internal.contains(&p),
        })
        .map(|mut entry| {
            entry.pattern.dl_vlan = Some(None);
            entry.actions = rewrite_actions(&entry.actions, internal, ver)?;
            Ok(entry)
        })
        .collect()
}

fn install_table(conn: &ConnHandle, table: &[(Priority, FlowEntry)]) -> Result<(), Error> {
    for (prio, entry) in table {
        conn.send(0, Message::FlowMod(table::add_flow(*prio, entry.clone())))?;
    }
    Ok(())
}

/// Replace one switch's table outright: wipe it, then install the compiled
/// policy top-down. No barrier; packets in flight may momentarily see an
/// empty table.
pub fn best_effort(
    sessions: &SessionMap,
    sw: SwitchId,
    policy: &Arc<dyn Policy>,
) -> Result<(), Error> {
    let conn = sessions.conn(sw).ok_or(Error::UnknownSwitch(sw))?;
    let compiled = policy.compile(sw);
    if compiled.is_empty() {
        return Err(Error::AssertionFailed(format!(
            "policy compiled to an empty table for switch {:#018x}",
            sw
        )));
    }
    conn.send(0, Message::FlowMod(table::delete_all_flows()))?;
    let prioritized = table::prioritize(compiled)?;
    install_table(&conn, &prioritized)?;
    sessions.set_policy(sw, policy.clone());
    sessions.set_installed_edge(sw, prioritized);
    Ok(())
}

/// [`best_effort`] across every connected switch; failures are logged per
/// switch and never stop the rest.
pub fn best_effort_all(sessions: &SessionMap, policy: &Arc<dyn Policy>) {
    for sw in sessions.switches() {
        if let Err(e) = best_effort(sessions, sw, policy) {
            error!("best-effort update failed on switch {:#018x}: {}", sw, e);
        }
    }
}

/// The two-phase per-packet-consistent updater.
pub struct ConsistentUpdate<'a> {
    sessions: &'a SessionMap,
    topo: &'a TopoHandle,
    barriers: &'a BarrierRegistry,
    barrier_timeout: Duration,
}

impl<'a> ConsistentUpdate<'a> {
    pub fn new(
        sessions: &'a SessionMap,
        topo: &'a TopoHandle,
        barriers: &'a BarrierRegistry,
    ) -> ConsistentUpdate<'a> {
        ConsistentUpdate {
            sessions,
            topo,
            barriers,
            barrier_timeout: BARRIER_TIMEOUT,
        }
    }

    pub fn with_barrier_timeout(mut self, deadline: Duration) -> ConsistentUpdate<'a> {
        self.barrier_timeout = deadline;
        self
    }

    /// Move the fleet from version `next_ver - 1` to `next_ver` under the
    /// given policy.
    ///
    /// Within each phase the switches proceed in parallel; a phase ends only
    /// when every switch has resolved (success, error, or timeout), and the
    /// next begins only then. Per-switch failures are logged and do not roll
    /// the fleet back: a stuck switch is reconciled when it reconnects,
    /// while pinning the version would halt every later update.
    pub async fn apply(&self, policy: &Arc<dyn Policy>, next_ver: VlanVersion) {
        let switches = self.sessions.switches();
        info!(
            "consistent update to version {} across {} switches",
            next_ver,
            switches.len()
        );

        let results = join_all(
            switches
                .iter()
                .map(|&sw| self.install_internal(sw, policy, next_ver)),
        )
        .await;
        report("internal", &switches, results);

        let results = join_all(
            switches
                .iter()
                .map(|&sw| self.install_edge(sw, policy, next_ver)),
        )
        .await;
        report("edge", &switches, results);

        let results = join_all(
            switches
                .iter()
                .map(|&sw| async move { self.collect_garbage(sw, next_ver.wrapping_sub(1)) }),
        )
        .await;
        report("garbage-collect", &switches, results);
    }

    /// Phase I: install the new generation's internal table. The old edge
    /// rules still steer ingress traffic, but a packet stamped `ver` now
    /// follows `ver` rules end-to-end.
    async fn install_internal(
        &self,
        sw: SwitchId,
        policy: &Arc<dyn Policy>,
        ver: VlanVersion,
    ) -> Result<(), Error> {
        let conn = self.sessions.conn(sw).ok_or(Error::UnknownSwitch(sw))?;
        let internal = self.topo.internal_ports(sw);
        let compiled = policy.compile(sw);
        if compiled.is_empty() {
            return Err(Error::AssertionFailed(format!(
                "policy compiled to an empty table for switch {:#018x}",
                sw
            )));
        }
        let prioritized = table::prioritize(internal_table(compiled, &internal, ver)?)?;
        install_table(&conn, &prioritized)?;
        self.barriers
            .send_barrier_timeout(sw, &conn, self.barrier_timeout)
            .await
    }

    /// Phase II: swap the edge table. Install the new rules, delete what the
    /// diff says is stale from the bottom up, and record the result once the
    /// barrier confirms it.
    async fn install_edge(
        &self,
        sw: SwitchId,
        policy: &Arc<dyn Policy>,
        ver: VlanVersion,
    ) -> Result<(), Error> {
        let conn = self.sessions.conn(sw).ok_or(Error::UnknownSwitch(sw))?;
        let internal = self.topo.internal_ports(sw);
        let edge = edge_table(policy.compile(sw), &internal, ver)?;
        let new_table = table::prioritize(edge)?;
        let old_table = self.sessions.installed_edge(sw);
        let deletions = table::diff(&old_table, &new_table);

        install_table(&conn, &new_table)?;
        for (prio, entry) in deletions {
            conn.send(0, Message::FlowMod(table::delete_strict_flow(prio, entry)))?;
        }
        self.barriers
            .send_barrier_timeout(sw, &conn, self.barrier_timeout)
            .await?;

        self.sessions.set_installed_edge(sw, new_table);
        self.sessions.set_policy(sw, policy.clone());
        Ok(())
    }

    /// Phase III: delete the previous generation's rules. No barrier; no
    /// packet anywhere still carries the old tag.
    fn collect_garbage(&self, sw: SwitchId, old_ver: VlanVersion) -> Result<(), Error> {
        let conn = self.sessions.conn(sw).ok_or(Error::UnknownSwitch(sw))?;
        conn.send(0, Message::FlowMod(table::delete_tagged_flows(old_ver)))
    }
}

fn report(phase: &str, switches: &[SwitchId], results: Vec<Result<(), Error>>) {
    for (sw, result) in switches.iter().zip(results) {
        if let Err(e) = result {
            error!("{} phase failed on switch {:#018x}: {}", phase, sw, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FlowModCmd, Pattern, Timeout};
    use crate::ofp_header::Xid;
    use crate::packet::HeadersValues;
    use crate::policy::DropAll;
    use crate::session::SwitchSession;
    use crate::table::TOP_PRIORITY;
    use crate::topology::PortPeer;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    const SW_A: SwitchId = 1;
    const SW_B: SwitchId = 2;

    /// A switch stand-in: records everything the updater sends and, when
    /// asked to, answers barrier requests through the registry.
    fn spawn_switch(
        barriers: Arc<BarrierRegistry>,
        mut rx: mpsc::UnboundedReceiver<(Xid, Message)>,
        answer_barriers: bool,
    ) -> tokio::task::JoinHandle<Vec<(Xid, Message)>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some((xid, msg)) = rx.recv().await {
                if answer_barriers && msg == Message::BarrierRequest {
                    barriers.resolve(xid);
                }
                seen.push((xid, msg));
            }
            seen
        })
    }

    /// "forward p1 -> p2" over a two-switch line: A's edge port 1 feeds the
    /// inter-switch link on port 3; B forwards from the link out its edge
    /// port 2.
    struct ForwardAcross;

    impl Policy for ForwardAcross {
        fn compile(&self, sw: SwitchId) -> Vec<FlowEntry> {
            let mut pattern = Pattern::match_all();
            let out = match sw {
                SW_A => {
                    pattern.in_port = Some(1);
                    3
                }
                _ => {
                    pattern.in_port = Some(3);
                    2
                }
            };
            vec![FlowEntry::new(
                pattern,
                vec![Action::Output(PseudoPort::PhysicalPort(out))],
            )]
        }

        fn eval(&self, _sw: SwitchId, _pkt: &HeadersValues) -> Vec<HeadersValues> {
            Vec::new()
        }
    }

    struct EmptyPolicy;

    impl Policy for EmptyPolicy {
        fn compile(&self, _sw: SwitchId) -> Vec<FlowEntry> {
            Vec::new()
        }

        fn eval(&self, _sw: SwitchId, _pkt: &HeadersValues) -> Vec<HeadersValues> {
            Vec::new()
        }
    }

    fn two_switch_line() -> (SessionMap, TopoHandle, HashMap<SwitchId, mpsc::UnboundedReceiver<(Xid, Message)>>) {
        let sessions = SessionMap::new();
        let topo = TopoHandle::new();
        let mut rxs = HashMap::new();
        for sw in [SW_A, SW_B] {
            let (conn, rx) = ConnHandle::pair();
            sessions.insert(SwitchSession::new(sw, conn));
            rxs.insert(sw, rx);
            topo.switch_up(sw);
            topo.port_up(sw, 3);
        }
        topo.port_up(SW_A, 1);
        topo.port_up(SW_B, 2);
        topo.add_link(SW_A, 3, PortPeer::Switch(SW_B, 3));
        topo.add_link(SW_B, 3, PortPeer::Switch(SW_A, 3));
        (sessions, topo, rxs)
    }

    fn internal_set(ports: &[PortId]) -> BTreeSet<PortId> {
        ports.iter().copied().collect()
    }

    #[test]
    fn rewrite_tags_internal_and_strips_edge_outputs() {
        let internal = internal_set(&[3]);
        let actions = vec![
            Action::SetDlSrc(5),
            Action::Output(PseudoPort::PhysicalPort(3)),
            Action::Output(PseudoPort::PhysicalPort(1)),
            Action::Output(PseudoPort::Controller(128)),
        ];
        let rewritten = rewrite_actions(&actions, &internal, 7).unwrap();
        assert_eq!(
            rewritten,
            vec![
                Action::SetDlSrc(5),
                Action::SetDlVlan(Some(7)),
                Action::Output(PseudoPort::PhysicalPort(3)),
                Action::SetDlVlan(None),
                Action::Output(PseudoPort::PhysicalPort(1)),
                Action::SetDlVlan(None),
                Action::Output(PseudoPort::Controller(128)),
            ]
        );
    }

    #[test]
    fn rewrite_rejects_unversionable_outputs() {
        let internal = internal_set(&[]);
        for bad in [PseudoPort::Flood, PseudoPort::AllPorts, PseudoPort::InPort] {
            assert!(matches!(
                rewrite_actions(&[Action::Output(bad)], &internal, 2),
                Err(Error::AssertionFailed(_))
            ));
        }
    }

    #[test]
    fn edge_table_keeps_only_edge_ingress_rules() {
        let internal = internal_set(&[3]);
        let mut from_edge = Pattern::match_all();
        from_edge.in_port = Some(1);
        let mut from_core = Pattern::match_all();
        from_core.in_port = Some(3);

        let table = vec![
            FlowEntry::new(from_edge.clone(), Vec::new()),
            FlowEntry::new(from_core, Vec::new()),
            FlowEntry::new(Pattern::match_all(), Vec::new()),
        ];
        let edge = edge_table(table, &internal, 4).unwrap();
        assert_eq!(edge.len(), 2);
        assert_eq!(edge[0].pattern.in_port, Some(1));
        assert_eq!(edge[1].pattern.in_port, None);
        for entry in &edge {
            assert_eq!(entry.pattern.dl_vlan, Some(None));
        }
    }

    #[test]
    fn internal_table_stamps_the_new_version() {
        let internal = internal_set(&[3]);
        let table = vec![FlowEntry::new(
            Pattern::match_all(),
            vec![Action::Output(PseudoPort::PhysicalPort(3))],
        )];
        let stamped = internal_table(table, &internal, 9).unwrap();
        assert_eq!(stamped[0].pattern.dl_vlan, Some(Some(9)));
        assert_eq!(
            stamped[0].actions,
            vec![
                Action::SetDlVlan(Some(9)),
                Action::Output(PseudoPort::PhysicalPort(3)),
            ]
        );
    }

    #[tokio::test]
    async fn best_effort_wipes_then_installs_descending() {
        let (sessions, _topo, mut rxs) = two_switch_line();
        let policy: Arc<dyn Policy> = Arc::new(ForwardAcross);

        best_effort(&sessions, SW_A, &policy).unwrap();
        drop(sessions);

        let mut rx = rxs.remove(&SW_A).unwrap();
        let mut seen = Vec::new();
        while let Ok((_, msg)) = rx.try_recv() {
            seen.push(msg);
        }
        assert_eq!(seen.len(), 2);
        match &seen[0] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::DeleteFlow);
                assert_eq!(fm.pattern, Pattern::match_all());
            }
            other => panic!("expected delete-all first, got {:?}", other),
        }
        match &seen[1] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::AddFlow);
                assert_eq!(fm.priority, TOP_PRIORITY);
                assert_eq!(fm.idle_timeout, Timeout::Permanent);
            }
            other => panic!("expected an install, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn best_effort_rejects_an_empty_compiled_table() {
        let (sessions, _topo, _rxs) = two_switch_line();
        let policy: Arc<dyn Policy> = Arc::new(EmptyPolicy);
        assert!(matches!(
            best_effort(&sessions, SW_A, &policy),
            Err(Error::AssertionFailed(_))
        ));
    }

    #[tokio::test]
    async fn consistent_update_shapes_the_two_switch_line() {
        let (sessions, topo, mut rxs) = two_switch_line();
        let barriers = Arc::new(BarrierRegistry::new());

        // initial generation: the default drop policy, installed best-effort
        let drop_policy: Arc<dyn Policy> = Arc::new(DropAll);
        best_effort(&sessions, SW_A, &drop_policy).unwrap();
        best_effort(&sessions, SW_B, &drop_policy).unwrap();

        let switch_a = spawn_switch(barriers.clone(), rxs.remove(&SW_A).unwrap(), true);
        let switch_b = spawn_switch(barriers.clone(), rxs.remove(&SW_B).unwrap(), true);

        let policy: Arc<dyn Policy> = Arc::new(ForwardAcross);
        ConsistentUpdate::new(&sessions, &topo, &barriers)
            .apply(&policy, 2)
            .await;

        let edge_a = sessions.installed_edge(SW_A);
        assert_eq!(edge_a.len(), 1);
        assert_eq!(edge_a[0].0, TOP_PRIORITY);
        assert_eq!(edge_a[0].1.pattern.dl_vlan, Some(None));
        assert_eq!(edge_a[0].1.pattern.in_port, Some(1));

        drop(sessions);
        let seen_a: Vec<Message> = switch_a.await.unwrap().into_iter().map(|(_, m)| m).collect();
        let seen_b: Vec<Message> = switch_b.await.unwrap().into_iter().map(|(_, m)| m).collect();

        // skip the best-effort prelude (delete-all + one drop rule)
        let update_a = &seen_a[2..];

        // phase I: the internal rule, stamped and tagged toward the link
        match &update_a[0] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::AddFlow);
                assert_eq!(fm.priority, TOP_PRIORITY);
                assert_eq!(fm.pattern.dl_vlan, Some(Some(2)));
                assert_eq!(fm.pattern.in_port, Some(1));
                assert_eq!(
                    fm.actions,
                    vec![
                        Action::SetDlVlan(Some(2)),
                        Action::Output(PseudoPort::PhysicalPort(3)),
                    ]
                );
            }
            other => panic!("phase I should install, got {:?}", other),
        }
        assert_eq!(update_a[1], Message::BarrierRequest);

        // phase II: the edge rule matches untagged ingress traffic
        match &update_a[2] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::AddFlow);
                assert_eq!(fm.pattern.dl_vlan, Some(None));
                assert_eq!(fm.pattern.in_port, Some(1));
                assert_eq!(
                    fm.actions,
                    vec![
                        Action::SetDlVlan(Some(2)),
                        Action::Output(PseudoPort::PhysicalPort(3)),
                    ]
                );
            }
            other => panic!("phase II should install, got {:?}", other),
        }
        // the drop generation's edge rule goes away
        match &update_a[3] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::DeleteStrictFlow);
                assert_eq!(fm.priority, TOP_PRIORITY);
                assert_eq!(fm.pattern, Pattern::match_all());
            }
            other => panic!("phase II should delete the stale edge rule, got {:?}", other),
        }
        assert_eq!(update_a[4], Message::BarrierRequest);

        // phase III: pattern-only delete of the old generation
        match &update_a[5] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::DeleteFlow);
                assert_eq!(fm.priority, 0);
                assert_eq!(fm.pattern.dl_vlan, Some(Some(1)));
            }
            other => panic!("phase III should collect garbage, got {:?}", other),
        }
        assert_eq!(update_a.len(), 6);

        // no surviving rule carries a tag other than the current generation
        for msg in update_a {
            if let Message::FlowMod(fm) = msg {
                if fm.command == FlowModCmd::AddFlow {
                    assert!(matches!(fm.pattern.dl_vlan, Some(Some(2)) | Some(None)));
                }
            }
        }

        // B has no edge ingress rule: phase II is a bare swap with a barrier
        let update_b = &seen_b[2..];
        match &update_b[0] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.pattern.dl_vlan, Some(Some(2)));
                assert_eq!(fm.pattern.in_port, Some(3));
                assert_eq!(
                    fm.actions,
                    vec![
                        Action::SetDlVlan(None),
                        Action::Output(PseudoPort::PhysicalPort(2)),
                    ]
                );
            }
            other => panic!("phase I should install on B, got {:?}", other),
        }
        assert_eq!(update_b[1], Message::BarrierRequest);
        // phase II: nothing to add, but the stale drop rule is deleted
        match &update_b[2] {
            Message::FlowMod(fm) => assert_eq!(fm.command, FlowModCmd::DeleteStrictFlow),
            other => panic!("expected stale-edge delete on B, got {:?}", other),
        }
        assert_eq!(update_b[3], Message::BarrierRequest);
        match &update_b[4] {
            Message::FlowMod(fm) => {
                assert_eq!(fm.command, FlowModCmd::DeleteFlow);
                assert_eq!(fm.pattern.dl_vlan, Some(Some(1)));
            }
            other => panic!("phase III should collect garbage on B, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_silent_switch_times_out_without_stalling_the_fleet() {
        let (sessions, topo, mut rxs) = two_switch_line();
        let barriers = Arc::new(BarrierRegistry::new());

        let responsive = spawn_switch(barriers.clone(), rxs.remove(&SW_A).unwrap(), true);
        let silent = spawn_switch(barriers.clone(), rxs.remove(&SW_B).unwrap(), false);

        let policy: Arc<dyn Policy> = Arc::new(ForwardAcross);
        ConsistentUpdate::new(&sessions, &topo, &barriers)
            .apply(&policy, 2)
            .await;

        drop(sessions);
        let seen_silent: Vec<Message> =
            silent.await.unwrap().into_iter().map(|(_, m)| m).collect();
        let seen_ok: Vec<Message> =
            responsive.await.unwrap().into_iter().map(|(_, m)| m).collect();

        // the silent switch still saw all three phases attempted
        let gc = seen_silent
            .iter()
            .filter(|m| {
                matches!(m, Message::FlowMod(fm)
                    if fm.command == FlowModCmd::DeleteFlow
                        && fm.pattern.dl_vlan == Some(Some(1)))
            })
            .count();
        assert_eq!(gc, 1);
        // and the healthy switch completed normally
        assert!(seen_ok.contains(&Message::BarrierRequest));
        assert!(seen_ok.iter().any(|m| {
            matches!(m, Message::FlowMod(fm) if fm.pattern.dl_vlan == Some(Some(1)))
        }));
    }

    #[tokio::test]
    async fn queued_updates_take_consecutive_versions() {
        let (sessions, topo, mut rxs) = two_switch_line();
        let barriers = Arc::new(BarrierRegistry::new());
        let switch_a = spawn_switch(barriers.clone(), rxs.remove(&SW_A).unwrap(), true);
        let _switch_b = spawn_switch(barriers.clone(), rxs.remove(&SW_B).unwrap(), true);

        let policy: Arc<dyn Policy> = Arc::new(ForwardAcross);
        let update = ConsistentUpdate::new(&sessions, &topo, &barriers);
        update.apply(&policy, 2).await;
        update.apply(&policy, 3).await;

        drop(update);
        drop(sessions);
        let seen: Vec<Message> = switch_a.await.unwrap().into_iter().map(|(_, m)| m).collect();

        let tags: Vec<Option<Option<u16>>> = seen
            .iter()
            .filter_map(|m| match m {
                Message::FlowMod(fm) if fm.command == FlowModCmd::AddFlow => {
                    Some(fm.pattern.dl_vlan)
                }
                _ => None,
            })
            .collect();
        // generation 2 installs, then generation 3
        assert_eq!(
            tags,
            vec![
                Some(Some(2)),
                Some(None),
                Some(Some(3)),
                Some(None),
            ]
        );
        let gcs: Vec<_> = seen
            .iter()
            .filter_map(|m| match m {
                Message::FlowMod(fm) if fm.command == FlowModCmd::DeleteFlow => {
                    Some(fm.pattern.dl_vlan)
                }
                _ => None,
            })
            .collect();
        assert_eq!(gcs, vec![Some(Some(1)), Some(Some(2))]);
    }
}
