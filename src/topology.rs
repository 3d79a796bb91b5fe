//! Controller-side view of the network graph.
//!
//! Switches and their usable ports are recorded by the event translator as
//! connections come and go; links and host attachments are pushed in by the
//! external discovery component through the shared handle. The view is an
//! adjacency structure keyed by switch and port ids.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::message::{PortId, SwitchId};

/// What sits at the far end of a switch port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PortPeer {
    /// Another known switch; ports with a switch peer are *internal*.
    Switch(SwitchId, PortId),
    /// A host, by MAC address.
    Host(u64),
    Unknown,
}

#[derive(Default)]
pub struct Topology {
    ports: HashMap<SwitchId, BTreeSet<PortId>>,
    links: HashMap<(SwitchId, PortId), PortPeer>,
}

impl Topology {
    pub fn switch_up(&mut self, sw: SwitchId) {
        self.ports.entry(sw).or_default();
    }

    pub fn switch_down(&mut self, sw: SwitchId) {
        self.ports.remove(&sw);
        self.links.retain(|(s, _), peer| {
            *s != sw && !matches!(peer, PortPeer::Switch(peer_sw, _) if *peer_sw == sw)
        });
    }

    pub fn port_up(&mut self, sw: SwitchId, port: PortId) {
        self.ports.entry(sw).or_default().insert(port);
    }

    pub fn port_down(&mut self, sw: SwitchId, port: PortId) {
        if let Some(ports) = self.ports.get_mut(&sw) {
            ports.remove(&port);
        }
        self.links.remove(&(sw, port));
    }

    /// Record one directed link; discovery reports each direction it sees.
    pub fn add_link(&mut self, sw: SwitchId, port: PortId, peer: PortPeer) {
        self.links.insert((sw, port), peer);
    }

    pub fn remove_link(&mut self, sw: SwitchId, port: PortId) {
        self.links.remove(&(sw, port));
    }

    pub fn switches(&self) -> Vec<SwitchId> {
        self.ports.keys().copied().collect()
    }

    pub fn ports(&self, sw: SwitchId) -> Vec<PortId> {
        self.ports
            .get(&sw)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn peer(&self, sw: SwitchId, port: PortId) -> PortPeer {
        self.links
            .get(&(sw, port))
            .copied()
            .unwrap_or(PortPeer::Unknown)
    }

    /// A port is internal when its peer is a known switch; every other port
    /// is an edge port.
    pub fn is_internal(&self, sw: SwitchId, port: PortId) -> bool {
        matches!(self.peer(sw, port), PortPeer::Switch(_, _))
    }

    pub fn internal_ports(&self, sw: SwitchId) -> BTreeSet<PortId> {
        self.ports(sw)
            .into_iter()
            .filter(|p| self.is_internal(sw, *p))
            .collect()
    }
}

/// Cloneable, lock-guarded handle to the topology view, shared between the
/// translator, the driver, the app, and discovery.
#[derive(Clone, Default)]
pub struct TopoHandle(Arc<Mutex<Topology>>);

impl TopoHandle {
    pub fn new() -> TopoHandle {
        TopoHandle::default()
    }

    pub fn switch_up(&self, sw: SwitchId) {
        self.0.lock().unwrap().switch_up(sw);
    }

    pub fn switch_down(&self, sw: SwitchId) {
        self.0.lock().unwrap().switch_down(sw);
    }

    pub fn port_up(&self, sw: SwitchId, port: PortId) {
        self.0.lock().unwrap().port_up(sw, port);
    }

    pub fn port_down(&self, sw: SwitchId, port: PortId) {
        self.0.lock().unwrap().port_down(sw, port);
    }

    pub fn add_link(&self, sw: SwitchId, port: PortId, peer: PortPeer) {
        self.0.lock().unwrap().add_link(sw, port, peer);
    }

    pub fn remove_link(&self, sw: SwitchId, port: PortId) {
        self.0.lock().unwrap().remove_link(sw, port);
    }

    pub fn switches(&self) -> Vec<SwitchId> {
        self.0.lock().unwrap().switches()
    }

    pub fn ports(&self, sw: SwitchId) -> Vec<PortId> {
        self.0.lock().unwrap().ports(sw)
    }

    pub fn peer(&self, sw: SwitchId, port: PortId) -> PortPeer {
        self.0.lock().unwrap().peer(sw, port)
    }

    pub fn is_internal(&self, sw: SwitchId, port: PortId) -> bool {
        self.0.lock().unwrap().is_internal(sw, port)
    }

    pub fn internal_ports(&self, sw: SwitchId) -> BTreeSet<PortId> {
        self.0.lock().unwrap().internal_ports(sw)
    }
}
