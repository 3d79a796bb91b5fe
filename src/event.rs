//! Network events and the raw-message translator.
//!
//! The translator turns connection-level traffic into the high-level events
//! the application sees, maintaining the session map and topology records on
//! the way. It runs as its own task: barrier replies must resolve their
//! waiters even while the driver is blocked inside an update.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::barrier::BarrierRegistry;
use crate::controller::PacketOutHandle;
use crate::message::{Message, Payload, PortId, PortReason, PortStatus, SwitchFeatures, SwitchId};
use crate::ofp_conn::{ConnEvent, ConnHandle};
use crate::ofp_header::Xid;
use crate::packet_in;
use crate::session::{SessionMap, SwitchSession};
use crate::topology::TopoHandle;

/// High-level view of what happened in the network.
#[derive(Clone, Debug, PartialEq)]
pub enum NetworkEvent {
    SwitchUp(SwitchId),
    SwitchDown(SwitchId),
    PortUp(SwitchId, PortId),
    PortDown(SwitchId, PortId),
    /// A packet delivered to a named application pipe.
    PacketIn {
        pipe: String,
        switch: SwitchId,
        port: PortId,
        payload: Payload,
        total_len: u16,
    },
}

/// Converts raw switch traffic into [`NetworkEvent`]s.
pub struct EventTranslator {
    sessions: SessionMap,
    topo: TopoHandle,
    barriers: Arc<BarrierRegistry>,
    packet_out: PacketOutHandle,
}

impl EventTranslator {
    pub fn new(
        sessions: SessionMap,
        topo: TopoHandle,
        barriers: Arc<BarrierRegistry>,
        packet_out: PacketOutHandle,
    ) -> EventTranslator {
        EventTranslator {
            sessions,
            topo,
            barriers,
            packet_out,
        }
    }

    /// Translate one connection event; events come out in delivery order.
    pub fn translate(&self, ev: ConnEvent) -> Vec<NetworkEvent> {
        match ev {
            ConnEvent::Connected(sw, feats, conn) => self.switch_connected(sw, feats, conn),
            ConnEvent::Disconnected(sw) => self.switch_disconnected(sw),
            ConnEvent::Message(sw, xid, msg) => self.switch_message(sw, xid, msg),
        }
    }

    fn switch_connected(
        &self,
        sw: SwitchId,
        feats: SwitchFeatures,
        conn: ConnHandle,
    ) -> Vec<NetworkEvent> {
        if self.sessions.insert(SwitchSession::new(sw, conn)) {
            warn!("switch {:#018x} reconnected over a live session", sw);
            self.barriers.abandon_switch(sw);
        }
        self.topo.switch_up(sw);
        let mut events = vec![NetworkEvent::SwitchUp(sw)];
        for port in feats.ports.iter().filter(|p| p.usable()) {
            self.topo.port_up(sw, port.port_no);
            events.push(NetworkEvent::PortUp(sw, port.port_no));
        }
        events
    }

    fn switch_disconnected(&self, sw: SwitchId) -> Vec<NetworkEvent> {
        let mut events: Vec<_> = self
            .topo
            .ports(sw)
            .into_iter()
            .map(|p| NetworkEvent::PortDown(sw, p))
            .collect();
        events.push(NetworkEvent::SwitchDown(sw));
        self.sessions.remove(sw);
        self.barriers.abandon_switch(sw);
        self.topo.switch_down(sw);
        events
    }

    fn switch_message(&self, sw: SwitchId, xid: Xid, msg: Message) -> Vec<NetworkEvent> {
        match msg {
            Message::PacketIn(pkt) => {
                let policy = match self.sessions.policy(sw) {
                    Some(policy) => policy,
                    None => {
                        debug!("packet-in from {:#018x} before any policy is installed", sw);
                        return Vec::new();
                    }
                };
                let eval = packet_in::evaluate(sw, &pkt, policy.as_ref());
                for po in eval.packet_outs {
                    if let Err(e) = self.packet_out.send_packet_out(sw, po) {
                        warn!("packet-out for switch {:#018x} dropped: {}", sw, e);
                    }
                }
                eval.events
            }
            Message::PortStatus(status) => self.port_status(sw, status),
            Message::BarrierReply => {
                self.barriers.resolve(xid);
                Vec::new()
            }
            Message::Error(err) => {
                warn!(
                    "switch {:#018x} reported {:?} code {} ({} bytes of request)",
                    sw,
                    err.typ,
                    err.code,
                    err.data.len()
                );
                Vec::new()
            }
            other => {
                debug!("ignoring message from switch {:#018x}: {:?}", sw, other);
                Vec::new()
            }
        }
    }

    fn port_status(&self, sw: SwitchId, status: PortStatus) -> Vec<NetworkEvent> {
        let port = status.desc.port_no;
        match (status.reason, status.desc.usable()) {
            (PortReason::PortAdd, true) | (PortReason::PortModify, true) => {
                self.topo.port_up(sw, port);
                vec![NetworkEvent::PortUp(sw, port)]
            }
            (PortReason::PortDelete, _) | (PortReason::PortModify, false) => {
                self.topo.port_down(sw, port);
                vec![NetworkEvent::PortDown(sw, port)]
            }
            (PortReason::PortAdd, false) => Vec::new(),
        }
    }
}

/// Pump connection events through the translator until every connection
/// (and the listener holding the sender) has gone away.
pub async fn run_translator(
    translator: EventTranslator,
    mut rx: mpsc::UnboundedReceiver<ConnEvent>,
    events: mpsc::UnboundedSender<NetworkEvent>,
) {
    while let Some(ev) = rx.recv().await {
        for out in translator.translate(ev) {
            if events.send(out).is_err() {
                return;
            }
        }
    }
}
