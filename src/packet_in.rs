//! Packet-in evaluation.
//!
//! A packet sent to the controller is parsed, run through the switch's
//! compiled local policy, and the results are split two ways: packets whose
//! final location is a physical port are forwarded right back out as
//! packet-outs, packets landing in a named pipe become events for the
//! application. Per-packet failures drop that packet only.

use log::error;

use crate::error::Error;
use crate::event::NetworkEvent;
use crate::message::{Action, PacketIn, PacketOut, Payload, PseudoPort, SwitchId};
use crate::packet::{self, HeadersValues, Location};
use crate::policy::Policy;

/// Everything a packet-in produced: events for the app and packet-outs for
/// the switch.
#[derive(Default)]
pub struct Evaluation {
    pub events: Vec<NetworkEvent>,
    pub packet_outs: Vec<PacketOut>,
}

/// Evaluate one packet-in against the switch's compiled local policy.
pub fn evaluate(sw: SwitchId, pkt: &PacketIn, policy: &dyn Policy) -> Evaluation {
    let bytes = pkt.input_payload.bytes();
    let input = packet::parse(bytes, pkt.port);
    let mut result = Evaluation::default();

    for out in policy.eval(sw, &input) {
        match &out.location {
            Location::Physical(_) => match forward_actions(&input, &out) {
                Ok(actions) => result.packet_outs.push(PacketOut {
                    // keep the switch-side buffer when there is one
                    output_payload: pkt.input_payload.clone(),
                    port_id: Some(pkt.port),
                    apply_actions: actions,
                }),
                Err(e) => error!("dropping packet-in forward on switch {:#018x}: {}", sw, e),
            },
            Location::Pipe(pipe) => {
                let payload = if out.differs_from(&input) {
                    // a modified packet invalidates the switch-side buffer
                    match packet::sync_headers(bytes, &input, &out) {
                        Ok(fresh) => Payload::NotBuffered(fresh),
                        Err(e) => {
                            error!(
                                "dropping packet-in to pipe {} on switch {:#018x}: {}",
                                pipe, sw, e
                            );
                            continue;
                        }
                    }
                } else {
                    pkt.input_payload.clone()
                };
                result.events.push(NetworkEvent::PacketIn {
                    pipe: pipe.clone(),
                    switch: sw,
                    port: pkt.port,
                    payload,
                    total_len: pkt.total_len,
                });
            }
        }
    }
    result
}

/// Action list realizing the difference between the input packet and one
/// policy result, ending with the physical output.
pub fn forward_actions(
    input: &HeadersValues,
    output: &HeadersValues,
) -> Result<Vec<Action>, Error> {
    let port = match output.location {
        Location::Physical(p) => p,
        Location::Pipe(_) => {
            return Err(Error::AssertionFailed(
                "pipe location on the forwarding path".to_string(),
            ))
        }
    };
    // no OpenFlow 1.0 action can rewrite these
    if output.dl_typ != input.dl_typ {
        return Err(Error::UnsupportedMod { field: "ethType" });
    }
    if output.nw_proto != input.nw_proto {
        return Err(Error::UnsupportedMod { field: "ipProto" });
    }

    let mut actions = Vec::new();
    if output.dl_src != input.dl_src {
        actions.push(Action::SetDlSrc(output.dl_src));
    }
    if output.dl_dst != input.dl_dst {
        actions.push(Action::SetDlDst(output.dl_dst));
    }
    if output.dl_vlan != input.dl_vlan {
        actions.push(Action::SetDlVlan(output.dl_vlan));
    }
    if output.dl_vlan_pcp != input.dl_vlan_pcp {
        actions.push(Action::SetDlVlanPcp(output.dl_vlan_pcp));
    }
    if output.nw_src != input.nw_src {
        actions.push(Action::SetNwSrc(output.nw_src));
    }
    if output.nw_dst != input.nw_dst {
        actions.push(Action::SetNwDst(output.nw_dst));
    }
    if output.nw_tos != input.nw_tos {
        actions.push(Action::SetNwTos(output.nw_tos));
    }
    if output.tp_src != input.tp_src {
        actions.push(Action::SetTpSrc(output.tp_src));
    }
    if output.tp_dst != input.tp_dst {
        actions.push(Action::SetTpDst(output.tp_dst));
    }
    actions.push(Action::Output(PseudoPort::PhysicalPort(port)));
    Ok(actions)
}
