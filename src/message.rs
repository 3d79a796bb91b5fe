//! Version-agnostic OpenFlow 1.0 data model.
//!
//! These are the controller-side shapes of the messages exchanged with a
//! switch. Translating them to and from wire bytes is the job of a
//! [`MessageCodec`](crate::ofp_codec::MessageCodec) implementation.

/// 64-bit datapath identifier of a switch.
pub type SwitchId = u64;

/// Switch port number. Values at or above [`PORT_MAX`] are reserved by the
/// protocol and excluded from usable-port enumeration.
pub type PortId = u32;

/// Flow entry priority, `[0, 65535]`.
pub type Priority = u16;

/// Policy generation tag carried in the VLAN field during consistent
/// updates. Version 0 means "no tag".
pub type VlanVersion = u16;

/// First reserved port number; real ports are strictly below this.
pub const PORT_MAX: PortId = 0xFF00;

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

/// A value matched either exactly or under a mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mask<T> {
    pub value: T,
    pub mask: Option<T>,
}

/// Fields to match against packets.
///
/// `None` wildcards a field. `dl_vlan` is doubly optional: `Some(None)`
/// matches packets carrying no VLAN tag (the wire sentinel 65535), while
/// `Some(Some(v))` matches tag `v`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    pub dl_src: Option<u64>,
    pub dl_dst: Option<u64>,
    pub dl_typ: Option<u16>,
    pub dl_vlan: Option<Option<u16>>,
    pub dl_vlan_pcp: Option<u8>,
    pub nw_src: Option<Mask<u32>>,
    pub nw_dst: Option<Mask<u32>>,
    pub nw_proto: Option<u8>,
    pub nw_tos: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
    pub in_port: Option<PortId>,
}

impl Pattern {
    pub fn match_all() -> Pattern {
        Pattern {
            dl_src: None,
            dl_dst: None,
            dl_typ: None,
            dl_vlan: None,
            dl_vlan_pcp: None,
            nw_src: None,
            nw_dst: None,
            nw_proto: None,
            nw_tos: None,
            tp_src: None,
            tp_dst: None,
            in_port: None,
        }
    }
}

/// Port behavior for outputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PseudoPort {
    PhysicalPort(PortId),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    /// Send to the controller, truncated to the given number of bytes.
    Controller(u64),
    Local,
}

/// Actions associated with flows and packets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Output(PseudoPort),
    /// `None` strips the VLAN tag.
    SetDlVlan(Option<u16>),
    SetDlVlanPcp(u8),
    SetDlSrc(u64),
    SetDlDst(u64),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
}

/// Type of modification to perform on a flow table.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlowModCmd {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

/// A modification to a switch flow table from the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub pattern: Pattern,
    pub priority: Priority,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub notify_when_removed: bool,
    /// Buffer id of a packet to apply the new flow to, if any.
    pub apply_to_packet: Option<u32>,
    /// For delete commands, restrict matching to entries with this out port.
    pub out_port: Option<PseudoPort>,
    pub check_overlap: bool,
}

/// The data associated with a packet handled by the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// The switch holds the full packet under the buffer id; only the
    /// leading header bytes travelled to the controller.
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    /// The raw bytes the controller has for this packet.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Buffered(_, b) | Payload::NotBuffered(b) => b,
        }
    }
}

/// The reason a packet arrived at the controller.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PacketInReason {
    NoMatch,
    ExplicitSend,
}

/// A packet received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub port: PortId,
    pub reason: PacketInReason,
}

/// A packet sent from the controller out a datapath.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketOut {
    pub output_payload: Payload,
    /// The packet's ingress port, when relevant to the applied actions.
    pub port_id: Option<PortId>,
    pub apply_actions: Vec<Action>,
}

/// Current state of a physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PortState {
    pub down: bool,
}

/// Configured behavior of a physical port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PortConfig {
    pub down: bool,
    pub no_stp: bool,
    pub no_recv: bool,
    pub no_recv_stp: bool,
    pub no_flood: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

/// Description of a physical port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortDesc {
    pub port_no: PortId,
    pub hw_addr: u64,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
}

impl PortDesc {
    /// Whether the port can carry traffic: administratively enabled, link
    /// up, and a real (non-reserved) port number.
    pub fn usable(&self) -> bool {
        !self.config.down && !self.state.down && self.port_no < PORT_MAX
    }
}

/// What changed about a physical port.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PortReason {
    PortAdd,
    PortDelete,
    PortModify,
}

/// A physical port has changed in the datapath.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

/// Capabilities supported by the datapath.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub stp: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub arp_match_ip: bool,
}

/// Switch features, from the handshake's features reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwitchFeatures {
    pub datapath_id: SwitchId,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub supported_capabilities: Capabilities,
    pub ports: Vec<PortDesc>,
}

/// High-level type of an OpenFlow error reported by a switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorType {
    HelloFailed,
    BadRequest,
    BadAction,
    FlowModFailed,
    PortModFailed,
    QueueOpFailed,
}

/// Error message (datapath -> controller). Carries the leading bytes of the
/// offending request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorMsg {
    pub typ: ErrorType,
    pub code: u16,
    pub data: Vec<u8>,
}

/// Abstractions of the OpenFlow 1.0 messages the core exchanges.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Hello,
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesReq,
    FeaturesReply(SwitchFeatures),
    FlowMod(FlowMod),
    PacketIn(PacketIn),
    PortStatus(PortStatus),
    PacketOut(PacketOut),
    BarrierRequest,
    BarrierReply,
}
