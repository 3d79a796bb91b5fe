//! `flowctl`: the core of an OpenFlow 1.0 SDN controller.
//!
//! The crate compiles high-level policies (through the external
//! [`Policy`](policy::Policy) interface) into switch flow tables and keeps a
//! running fleet in sync with them. Its centerpiece is the update engine:
//! alongside a plain best-effort installer it implements two-phase
//! per-packet-consistent updates, where every packet is processed entirely
//! by one policy generation, marked by a version tag the rules carry in the
//! VLAN field while the packet transits the network.
//!
//! The OpenFlow wire codec, the policy compiler, and topology discovery are
//! external collaborators behind narrow interfaces
//! ([`ofp_codec::MessageCodec`], [`policy::Policy`], and the
//! [`topology::TopoHandle`] mutators plus the driver's event injector).
//!
//! A controller is assembled from an [`controller::App`] and a codec:
//!
//! ```ignore
//! let config = ControllerConfig {
//!     update_mode: UpdateMode::PerPacketConsistent,
//!     ..ControllerConfig::default()
//! };
//! flowctl::start_independent(my_app, my_codec, config).await?;
//! ```

pub mod barrier;
pub mod controller;
pub mod error;
pub mod event;
pub mod message;
pub mod ofp_codec;
pub mod ofp_conn;
pub mod ofp_header;
pub mod packet;
pub mod packet_in;
pub mod policy;
pub mod session;
pub mod table;
pub mod topology;
pub mod update;

pub use controller::{
    start, start_independent, App, Controller, ControllerConfig, EventInjector, PacketOutHandle,
    UpdateMode,
};
pub use error::Error;
pub use event::NetworkEvent;
pub use message::{PortId, Priority, SwitchId, VlanVersion};
pub use ofp_header::Xid;
