//! The controller driver.
//!
//! Owns the event pipe and the global update state, accepts switch
//! connections, and dispatches events to the user-supplied app strictly
//! sequentially: a new event is dequeued only once the previous handler and
//! any update it triggered have resolved. Translated switch events and
//! injected discovery events are merged fairly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::mpsc;

use crate::barrier::{BarrierRegistry, BARRIER_TIMEOUT};
use crate::error::Error;
use crate::event::{run_translator, EventTranslator, NetworkEvent};
use crate::message::{Action, Message, PacketOut, Payload, PortId, SwitchId, VlanVersion};
use crate::ofp_codec::MessageCodec;
use crate::ofp_conn::run_connection;
use crate::policy::Policy;
use crate::session::SessionMap;
use crate::topology::TopoHandle;
use crate::update::{self, ConsistentUpdate};

/// Default OpenFlow listen port.
pub const DEFAULT_PORT: u16 = 6633;

/// Accept queue depth for the switch listener.
pub const ACCEPT_BACKLOG: u32 = 64;

/// How a new policy is installed across the fleet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateMode {
    /// Wipe and reinstall per switch; packets in flight may briefly see a
    /// mixture of generations or an empty table.
    BestEffort,
    /// Two-phase versioned update; every packet is handled entirely by one
    /// policy generation.
    PerPacketConsistent,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub listen: SocketAddr,
    pub update_mode: UpdateMode,
    pub barrier_timeout: Duration,
    pub accept_backlog: u32,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            update_mode: UpdateMode::BestEffort,
            barrier_timeout: BARRIER_TIMEOUT,
            accept_backlog: ACCEPT_BACKLOG,
        }
    }
}

/// Write handle for packet-outs. All application and evaluator traffic to
/// switches funnels through the one channel behind this handle; the driver's
/// drain loop routes each packet-out to its switch connection.
#[derive(Clone)]
pub struct PacketOutHandle {
    tx: mpsc::UnboundedSender<(SwitchId, PacketOut)>,
}

impl PacketOutHandle {
    pub fn pair() -> (PacketOutHandle, mpsc::UnboundedReceiver<(SwitchId, PacketOut)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PacketOutHandle { tx }, rx)
    }

    pub fn send(
        &self,
        sw: SwitchId,
        payload: Payload,
        port_id: Option<PortId>,
        actions: Vec<Action>,
    ) -> Result<(), Error> {
        self.send_packet_out(
            sw,
            PacketOut {
                output_payload: payload,
                port_id,
                apply_actions: actions,
            },
        )
    }

    pub fn send_packet_out(&self, sw: SwitchId, po: PacketOut) -> Result<(), Error> {
        self.tx.send((sw, po)).map_err(|_| Error::SendDropped)
    }
}

/// Handle for pushing events into the driver's queue from outside the
/// switch pipeline (topology discovery, tests).
#[derive(Clone)]
pub struct EventInjector {
    tx: mpsc::UnboundedSender<NetworkEvent>,
}

impl EventInjector {
    pub fn inject(&self, event: NetworkEvent) -> Result<(), Error> {
        self.tx.send(event).map_err(|_| Error::SendDropped)
    }
}

/// A controller application: maps each network event to an optional new
/// policy for the whole fleet.
pub trait App: Send + 'static {
    /// Policy installed best-effort on a newly connected switch when the
    /// handler returns no fleet-wide replacement.
    fn default_policy(&self) -> Arc<dyn Policy>;

    fn handle_event(&mut self, event: &NetworkEvent) -> Option<Arc<dyn Policy>>;
}

/// The next version tag: monotonically increasing, skipping 0 ("no tag")
/// and the no-VLAN wire sentinel.
fn next_version(ver: VlanVersion) -> VlanVersion {
    match ver.wrapping_add(1) {
        0 | 0xFFFF => 1,
        v => v,
    }
}

async fn dispatch_event<A: App>(
    app: &mut A,
    event: &NetworkEvent,
    sessions: &SessionMap,
    topo: &TopoHandle,
    barriers: &BarrierRegistry,
    config: &ControllerConfig,
    ver: &mut VlanVersion,
) {
    match app.handle_event(event) {
        Some(policy) => match config.update_mode {
            UpdateMode::BestEffort => update::best_effort_all(sessions, &policy),
            UpdateMode::PerPacketConsistent => {
                let next = next_version(*ver);
                ConsistentUpdate::new(sessions, topo, barriers)
                    .with_barrier_timeout(config.barrier_timeout)
                    .apply(&policy, next)
                    .await;
                *ver = next;
            }
        },
        None => {
            if let NetworkEvent::SwitchUp(sw) = *event {
                if let Err(e) = update::best_effort(sessions, sw, &app.default_policy()) {
                    error!(
                        "default policy install on switch {:#018x} failed: {}",
                        sw, e
                    );
                }
            }
        }
    }
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, Error> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(backlog)?)
}

/// The controller: shared state plus the channels tying the pipeline
/// together.
pub struct Controller {
    config: ControllerConfig,
    sessions: SessionMap,
    topo: TopoHandle,
    barriers: Arc<BarrierRegistry>,
    packet_out: PacketOutHandle,
    packet_out_rx: mpsc::UnboundedReceiver<(SwitchId, PacketOut)>,
    inject_tx: mpsc::UnboundedSender<NetworkEvent>,
    inject_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    ver: VlanVersion,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Controller {
        let (packet_out, packet_out_rx) = PacketOutHandle::pair();
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        Controller {
            config,
            sessions: SessionMap::new(),
            topo: TopoHandle::new(),
            barriers: Arc::new(BarrierRegistry::new()),
            packet_out,
            packet_out_rx,
            inject_tx,
            inject_rx,
            ver: 1,
        }
    }

    pub fn topology(&self) -> TopoHandle {
        self.topo.clone()
    }

    pub fn packet_out_handle(&self) -> PacketOutHandle {
        self.packet_out.clone()
    }

    pub fn injector(&self) -> EventInjector {
        EventInjector {
            tx: self.inject_tx.clone(),
        }
    }

    /// Accept switches and pump events until the pipeline shuts down.
    pub async fn run<A, C>(self, app: A, codec: C) -> Result<(), Error>
    where
        A: App,
        C: MessageCodec,
    {
        let listener = bind_listener(self.config.listen, self.config.accept_backlog)?;
        info!("controller listening on {}", self.config.listen);
        self.run_on_listener(listener, app, codec).await
    }

    /// [`run`](Self::run) on a listener the embedder bound itself.
    pub async fn run_on_listener<A, C>(
        self,
        listener: TcpListener,
        mut app: A,
        codec: C,
    ) -> Result<(), Error>
    where
        A: App,
        C: MessageCodec,
    {
        let Controller {
            config,
            sessions,
            topo,
            barriers,
            packet_out,
            packet_out_rx,
            inject_tx,
            mut inject_rx,
            mut ver,
        } = self;
        // without an injector clone this would keep the inject branch open
        // forever
        drop(inject_tx);

        let codec = Arc::new(codec);

        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (net_tx, mut net_rx) = mpsc::unbounded_channel();
        let translator = EventTranslator::new(
            sessions.clone(),
            topo.clone(),
            barriers.clone(),
            packet_out.clone(),
        );
        tokio::spawn(run_translator(translator, conn_rx, net_tx));

        {
            let codec = codec.clone();
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, peer)) => {
                            debug!("switch connection from {}", peer);
                            tokio::spawn(run_connection(stream, codec.clone(), conn_tx.clone()));
                        }
                        Err(e) => warn!("accept failed: {}", e),
                    }
                }
            });
        }

        {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let mut rx = packet_out_rx;
                while let Some((sw, po)) = rx.recv().await {
                    match sessions.conn(sw) {
                        Some(conn) => {
                            if let Err(e) = conn.send(0, Message::PacketOut(po)) {
                                warn!("packet-out to switch {:#018x} failed: {}", sw, e);
                            }
                        }
                        None => warn!("packet-out for unknown switch {:#018x}", sw),
                    }
                }
            });
        }

        loop {
            let event = tokio::select! {
                ev = net_rx.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
                Some(ev) = inject_rx.recv() => ev,
            };
            dispatch_event(&mut app, &event, &sessions, &topo, &barriers, &config, &mut ver)
                .await;
        }
        Ok(())
    }
}

/// Run a controller whose app is built from the shared topology and
/// packet-out handles.
pub async fn start<F, A, C>(make_app: F, codec: C, config: ControllerConfig) -> Result<(), Error>
where
    F: FnOnce(TopoHandle, PacketOutHandle) -> A,
    A: App,
    C: MessageCodec,
{
    let controller = Controller::new(config);
    let app = make_app(controller.topology(), controller.packet_out_handle());
    controller.run(app, codec).await
}

/// Run a controller with an app that needs no handles.
pub async fn start_independent<A, C>(
    app: A,
    codec: C,
    config: ControllerConfig,
) -> Result<(), Error>
where
    A: App,
    C: MessageCodec,
{
    Controller::new(config).run(app, codec).await
}
