//! Per-switch connection driver.
//!
//! Each accepted TCP stream gets a reader loop and a writer task. The reader
//! frames messages on the 8-byte OpenFlow header, runs the session handshake
//! (Hello, FeaturesRequest, Echo keep-alives), and forwards everything after
//! the features reply to the event translator. The writer task drains a
//! channel so a slow switch never blocks the reader or the driver; the
//! channel's sender is the [`ConnHandle`] stored in the switch session.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::message::{Message, SwitchFeatures, SwitchId};
use crate::ofp_codec::MessageCodec;
use crate::ofp_header::{OfpHeader, Xid};

/// Write handle for one switch connection.
#[derive(Clone)]
pub struct ConnHandle {
    tx: mpsc::UnboundedSender<(Xid, Message)>,
}

impl ConnHandle {
    /// Create a handle together with the receiving end its writer drains.
    pub fn pair() -> (ConnHandle, mpsc::UnboundedReceiver<(Xid, Message)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnHandle { tx }, rx)
    }

    /// Queue a message for the switch.
    pub fn send(&self, xid: Xid, msg: Message) -> Result<(), Error> {
        self.tx.send((xid, msg)).map_err(|_| Error::SendDropped)
    }
}

/// What a connection reports to the event translator.
#[derive(Clone)]
pub enum ConnEvent {
    /// Handshake completed; the switch is identified and writable.
    Connected(SwitchId, SwitchFeatures, ConnHandle),
    /// A post-handshake message from the switch.
    Message(SwitchId, Xid, Message),
    /// The connection closed or failed.
    Disconnected(SwitchId),
}

/// Framing reader: buffers stream bytes and yields one message's header and
/// body at a time.
pub struct MessageReader<R> {
    sock: R,
    rd: BytesMut,
}

const READ_CHUNK: usize = 4096;

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(sock: R) -> MessageReader<R> {
        MessageReader {
            sock,
            rd: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    fn have_header(&self) -> bool {
        self.rd.len() >= OfpHeader::size()
    }

    fn message_length(&self) -> usize {
        let len_1 = usize::from(self.rd[2]);
        let len_2 = usize::from(self.rd[3]);
        (len_1 << 8) + len_2
    }

    fn have_full_message(&self) -> bool {
        self.have_header() && self.rd.len() >= self.message_length()
    }

    /// Next framed message, or `None` on a clean end of stream.
    pub async fn next_message(&mut self) -> io::Result<Option<(OfpHeader, BytesMut)>> {
        loop {
            if self.have_header() && self.message_length() < OfpHeader::size() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "message length below header size",
                ));
            }
            if self.have_full_message() {
                let header_data = self.rd.split_to(OfpHeader::size());
                let header = OfpHeader::parse(&header_data);
                let body = self.rd.split_to(header.length() - OfpHeader::size());
                return Ok(Some((header, body)));
            }
            self.rd.reserve(READ_CHUNK);
            let n = self.sock.read_buf(&mut self.rd).await?;
            if n == 0 {
                if !self.rd.is_empty() {
                    warn!("connection closed mid-message ({} bytes pending)", self.rd.len());
                }
                return Ok(None);
            }
        }
    }
}

async fn write_loop<C: MessageCodec>(
    mut sock: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<(Xid, Message)>,
    codec: Arc<C>,
) {
    while let Some((xid, msg)) = rx.recv().await {
        let buf = match codec.marshal(xid, msg) {
            Ok(buf) => buf,
            Err(e) => {
                error!("failed to marshal outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = sock.write_all(&buf).await {
            warn!("write to switch failed: {}", e);
            break;
        }
    }
}

/// Drive one switch connection until it closes.
///
/// Emits `Connected` once the features reply identifies the datapath,
/// `Message` for everything after it, and a final `Disconnected` if the
/// handshake had completed.
pub async fn run_connection<C: MessageCodec>(
    stream: TcpStream,
    codec: Arc<C>,
    events: mpsc::UnboundedSender<ConnEvent>,
) {
    let peer = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let (handle, rx) = ConnHandle::pair();
    let writer = tokio::spawn(write_loop(write_half, rx, codec.clone()));

    let mut reader = MessageReader::new(read_half);
    let mut switch: Option<SwitchId> = None;

    if handle.send(0, Message::Hello).is_err() {
        return;
    }

    loop {
        let (header, body) = match reader.next_message().await {
            Ok(Some(framed)) => framed,
            Ok(None) => break,
            Err(e) => {
                warn!("read error on connection from {:?}: {}", peer, e);
                break;
            }
        };
        let (xid, msg) = match codec.parse(&header, &body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("unparseable message from {:?}: {}", peer, e);
                break;
            }
        };
        match msg {
            Message::Hello => {
                let _ = handle.send(xid, Message::FeaturesReq);
            }
            Message::EchoRequest(bytes) => {
                let _ = handle.send(xid, Message::EchoReply(bytes));
            }
            Message::EchoReply(_) => {}
            Message::FeaturesReply(feats) => match switch {
                Some(sw) => warn!("duplicate features reply from switch {:#018x}", sw),
                None => {
                    let sw = feats.datapath_id;
                    switch = Some(sw);
                    if events
                        .send(ConnEvent::Connected(sw, feats, handle.clone()))
                        .is_err()
                    {
                        break;
                    }
                }
            },
            other => match switch {
                Some(sw) => {
                    if events.send(ConnEvent::Message(sw, xid, other)).is_err() {
                        break;
                    }
                }
                None => debug!("dropping message received before features reply"),
            },
        }
    }

    if let Some(sw) = switch {
        let _ = events.send(ConnEvent::Disconnected(sw));
    }
    writer.abort();
}
