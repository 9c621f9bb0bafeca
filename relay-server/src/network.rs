//! The transport layer (§4.1, §5): one TCP connection per peer carries the
//! reliable channel (control packets plus "is_tcp" raw payloads); a single
//! shared UDP socket carries the unreliable channel for every peer at once,
//! plus discovery probes.
//!
//! Mirrors the paired send/receive task shape of the connection handling
//! this server used to do over WebSockets: one task drains the outbound
//! queue onto the socket, one task decodes inbound frames off it, and
//! whichever finishes first tears the other down.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use protocol::constants::{discovery_reply, DISCOVERY_MAGIC};
use protocol::{ConnectionId, Frame};
use relay_core::assembler::StreamAssembler;
use relay_core::{OutboundFrame, RelayEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

static NEXT_CONNECTION_ID: AtomicU32 = AtomicU32::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Learned UDP peer addresses, shared between the accept loop (which spawns
/// a TCP connection's tasks) and the one datagram-reading task serving every
/// peer's unreliable channel.
pub type UdpPeerTable = Arc<Mutex<HashMap<ConnectionId, SocketAddr>>>;

/// Runs the TCP accept loop: one `Framed<TcpStream, LengthDelimitedCodec>`
/// per peer, each driven by its own reader/writer task pair.
pub async fn run_tcp_listener(
    listener: TcpListener,
    event_tx: mpsc::Sender<RelayEvent>,
    udp_socket: Arc<UdpSocket>,
    udp_peers: UdpPeerTable,
    idle_timeout: Duration,
) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(?err, "tcp accept failed");
                continue;
            }
        };
        let id = next_connection_id();
        let event_tx = event_tx.clone();
        let udp_socket = udp_socket.clone();
        let udp_peers = udp_peers.clone();
        tokio::spawn(async move {
            handle_connection(id, stream, peer_addr, event_tx, udp_socket, udp_peers, idle_timeout).await;
        });
    }
}

async fn handle_connection(
    id: ConnectionId,
    stream: TcpStream,
    peer_addr: SocketAddr,
    event_tx: mpsc::Sender<RelayEvent>,
    udp_socket: Arc<UdpSocket>,
    udp_peers: UdpPeerTable,
    idle_timeout: Duration,
) {
    let _ = stream.set_nodelay(true);
    let framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (mut sink, mut stream) = framed.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(256);
    if event_tx
        .send(RelayEvent::Connected { id, addr: peer_addr.ip(), outbound: outbound_tx })
        .await
        .is_err()
    {
        return;
    }

    let writer_udp = udp_socket.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if frame.reliable {
                let Ok(encoded) = frame.frame.encode() else { continue };
                if sink.send(encoded).await.is_err() {
                    break;
                }
            } else {
                let peer = udp_peers.lock().await.get(&id).copied();
                if let (Some(peer), Ok(encoded)) = (peer, frame.frame.encode()) {
                    let _ = writer_udp.send_to(&encoded, peer).await;
                }
            }
        }
    });

    let mut assembler = StreamAssembler::new();
    let reader_event_tx = event_tx.clone();
    let mut reader = tokio::spawn(async move {
        loop {
            match timeout(idle_timeout, stream.next()).await {
                Ok(Some(Ok(bytes))) => {
                    let frame = match Frame::decode(bytes.freeze()) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::debug!(con_id = %id, ?err, "malformed tcp frame");
                            let _ = reader_event_tx.send(RelayEvent::Malformed { id }).await;
                            continue;
                        }
                    };
                    if !dispatch_frame(id, frame, true, &mut assembler, &reader_event_tx).await {
                        break;
                    }
                }
                Ok(Some(Err(err))) => {
                    tracing::debug!(con_id = %id, ?err, "tcp read error");
                    break;
                }
                Ok(None) => break,
                Err(_elapsed) => {
                    let _ = reader_event_tx.send(RelayEvent::Idle { id }).await;
                }
            }
        }
    });

    // Whichever task finishes first (peer gone, protocol error, or the
    // relay dropping our outbound sender to kick us) aborts the other so the
    // socket's other half isn't left parked forever.
    tokio::select! {
        res = &mut writer => { reader.abort(); res }
        res = &mut reader => { writer.abort(); res }
    }
    .unwrap_or_else(|err| tracing::debug!(con_id = %id, ?err, "connection task panicked"));
    let _ = event_tx.send(RelayEvent::Disconnected { id }).await;
}

/// `true` means keep the reader loop going; `false` means the frame
/// completed a stream reassembly that itself decoded a control packet we
/// already forwarded, or the caller should stop regardless.
async fn dispatch_frame(
    id: ConnectionId,
    frame: Frame,
    reliable: bool,
    assembler: &mut StreamAssembler,
    event_tx: &mpsc::Sender<RelayEvent>,
) -> bool {
    match frame {
        Frame::StreamHead(head) => {
            assembler.on_head(head);
            true
        }
        Frame::StreamChunk(chunk) => match assembler.on_chunk(chunk) {
            Ok(Some(packet)) => event_tx
                .send(RelayEvent::Inbound { id, frame: Frame::Control(packet), reliable })
                .await
                .is_ok(),
            Ok(None) => true,
            Err(err) => {
                tracing::debug!(con_id = %id, ?err, "stream reassembly error");
                event_tx.send(RelayEvent::Malformed { id }).await.is_ok()
            }
        },
        other => event_tx.send(RelayEvent::Inbound { id, frame: other, reliable }).await.is_ok(),
    }
}

/// Reads the shared UDP socket forever. Every datagram is expected to open
/// with a 4-byte big-endian [`ConnectionId`] (learned by the peer from the
/// `RoomLink`/connect handshake over TCP) so an arbitrary-source datagram
/// can be attributed to the connection it belongs to; the remaining bytes
/// are one encoded [`Frame`]. A bare [`DISCOVERY_MAGIC`] byte with no
/// trailing id is answered immediately without touching the relay (§6
/// discovery probe).
pub async fn run_udp_socket(socket: Arc<UdpSocket>, event_tx: mpsc::Sender<RelayEvent>, udp_peers: UdpPeerTable) {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(?err, "udp recv failed");
                continue;
            }
        };
        let datagram = &buf[..len];
        if datagram.len() == 1 && datagram[0] == DISCOVERY_MAGIC {
            let _ = socket.send_to(&discovery_reply(), peer_addr).await;
            continue;
        }
        if datagram.len() < 4 {
            continue;
        }
        let mut body = Bytes::copy_from_slice(datagram);
        let id = ConnectionId::new(body.get_u32());
        udp_peers.lock().await.insert(id, peer_addr);
        match Frame::decode(body) {
            Ok(frame) => {
                let _ = event_tx.send(RelayEvent::Inbound { id, frame, reliable: false }).await;
            }
            Err(err) => {
                tracing::debug!(con_id = %id, ?err, "malformed udp frame");
                let _ = event_tx.send(RelayEvent::Malformed { id }).await;
            }
        }
    }
}

/// Prefixes an encoded frame with `id` for the client side of the UDP
/// framing described above. Exposed for completeness/tests; the relay's own
/// client SDK is out of scope here.
pub fn encode_udp_datagram(id: ConnectionId, frame: &Frame) -> Option<Bytes> {
    let encoded = frame.encode().ok()?;
    let mut buf = BytesMut::with_capacity(4 + encoded.len());
    buf.put_u32(id.get());
    buf.put_slice(&encoded);
    Some(buf.freeze())
}
