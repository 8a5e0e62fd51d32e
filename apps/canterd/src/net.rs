//! The command server: one per tier.
//!
//! Owns the accept loop and, per client, a framed read task and a write
//! task. Decoded commands and lifecycle transitions are delivered to the
//! owning director over an event channel; the director runs them on its
//! own tick loop, so handlers here never touch director state.
//!
//! [`ServerHandle::queue_command`] is thread-safe: the message is
//! serialized on the caller and framed, scrambled, and written on the
//! client's write worker. Queued commands to a client that is gone are
//! dropped silently. Protocol violations, socket errors, and handler
//! failures all end the same way: the client is disconnected.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use canterio::{FrameError, FrameReader, FrameWriter, Scrambler};
use canterproto::wire::Writer;
use canterproto::{Clientbound, CommandId, ProtoError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub type ClientId = u64;

/// Payload decoding for one tier.
pub trait Protocol: Send + Sync + 'static {
    type Incoming: Send + 'static;

    fn decode(command: CommandId, payload: Bytes) -> Result<Self::Incoming, ProtoError>;
}

/// What the command server reports to its director.
#[derive(Debug)]
pub enum ServerEvent<C> {
    Connected(ClientId, SocketAddr),
    Command(ClientId, C),
    Disconnected(ClientId),
}

enum WriterOp {
    Frame(CommandId, Bytes),
    SetCode(u32),
    ResetCode,
    Close,
}

struct ClientEntry {
    addr: SocketAddr,
    writer: mpsc::UnboundedSender<WriterOp>,
    recv_scrambler: Arc<Mutex<Scrambler>>,
    closed: Arc<Notify>,
}

/// Cloneable handle for queueing commands and managing clients from any
/// thread.
pub struct ServerHandle {
    name: &'static str,
    clients: Arc<Mutex<HashMap<ClientId, ClientEntry>>>,
}

impl Clone for ServerHandle {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            clients: Arc::clone(&self.clients),
        }
    }
}

impl ServerHandle {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, ClientEntry>> {
        self.clients.lock().expect("client table lock poisoned")
    }

    /// Serialize and queue a message for the client. A message for a
    /// client that already disconnected is dropped without an error.
    pub fn queue_command<C: Clientbound>(&self, client: ClientId, message: &C) {
        let mut w = Writer::new();
        message.write(&mut w);
        let payload = w.into_bytes();

        let clients = self.lock();
        if let Some(entry) = clients.get(&client) {
            let _ = entry.writer.send(WriterOp::Frame(C::COMMAND, payload));
        } else {
            debug!(server = self.name, client, "dropping command for gone client");
        }
    }

    /// Re-arm the client's scrambling key in both directions.
    pub fn set_code(&self, client: ClientId, code: u32) {
        let clients = self.lock();
        if let Some(entry) = clients.get(&client) {
            entry
                .recv_scrambler
                .lock()
                .expect("scrambler lock poisoned")
                .set_code(code);
            let _ = entry.writer.send(WriterOp::SetCode(code));
        }
    }

    /// Restore the client's scrambling key to the initial value.
    pub fn reset_code(&self, client: ClientId) {
        let clients = self.lock();
        if let Some(entry) = clients.get(&client) {
            entry
                .recv_scrambler
                .lock()
                .expect("scrambler lock poisoned")
                .reset();
            let _ = entry.writer.send(WriterOp::ResetCode);
        }
    }

    /// Force-close a client connection.
    pub fn disconnect(&self, client: ClientId) {
        let clients = self.lock();
        if let Some(entry) = clients.get(&client) {
            // notify_one stores a permit, so a read loop that is between
            // selects still observes the close.
            entry.closed.notify_one();
            let _ = entry.writer.send(WriterOp::Close);
        }
    }

    pub fn client_addr(&self, client: ClientId) -> Option<SocketAddr> {
        self.lock().get(&client).map(|e| e.addr)
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, client: ClientId) -> bool {
        self.lock().remove(&client).is_some()
    }
}

/// Start serving a tier on an already-bound listener. Returns the handle
/// and the event stream for the owning director.
pub fn start<P: Protocol>(
    listener: TcpListener,
    name: &'static str,
) -> (ServerHandle, mpsc::UnboundedReceiver<ServerEvent<P::Incoming>>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let handle = ServerHandle::new(name);

    tokio::spawn(accept_loop::<P>(listener, handle.clone(), event_tx));

    (handle, event_rx)
}

async fn accept_loop<P: Protocol>(
    listener: TcpListener,
    handle: ServerHandle,
    event_tx: mpsc::UnboundedSender<ServerEvent<P::Incoming>>,
) {
    let next_client_id = AtomicU64::new(0);

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(server = handle.name, err = %e, "accept failed");
                continue;
            }
        };
        let client = next_client_id.fetch_add(1, Ordering::Relaxed) + 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(server = handle.name, client, err = %e, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let recv_scrambler = Arc::new(Mutex::new(Scrambler::new()));
        let closed = Arc::new(Notify::new());

        handle.lock().insert(
            client,
            ClientEntry {
                addr,
                writer: writer_tx,
                recv_scrambler: Arc::clone(&recv_scrambler),
                closed: Arc::clone(&closed),
            },
        );

        debug!(server = handle.name, client, peer = %addr, "client connected");
        if event_tx.send(ServerEvent::Connected(client, addr)).is_err() {
            // The director is gone; stop accepting.
            return;
        }

        tokio::spawn(write_loop(handle.name, client, write_half, writer_rx));
        tokio::spawn(read_loop::<P>(
            client,
            read_half,
            recv_scrambler,
            closed,
            handle.clone(),
            event_tx.clone(),
        ));
    }
}

async fn read_loop<P: Protocol>(
    client: ClientId,
    read_half: OwnedReadHalf,
    recv_scrambler: Arc<Mutex<Scrambler>>,
    closed: Arc<Notify>,
    handle: ServerHandle,
    event_tx: mpsc::UnboundedSender<ServerEvent<P::Incoming>>,
) {
    let mut reader = FrameReader::new(read_half);

    loop {
        let raw = tokio::select! {
            _ = closed.notified() => break,
            raw = reader.read_raw() => raw,
        };

        match raw {
            Ok(Some(raw)) => {
                let scrambler = *recv_scrambler.lock().expect("scrambler lock poisoned");
                let frame = raw.unscramble(&scrambler);

                match P::decode(frame.command, frame.payload) {
                    Ok(command) => {
                        if event_tx.send(ServerEvent::Command(client, command)).is_err() {
                            break;
                        }
                    }
                    Err(ProtoError::UnknownCommand(id)) => {
                        warn!(
                            server = handle.name,
                            client,
                            command = id,
                            "unknown command, disconnecting"
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(server = handle.name, client, err = %e, "malformed payload, disconnecting");
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(FrameError::Io(e)) => {
                debug!(server = handle.name, client, err = %e, "socket error");
                break;
            }
            Err(e) => {
                warn!(server = handle.name, client, err = %e, "framing error, disconnecting");
                break;
            }
        }
    }

    if handle.remove(client) {
        debug!(server = handle.name, client, "client disconnected");
        let _ = event_tx.send(ServerEvent::Disconnected(client));
    }
}

async fn write_loop(
    name: &'static str,
    client: ClientId,
    write_half: OwnedWriteHalf,
    mut ops: mpsc::UnboundedReceiver<WriterOp>,
) {
    let mut writer = FrameWriter::new(write_half);
    let mut scrambler = Scrambler::new();

    while let Some(op) = ops.recv().await {
        match op {
            WriterOp::Frame(command, payload) => {
                if let Err(e) = writer.write_frame(command, &payload, &scrambler).await {
                    debug!(server = name, client, err = %e, "write failed");
                    break;
                }
                if let Err(e) = writer.flush().await {
                    debug!(server = name, client, err = %e, "flush failed");
                    break;
                }
            }
            WriterOp::SetCode(code) => scrambler.set_code(code),
            WriterOp::ResetCode => scrambler.reset(),
            WriterOp::Close => break,
        }
    }
    // Dropping the write half closes the stream and unblocks the reader.
}

#[cfg(test)]
mod tests {
    use super::*;
    use canterproto::lobby::LobbyCommand;
    use canterproto::{id, lobby};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    struct LobbyProtocol;

    impl Protocol for LobbyProtocol {
        type Incoming = LobbyCommand;

        fn decode(command: CommandId, payload: Bytes) -> Result<LobbyCommand, ProtoError> {
            LobbyCommand::decode(command, payload)
        }
    }

    async fn start_test_server() -> (
        SocketAddr,
        ServerHandle,
        mpsc::UnboundedReceiver<ServerEvent<LobbyCommand>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (handle, events) = start::<LobbyProtocol>(listener, "test");
        (addr, handle, events)
    }

    #[tokio::test]
    async fn delivers_commands_and_lifecycle_events() {
        let (addr, _handle, mut events) = start_test_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut writer = FrameWriter::new(stream);

        let mut w = Writer::new();
        lobby::Login {
            constant0: 50,
            constant1: 281,
            login_id: Bytes::from_static(b"rider"),
            member_no: 1,
            auth_key: Bytes::from_static(b"token-1"),
            val0: 0,
        }
        .write(&mut w);
        writer
            .write_frame(id::LOGIN, &w.into_bytes(), &Scrambler::new())
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            ServerEvent::Connected(client, _) => assert_eq!(client, 1),
            other => panic!("expected connect, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            ServerEvent::Command(1, LobbyCommand::Login(login)) => {
                assert_eq!(&login.login_id[..], b"rider");
            }
            other => panic!("expected login, got {other:?}"),
        }

        drop(writer);
        match events.recv().await.unwrap() {
            ServerEvent::Disconnected(client) => assert_eq!(client, 1),
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_command_disconnects_the_client() {
        let (addr, _handle, mut events) = start_test_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut writer = FrameWriter::new(stream);
        writer
            .write_frame(0x3FF0, b"", &Scrambler::new())
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            ServerEvent::Connected(..) => {}
            other => panic!("expected connect, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            ServerEvent::Disconnected(..) => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_header_disconnects_the_client() {
        let (addr, _handle, mut events) = start_test_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[0u8; 4]).await.unwrap();

        match events.recv().await.unwrap() {
            ServerEvent::Connected(..) => {}
            other => panic!("expected connect, got {other:?}"),
        }
        match events.recv().await.unwrap() {
            ServerEvent::Disconnected(..) => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn queue_command_reaches_the_client() {
        let (addr, handle, mut events) = start_test_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, _write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        let client = match events.recv().await.unwrap() {
            ServerEvent::Connected(client, _) => client,
            other => panic!("expected connect, got {other:?}"),
        };

        handle.queue_command(
            client,
            &lobby::Notice {
                message: Bytes::from_static(b"servers restart at dawn"),
            },
        );

        let frame = reader
            .read_frame(&Scrambler::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.command, id::NOTICE);
        assert_eq!(&frame.payload[..], b"servers restart at dawn\0");
    }

    #[tokio::test]
    async fn queue_to_gone_client_is_silent() {
        let (_addr, handle, _events) = start_test_server().await;
        handle.queue_command(
            99,
            &lobby::Notice {
                message: Bytes::from_static(b"nobody home"),
            },
        );
    }

    #[tokio::test]
    async fn disconnect_closes_the_connection() {
        let (addr, handle, mut events) = start_test_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, _write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        let client = match events.recv().await.unwrap() {
            ServerEvent::Connected(client, _) => client,
            other => panic!("expected connect, got {other:?}"),
        };

        handle.disconnect(client);
        match events.recv().await.unwrap() {
            ServerEvent::Disconnected(c) => assert_eq!(c, client),
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert!(reader.read_frame(&Scrambler::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_code_rearms_both_directions() {
        let (addr, handle, mut events) = start_test_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        let mut writer = FrameWriter::new(write_half);

        let client = match events.recv().await.unwrap() {
            ServerEvent::Connected(client, _) => client,
            other => panic!("expected connect, got {other:?}"),
        };

        handle.set_code(client, 0x5EED_0001);
        let mut client_scrambler = Scrambler::new();
        client_scrambler.set_code(0x5EED_0001);

        // Serverbound under the new key.
        writer
            .write_frame(id::HEARTBEAT, b"", &client_scrambler)
            .await
            .unwrap();
        match events.recv().await.unwrap() {
            ServerEvent::Command(_, LobbyCommand::Heartbeat) => {}
            other => panic!("expected heartbeat, got {other:?}"),
        }

        // Clientbound under the new key.
        handle.queue_command(
            client,
            &lobby::Notice {
                message: Bytes::from_static(b"rekeyed"),
            },
        );
        let frame = reader.read_frame(&client_scrambler).await.unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"rekeyed\0");
    }
}
