use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use bytes::Bytes;
use framemux_frame::{Frame, FrameConfig, FrameError, FrameReader, Framer, MAX_FRAME_SIZE};
use framemux_transport::{Inbound, Socket};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{ConnError, Result};
use crate::stream::Stream;

/// Which side of the connection this endpoint is.
///
/// Clients allocate odd stream ids starting at 1, servers even ids starting
/// at 2, so the two peers never pick the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Client,
    Server,
}

impl Role {
    /// First locally allocated stream id.
    pub fn first_stream_id(self) -> u32 {
        match self {
            Self::Client => 1,
            Self::Server => 2,
        }
    }

    /// Whether `stream_id` belongs to the id space this role allocates from.
    pub fn allocates(self, stream_id: u32) -> bool {
        stream_id != 0 && stream_id % 2 == self.first_stream_id() % 2
    }

    /// The role on the other end of the connection.
    pub fn peer(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection behavior configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub role: Role,
    /// Largest frame body accepted or produced.
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            role: Role::Client,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ConnectionConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
        }
    }
}

/// Callback invoked for every peer-initiated stream.
pub type StreamHandler = Arc<dyn Fn(Stream) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) struct Shared {
    role: Role,
    socket: Box<dyn Socket>,
    framer: Framer,
    table: Mutex<StreamTable>,
    handler: RwLock<Option<StreamHandler>>,
    shutdown: CancellationToken,
}

struct StreamTable {
    // u64 so that running past u32::MAX is observable.
    next_stream_id: u64,
    peer_ids: PeerIds,
    streams: HashMap<u32, Stream>,
}

/// Peer-initiated ids that have ever been opened.
///
/// Peers allocate ids in order but may put them on the wire out of order, so
/// only ids actually seen count as used. Every peer id below `floor` has
/// been seen; `above` holds the seen ids past the first gap.
#[derive(Debug)]
struct PeerIds {
    floor: u64,
    above: BTreeSet<u32>,
}

impl PeerIds {
    fn new(peer: Role) -> Self {
        Self {
            floor: u64::from(peer.first_stream_id()),
            above: BTreeSet::new(),
        }
    }

    fn was_opened(&self, stream_id: u32) -> bool {
        u64::from(stream_id) < self.floor || self.above.contains(&stream_id)
    }

    fn mark_opened(&mut self, stream_id: u32) {
        self.above.insert(stream_id);
        while let Ok(next) = u32::try_from(self.floor) {
            if !self.above.remove(&next) {
                break;
            }
            self.floor += 2;
        }
    }
}

/// Many independent streams multiplexed over one message socket.
///
/// `Connection` is a cheap handle; clones share the same stream table.
/// Inbound messages are fed through [`Connection::on_data`], usually by
/// [`Connection::receive_loop`] or [`Connection::serve_io`].
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a connection with default configuration for `role`.
    pub fn new(socket: impl Socket, role: Role) -> Self {
        Self::with_config(
            socket,
            ConnectionConfig {
                role,
                ..ConnectionConfig::default()
            },
        )
    }

    pub fn with_config(socket: impl Socket, config: ConnectionConfig) -> Self {
        let framer = Framer::with_config(&config.frame_config());
        Self {
            shared: Arc::new(Shared {
                role: config.role,
                socket: Box::new(socket),
                framer,
                table: Mutex::new(StreamTable {
                    next_stream_id: u64::from(config.role.first_stream_id()),
                    peer_ids: PeerIds::new(config.role.peer()),
                    streams: HashMap::new(),
                }),
                handler: RwLock::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    /// Register the handler invoked for each new peer-initiated stream.
    ///
    /// The handler runs as its own tokio task after the stream's first
    /// HEADERS frame has been applied, so a slow handler never blocks
    /// inbound dispatch for other streams.
    pub fn set_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Stream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: StreamHandler = Arc::new(move |stream| handler(stream).boxed());
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Open a locally initiated stream.
    pub fn new_stream(&self) -> Result<Stream> {
        self.new_stream_with_parent(0)
    }

    /// Open a locally initiated stream recording `parent_stream_id`.
    pub fn new_stream_with_parent(&self, parent_stream_id: u32) -> Result<Stream> {
        if self.is_shutdown() {
            return Err(ConnError::ConnectionClosed);
        }
        let mut table = self.table();
        let stream_id =
            u32::try_from(table.next_stream_id).map_err(|_| ConnError::StreamIdsExhausted)?;
        table.next_stream_id += 2;

        let stream = Stream::new(stream_id, parent_stream_id, Arc::downgrade(&self.shared));
        table.streams.insert(stream_id, stream.clone());
        debug!(stream_id, parent_stream_id, role = %self.role(), "opened stream");
        Ok(stream)
    }

    /// Look up a stream, optionally creating it for a new peer-initiated id.
    ///
    /// Returns the stream and whether it was just created. Ids are never
    /// resurrected: a peer id that was opened before and is no longer in the
    /// table is [`ConnError::StreamClosed`]. Peer ids may arrive in any order.
    pub fn get_stream(&self, stream_id: u32, create: bool) -> Result<(Stream, bool)> {
        let mut table = self.table();
        if let Some(stream) = table.streams.get(&stream_id) {
            return Ok((stream.clone(), false));
        }
        if stream_id == 0 {
            return Err(ConnError::UnknownStream(stream_id));
        }

        if self.role().allocates(stream_id) {
            return if u64::from(stream_id) < table.next_stream_id {
                Err(ConnError::StreamClosed(stream_id))
            } else {
                Err(ConnError::UnknownStream(stream_id))
            };
        }
        if table.peer_ids.was_opened(stream_id) {
            return Err(ConnError::StreamClosed(stream_id));
        }
        if !create {
            return Err(ConnError::UnknownStream(stream_id));
        }

        table.peer_ids.mark_opened(stream_id);
        let stream = Stream::new(stream_id, 0, Arc::downgrade(&self.shared));
        table.streams.insert(stream_id, stream.clone());
        debug!(stream_id, "peer opened stream");
        Ok((stream, true))
    }

    /// Forget a fully closed stream.
    pub(crate) fn remove_stream(&self, stream_id: u32) {
        if self.table().streams.remove(&stream_id).is_some() {
            trace!(stream_id, "removed stream");
        }
    }

    /// Number of open streams.
    pub fn stream_count(&self) -> usize {
        self.table().streams.len()
    }

    pub fn contains_stream(&self, stream_id: u32) -> bool {
        self.table().streams.contains_key(&stream_id)
    }

    /// Decode one inbound message and route it to its stream.
    pub fn on_data(&self, buf: Bytes) -> Result<()> {
        if self.is_shutdown() {
            return Err(ConnError::ConnectionClosed);
        }
        let frame = self.shared.framer.read_frame(buf)?;
        self.handle_frame(frame)
    }

    /// Route an already decoded frame to its stream.
    ///
    /// A HEADERS frame for an unseen peer id opens the stream and hands it to
    /// the registered handler. DATA for an unknown stream is a protocol error.
    pub fn handle_frame(&self, frame: Frame) -> Result<()> {
        trace!(
            stream_id = frame.stream_id(),
            frame_type = frame.frame_type().name(),
            end_stream = frame.end_stream(),
            "inbound frame"
        );
        match frame {
            Frame::Headers(headers) => {
                let (stream, created) = self.get_stream(headers.stream_id, true)?;
                stream.on_headers(headers)?;
                if created {
                    self.dispatch_new_stream(stream);
                }
            }
            Frame::Data(data) => {
                let (stream, _) = self.get_stream(data.stream_id, false)?;
                stream.on_data(data)?;
            }
        }
        Ok(())
    }

    fn dispatch_new_stream(&self, stream: Stream) {
        let handler = self
            .shared
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => {
                tokio::spawn(handler(stream));
            }
            None => debug!(
                stream_id = stream.stream_id(),
                "no stream handler registered; stream left unanswered"
            ),
        }
    }

    /// Encode and transmit one frame.
    pub(crate) fn send_frame(&self, frame: &Frame) -> Result<()> {
        if self.is_shutdown() {
            return Err(ConnError::ConnectionClosed);
        }
        let buf = self.shared.framer.write_frame(frame)?;
        trace!(
            stream_id = frame.stream_id(),
            frame_type = frame.frame_type().name(),
            len = buf.len(),
            "outbound frame"
        );
        self.shared.socket.send(buf)?;
        Ok(())
    }

    /// Pull messages from `inbound` until the socket closes, the connection
    /// is shut down, or a fatal error occurs.
    ///
    /// A fatal error shuts the connection down and is returned.
    pub async fn receive_loop(&self, mut inbound: Inbound) -> Result<()> {
        loop {
            let buf = tokio::select! {
                _ = self.shared.shutdown.cancelled() => return Ok(()),
                buf = inbound.recv() => buf,
            };
            let Some(buf) = buf else {
                debug!(role = %self.role(), "socket closed");
                self.shutdown();
                return Ok(());
            };
            self.absorb(self.on_data(buf))?;
        }
    }

    /// Read frames from a byte stream until EOF, shutdown, or a fatal error.
    pub async fn serve_io<R>(&self, mut reader: FrameReader<R>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let frame = tokio::select! {
                _ = self.shared.shutdown.cancelled() => return Ok(()),
                frame = reader.read_frame() => frame,
            };
            match frame {
                Ok(frame) => self.absorb(self.handle_frame(frame))?,
                Err(FrameError::ConnectionClosed) => {
                    debug!(role = %self.role(), "peer closed connection");
                    self.shutdown();
                    return Ok(());
                }
                Err(err) => self.absorb(Err(err.into()))?,
            }
        }
    }

    fn absorb(&self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => {
                error!(error = %err, role = %self.role(), "fatal connection error");
                self.shutdown();
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "dropping inbound frame");
                Ok(())
            }
        }
    }

    /// Tear the connection down and force-close every open stream.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let streams: Vec<Stream> = self
            .table()
            .streams
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        if streams.is_empty() {
            return;
        }
        debug!(count = streams.len(), "force-closing streams");
        for stream in streams {
            stream.force_close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolve once the connection has been shut down.
    pub async fn closed(&self) {
        self.shared.shutdown.cancelled().await
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    fn table(&self) -> MutexGuard<'_, StreamTable> {
        self.shared
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role())
            .field("streams", &self.stream_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
