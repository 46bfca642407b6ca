use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, TransportError};

/// Outbound half of a message-oriented duplex socket.
///
/// `send` never blocks and never applies backpressure: the message is queued
/// and delivered in order by whatever drives the other end. Each call carries
/// exactly one complete frame.
pub trait Socket: Send + Sync + 'static {
    /// Queue one message for delivery.
    fn send(&self, msg: Bytes) -> Result<()>;
}

impl<S: Socket + ?Sized> Socket for std::sync::Arc<S> {
    fn send(&self, msg: Bytes) -> Result<()> {
        (**self).send(msg)
    }
}

impl<S: Socket + ?Sized> Socket for Box<S> {
    fn send(&self, msg: Bytes) -> Result<()> {
        (**self).send(msg)
    }
}

/// A [`Socket`] backed by an unbounded in-process queue.
#[derive(Debug, Clone)]
pub struct ChannelSocket {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSocket {
    /// Returns true once the receiving [`Inbound`] has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Socket for ChannelSocket {
    fn send(&self, msg: Bytes) -> Result<()> {
        trace!(len = msg.len(), "socket send");
        self.tx.send(msg).map_err(|_| TransportError::Closed)
    }
}

/// Receiving half of a message pipe. Yields whole messages in send order.
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Inbound {
    /// Wait for the next message. Returns `None` once every sender is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new messages. Already queued messages can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Create a one-directional message pipe.
pub fn channel() -> (ChannelSocket, Inbound) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSocket { tx }, Inbound { rx })
}

/// One side of an in-memory duplex socket.
#[derive(Debug)]
pub struct Endpoint {
    /// Messages sent here arrive at the other endpoint's `inbound`.
    pub socket: ChannelSocket,
    /// Messages sent by the other endpoint.
    pub inbound: Inbound,
}

/// Create two cross-connected endpoints.
pub fn pair() -> (Endpoint, Endpoint) {
    let (left_socket, right_inbound) = channel();
    let (right_socket, left_inbound) = channel();
    (
        Endpoint {
            socket: left_socket,
            inbound: left_inbound,
        },
        Endpoint {
            socket: right_socket,
            inbound: right_inbound,
        },
    )
}
