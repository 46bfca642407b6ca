use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use framemux_frame::{DataFrame, Frame, HeadersFrame, Metadata};
use tracing::{debug, trace};

use crate::connection::{Connection, Shared};
use crate::error::{ConnError, Result};
use crate::queue::BackpressureQueue;

/// One logical bidirectional exchange multiplexed over a [`Connection`].
///
/// Each direction half-closes independently. The stream leaves the
/// connection's table the moment both halves are closed and its id is never
/// reused. Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    stream_id: u32,
    parent_stream_id: u32,
    conn: Weak<Shared>,
    state: Mutex<StreamState>,
    queue: BackpressureQueue<Bytes>,
}

#[derive(Default)]
struct StreamState {
    self_closed: bool,
    other_closed: bool,
    closed: bool,
    metadata: Metadata,
}

impl Stream {
    pub(crate) fn new(stream_id: u32, parent_stream_id: u32, conn: Weak<Shared>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                stream_id,
                parent_stream_id,
                conn,
                state: Mutex::new(StreamState::default()),
                queue: BackpressureQueue::new(),
            }),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.inner.stream_id
    }

    /// Id of the stream that spawned this one, or 0. Informational only.
    pub fn parent_stream_id(&self) -> u32 {
        self.inner.parent_stream_id
    }

    /// The local half has sent END_STREAM.
    pub fn is_self_closed(&self) -> bool {
        self.lock().self_closed
    }

    /// The peer's half has sent END_STREAM (or the connection went away).
    pub fn is_other_closed(&self) -> bool {
        self.lock().other_closed
    }

    /// Both halves are closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Snapshot of the most recently received metadata.
    pub fn metadata(&self) -> Metadata {
        self.lock().metadata.clone()
    }

    /// Send a HEADERS frame carrying `metadata`; `end` half-closes the local side.
    pub fn send_metadata(&self, metadata: &Metadata, end: bool) -> Result<()> {
        let frame = HeadersFrame::with_metadata(self.stream_id(), metadata, end)?;
        self.transmit(frame.into(), end)
    }

    /// Send a DATA frame; `end` half-closes the local side.
    pub fn send_data(&self, data: impl Into<Bytes>, end: bool) -> Result<()> {
        let frame = DataFrame::new(self.stream_id(), data, end);
        self.transmit(frame.into(), end)
    }

    /// Send one request or response: metadata, then the payload with
    /// END_STREAM. An empty payload ends the stream on the HEADERS frame.
    pub fn send_unary(&self, metadata: &Metadata, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        if data.is_empty() {
            return self.send_metadata(metadata, true);
        }
        self.send_metadata(metadata, false)?;
        self.send_data(data, true)
    }

    /// Wait for the next inbound payload. `Ok(None)` means the peer ended
    /// its half of the stream.
    pub async fn receive_data(&self) -> Result<Option<Bytes>> {
        self.inner.queue.receive().await
    }

    /// Drain every remaining payload in arrival order, awaiting `callback`
    /// on each before pulling the next.
    pub async fn for_each<F, Fut>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(Bytes) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(data) = self.receive_data().await? {
            callback(data).await;
        }
        Ok(())
    }

    /// Half-close the local side with an empty HEADERS frame. Idempotent.
    ///
    /// Succeeds even when the connection is already gone; the stream is
    /// then only marked closed locally.
    pub fn close(&self) -> Result<()> {
        if self.is_self_closed() {
            return Ok(());
        }
        match self.send_metadata(&Metadata::new(), true) {
            Ok(()) | Err(ConnError::SendAfterClose(_)) => Ok(()),
            Err(ConnError::ConnectionClosed) => {
                self.lock().self_closed = true;
                self.check_closed();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Open a new stream on the same connection whose parent is this stream.
    pub fn new_stream(&self) -> Result<Stream> {
        self.connection()?.new_stream_with_parent(self.stream_id())
    }

    fn connection(&self) -> Result<Connection> {
        self.inner
            .conn
            .upgrade()
            .map(Connection::from_shared)
            .ok_or(ConnError::ConnectionClosed)
    }

    fn transmit(&self, frame: Frame, end: bool) -> Result<()> {
        {
            // Held across the send so frames from concurrent handles stay
            // ordered and nothing slips out after END_STREAM.
            let mut state = self.lock();
            if state.self_closed {
                return Err(ConnError::SendAfterClose(self.stream_id()));
            }
            self.connection()?.send_frame(&frame)?;
            if end {
                state.self_closed = true;
            }
        }
        if end {
            trace!(stream_id = self.stream_id(), "local half closed");
            self.check_closed();
        }
        Ok(())
    }

    /// An empty block (such as the terminal HEADERS sent by `close`) keeps
    /// the metadata already received.
    pub(crate) fn on_headers(&self, frame: HeadersFrame) -> Result<()> {
        let metadata = if frame.block_fragment.is_empty() {
            None
        } else {
            Some(frame.metadata()?)
        };
        {
            let mut state = self.lock();
            if state.other_closed {
                return Err(ConnError::FrameAfterEndStream(self.stream_id()));
            }
            if let Some(metadata) = metadata {
                state.metadata = metadata;
            }
        }
        if frame.end_stream {
            self.end_receive();
        }
        Ok(())
    }

    pub(crate) fn on_data(&self, frame: DataFrame) -> Result<()> {
        if self.lock().other_closed {
            return Err(ConnError::FrameAfterEndStream(self.stream_id()));
        }
        self.inner
            .queue
            .push(frame.data)
            .map_err(|_| ConnError::FrameAfterEndStream(self.stream_id()))?;
        if frame.end_stream {
            self.end_receive();
        }
        Ok(())
    }

    fn end_receive(&self) {
        self.lock().other_closed = true;
        trace!(stream_id = self.stream_id(), "remote half closed");
        self.check_closed();
        // Last, so a reader woken by end-of-stream sees the final state.
        self.inner.queue.close();
    }

    fn check_closed(&self) {
        {
            let mut state = self.lock();
            if !state.self_closed || !state.other_closed || state.closed {
                return;
            }
            state.closed = true;
        }
        debug!(stream_id = self.stream_id(), "stream closed");
        if let Some(shared) = self.inner.conn.upgrade() {
            Connection::from_shared(shared).remove_stream(self.stream_id());
        }
    }

    /// Close both halves without sending anything. Used on connection teardown.
    pub(crate) fn force_close(&self) {
        {
            let mut state = self.lock();
            state.self_closed = true;
            state.other_closed = true;
            state.closed = true;
        }
        self.inner.queue.close();
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Stream")
            .field("stream_id", &self.inner.stream_id)
            .field("parent_stream_id", &self.inner.parent_stream_id)
            .field("self_closed", &state.self_closed)
            .field("other_closed", &state.other_closed)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use framemux_frame::{Framer, PATH};
    use framemux_transport::{channel, Inbound};
    use futures_util::FutureExt;

    use super::*;
    use crate::connection::{Connection, Role};

    fn client() -> (Connection, Inbound) {
        let (socket, outbound) = channel();
        (Connection::new(socket, Role::Client), outbound)
    }

    fn sent(outbound: &mut Inbound) -> Vec<Frame> {
        let framer = Framer::new();
        std::iter::from_fn(|| outbound.try_recv())
            .map(|buf| framer.read_frame(buf).unwrap())
            .collect()
    }

    #[test]
    fn send_unary_with_payload_sends_headers_then_data() {
        let (conn, mut outbound) = client();
        let stream = conn.new_stream().unwrap();
        let md = Metadata::new().with(PATH, "ns/op");

        stream.send_unary(&md, "hello").unwrap();

        let frames = sent(&mut outbound);
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            Frame::Headers(h) => {
                assert!(!h.end_stream);
                assert_eq!(h.metadata().unwrap(), md);
            }
            other => panic!("expected HEADERS, got {other:?}"),
        }
        match &frames[1] {
            Frame::Data(d) => {
                assert!(d.end_stream);
                assert_eq!(d.data.as_ref(), b"hello");
            }
            other => panic!("expected DATA, got {other:?}"),
        }
        assert!(stream.is_self_closed());
        assert!(!stream.is_closed());
    }

    #[test]
    fn send_unary_without_payload_ends_on_headers() {
        let (conn, mut outbound) = client();
        let stream = conn.new_stream().unwrap();

        stream.send_unary(&Metadata::new(), Bytes::new()).unwrap();

        let frames = sent(&mut outbound);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].end_stream());
        assert_eq!(frames[0].size(), framemux_frame::HEADER_SIZE);
    }

    #[test]
    fn send_after_local_close_fails() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        stream.send_data("last", true).unwrap();

        let err = stream.send_data("more", false).unwrap_err();
        assert!(matches!(err, ConnError::SendAfterClose(1)));
    }

    #[test]
    fn close_is_idempotent() {
        let (conn, mut outbound) = client();
        let stream = conn.new_stream().unwrap();

        stream.close().unwrap();
        stream.close().unwrap();

        assert_eq!(sent(&mut outbound).len(), 1);
        assert!(stream.is_self_closed());
    }

    #[tokio::test]
    async fn both_halves_closed_removes_stream() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        stream.send_data("x", true).unwrap();
        assert!(conn.contains_stream(1));

        stream
            .on_headers(HeadersFrame::new(1, Bytes::new(), true))
            .unwrap();

        assert!(stream.is_closed());
        assert!(!conn.contains_stream(1));
        assert_eq!(stream.receive_data().await.unwrap(), None);
    }

    #[tokio::test]
    async fn inbound_data_is_queued_in_order() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();

        for (chunk, end) in [("a", false), ("b", false), ("c", true)] {
            stream
                .on_data(DataFrame::new(1, Bytes::from(chunk), end))
                .unwrap();
        }

        let mut seen = Vec::new();
        stream
            .for_each(|data| {
                seen.push(String::from_utf8(data.to_vec()).unwrap());
                async {}
            })
            .await
            .unwrap();
        assert_eq!(seen, ["a", "b", "c"]);
        assert!(stream.is_other_closed());
    }

    #[test]
    fn frame_after_remote_end_is_rejected() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        stream
            .on_data(DataFrame::new(1, Bytes::from_static(b"done"), true))
            .unwrap();

        let err = stream
            .on_data(DataFrame::new(1, Bytes::from_static(b"late"), false))
            .unwrap_err();
        assert!(matches!(err, ConnError::FrameAfterEndStream(1)));
    }

    #[test]
    fn headers_replace_metadata() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        let md = Metadata::new().with(framemux_frame::STATUS, "200");

        let frame = HeadersFrame::with_metadata(1, &md, false).unwrap();
        stream.on_headers(frame).unwrap();

        assert_eq!(stream.metadata(), md);
        assert!(!stream.is_other_closed());
    }

    #[test]
    fn empty_terminal_headers_keep_metadata() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        let md = Metadata::new().with(framemux_frame::STATUS, "200");

        stream
            .on_headers(HeadersFrame::with_metadata(1, &md, false).unwrap())
            .unwrap();
        stream
            .on_data(DataFrame::new(1, Bytes::from_static(b"a"), false))
            .unwrap();
        stream
            .on_headers(HeadersFrame::new(1, Bytes::new(), true))
            .unwrap();

        assert_eq!(stream.metadata(), md);
        assert!(stream.is_other_closed());
    }

    #[tokio::test]
    async fn for_each_awaits_callback() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        stream
            .on_data(DataFrame::new(1, Bytes::from_static(b"x"), false))
            .unwrap();
        stream
            .on_data(DataFrame::new(1, Bytes::from_static(b"y"), true))
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        stream
            .for_each(|data| {
                let tx = tx.clone();
                async move {
                    tokio::task::yield_now().await;
                    tx.send(data).unwrap();
                }
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().as_ref(), b"x");
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"y");
    }

    #[tokio::test]
    async fn receive_waits_for_data() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        assert!(stream.receive_data().now_or_never().is_none());
    }

    #[test]
    fn child_stream_records_parent() {
        let (conn, _outbound) = client();
        let parent = conn.new_stream().unwrap();
        let child = parent.new_stream().unwrap();

        assert_eq!(child.stream_id(), 3);
        assert_eq!(child.parent_stream_id(), 1);
        assert_eq!(parent.parent_stream_id(), 0);
    }

    #[test]
    fn close_after_connection_dropped_marks_local_half() {
        let (conn, _outbound) = client();
        let stream = conn.new_stream().unwrap();
        drop(conn);

        stream.close().unwrap();
        assert!(stream.is_self_closed());
        assert!(matches!(
            stream.new_stream(),
            Err(ConnError::ConnectionClosed)
        ));
    }
}
