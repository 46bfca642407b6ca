use framemux_frame::{FrameReader, FrameWriter};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::connection::{Connection, ConnectionConfig};
use crate::error::{ConnError, Result};

/// Reader and writer tasks driving a connection over a byte stream.
#[derive(Debug)]
pub struct ConnectionTask {
    reader: JoinHandle<Result<()>>,
    writer: JoinHandle<Result<()>>,
}

impl ConnectionTask {
    /// Wait for both tasks to finish. Returns the first error either produced.
    pub async fn join(self) -> Result<()> {
        let reader = flatten(self.reader.await);
        let writer = flatten(self.writer.await);
        reader.and(writer)
    }

    /// Abort both tasks without waiting.
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|err| ConnError::Task(err.to_string()))?
}

/// Run a [`Connection`] over any duplex byte stream.
///
/// Outbound frames are queued by the connection's socket and written by a
/// writer task; a reader task decodes inbound frames and routes them. Both
/// tasks stop when the connection shuts down, and the writer flushes frames
/// already queued before closing its half.
pub fn spawn_io<T>(io: T, config: ConnectionConfig) -> (Connection, ConnectionTask)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let frame_config = config.frame_config();
    let (read_half, write_half) = tokio::io::split(io);
    let (socket, mut outbound) = framemux_transport::channel();
    let conn = Connection::with_config(socket, config);

    let writer = {
        let conn = conn.clone();
        let token = conn.shutdown_token();
        let mut writer = FrameWriter::with_config(write_half, &frame_config);
        tokio::spawn(async move {
            loop {
                let buf = tokio::select! {
                    _ = token.cancelled() => break,
                    buf = outbound.recv() => buf,
                };
                let Some(buf) = buf else { break };
                if let Err(err) = writer.write_raw(buf).await {
                    error!(error = %err, "write failed; shutting down connection");
                    conn.shutdown();
                    return Err(err.into());
                }
            }
            while let Some(buf) = outbound.try_recv() {
                if writer.write_raw(buf).await.is_err() {
                    break;
                }
            }
            let _ = writer.into_inner().shutdown().await;
            debug!(role = %conn.role(), "writer stopped");
            Ok(())
        })
    };

    let reader = {
        let conn = conn.clone();
        let reader = FrameReader::with_config(read_half, &frame_config);
        tokio::spawn(async move { conn.serve_io(reader).await })
    };

    (conn, ConnectionTask { reader, writer })
}
