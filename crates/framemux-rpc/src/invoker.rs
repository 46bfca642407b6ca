use bytes::Bytes;
use framemux_conn::{Connection, Stream};
use framemux_frame::{Metadata, PATH};
use tracing::{debug, warn};

use crate::config::InvokerConfig;
use crate::error::{Result, RpcError};
use crate::path::OperationPath;
use crate::response::Response;

/// Client side of the RPC layer: opens one stream per call.
#[derive(Debug, Clone)]
pub struct Invoker {
    conn: Connection,
    config: InvokerConfig,
}

impl Invoker {
    pub fn new(conn: Connection) -> Self {
        Self::with_config(conn, InvokerConfig::default())
    }

    pub fn with_config(conn: Connection, config: InvokerConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Call a stateless operation; non-2xx replies become [`RpcError::Status`].
    pub async fn unary(
        &self,
        namespace: &str,
        operation: &str,
        payload: impl Into<Bytes>,
    ) -> Result<Bytes> {
        self.invoke(&OperationPath::new(namespace, operation), payload)
            .await?
            .into_result()
    }

    /// Call an operation on one entity instance.
    pub async fn unary_stateful(
        &self,
        namespace: &str,
        entity_id: &str,
        operation: &str,
        payload: impl Into<Bytes>,
    ) -> Result<Bytes> {
        self.invoke(
            &OperationPath::stateful(namespace, entity_id, operation),
            payload,
        )
        .await?
        .into_result()
    }

    /// Perform one unary exchange and return the raw reply, whatever its status.
    ///
    /// On timeout the local half of the stream is closed; the stream is
    /// released once the peer's late reply (if any) arrives.
    pub async fn invoke(&self, path: &OperationPath, payload: impl Into<Bytes>) -> Result<Response> {
        let stream = self.conn.new_stream()?;
        let raw_path = path.to_path(&self.config.base_path);
        debug!(stream_id = stream.stream_id(), path = %raw_path, "invoking");
        stream.send_unary(&Metadata::new().with(PATH, raw_path.as_str()), payload)?;

        let reply = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, stream.receive_data()).await {
                Ok(reply) => reply?,
                Err(_) => {
                    warn!(stream_id = stream.stream_id(), path = %raw_path, ?timeout, "call timed out");
                    stream.close()?;
                    return Err(RpcError::Timeout(timeout));
                }
            },
            None => stream.receive_data().await?,
        };

        let response = Response::new(stream.metadata(), reply.unwrap_or_default());
        debug!(
            stream_id = stream.stream_id(),
            path = %raw_path,
            status = response.status,
            "call completed"
        );
        Ok(response)
    }

    /// Open a streaming exchange. `end` half-closes the request side at once,
    /// for server-streaming calls without input.
    pub fn stream(&self, namespace: &str, operation: &str, end: bool) -> Result<Stream> {
        let path = OperationPath::new(namespace, operation).to_path(&self.config.base_path);
        let stream = self.conn.new_stream()?;
        stream.send_metadata(&Metadata::new().with(PATH, path.as_str()), end)?;
        debug!(stream_id = stream.stream_id(), %path, "opened streaming call");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use framemux_conn::Role;
    use framemux_frame::{Frame, Framer};
    use framemux_transport::channel;

    use super::*;

    #[tokio::test]
    async fn stream_sends_path_headers() {
        let (socket, mut outbound) = channel();
        let invoker = Invoker::new(Connection::new(socket, Role::Client));

        let stream = invoker.stream("ns", "watch", true).unwrap();
        assert!(stream.is_self_closed());

        let frame = Framer::new()
            .read_frame(outbound.try_recv().unwrap())
            .unwrap();
        let Frame::Headers(headers) = frame else {
            panic!("expected HEADERS");
        };
        assert!(headers.end_stream);
        assert_eq!(headers.metadata().unwrap().scalar(PATH), Some("/ns/watch"));
    }

    #[tokio::test]
    async fn invoke_fails_on_closed_connection() {
        let (socket, _outbound) = channel();
        let conn = Connection::new(socket, Role::Client);
        conn.shutdown();

        let err = Invoker::new(conn)
            .unary("ns", "op", "x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Conn(framemux_conn::ConnError::ConnectionClosed)
        ));
    }
}
