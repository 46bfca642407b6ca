use std::path::Path;

use framemux_transport::UnixDomainSocket;
use tracing::debug;

use crate::connection::{Connection, ConnectionConfig, Role};
use crate::error::Result;
use crate::io::{spawn_io, ConnectionTask};

/// Accepts server-role connections on a Unix domain socket.
pub struct ConnectionListener {
    socket: UnixDomainSocket,
    config: ConnectionConfig,
}

impl ConnectionListener {
    /// Bind to a Unix domain socket path. Must be called within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        Ok(Self {
            socket,
            config: ConnectionConfig {
                role: Role::Server,
                ..ConnectionConfig::default()
            },
        })
    }

    /// Override connection config. The role is always forced to server.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = ConnectionConfig {
            role: Role::Server,
            ..config
        };
        self
    }

    /// Accept the next peer and start driving its connection.
    pub async fn accept(&self) -> Result<(Connection, ConnectionTask)> {
        let stream = self.socket.accept().await?;
        debug!(path = ?self.socket.path(), "connection accepted");
        Ok(spawn_io(stream, self.config.clone()))
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use framemux_frame::Metadata;

    use super::*;
    use crate::connector::connect;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/fmxl-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("listener.sock")
    }

    #[tokio::test]
    async fn accepted_connection_is_server_role() {
        let sock_path = make_sock_path("accept");
        let listener = ConnectionListener::bind(&sock_path).expect("listener should bind");

        let server = tokio::spawn(async move {
            let (conn, task) = listener.accept().await.expect("listener should accept");
            assert_eq!(conn.role(), Role::Server);
            assert_eq!(conn.new_stream().unwrap().stream_id(), 2);
            conn.set_handler(|stream| async move {
                let payload = stream.receive_data().await.unwrap().unwrap_or_default();
                stream.send_unary(&Metadata::new(), payload).unwrap();
            });
            task.join().await
        });

        let (client, task) = connect(&sock_path).await.expect("client should connect");
        assert_eq!(client.role(), Role::Client);
        let stream = client.new_stream().unwrap();
        stream.send_unary(&Metadata::new(), "over uds").unwrap();
        assert_eq!(
            stream.receive_data().await.unwrap().unwrap().as_ref(),
            b"over uds"
        );

        client.shutdown();
        task.join().await.expect("client tasks should finish");
        server
            .await
            .expect("server task should complete")
            .expect("server connection should end cleanly");

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
