use std::path::Path;

use framemux_transport::UnixDomainSocket;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::Result;
use crate::io::{spawn_io, ConnectionTask};

/// Connect to a listening peer as a client.
pub async fn connect(path: impl AsRef<Path>) -> Result<(Connection, ConnectionTask)> {
    connect_with_config(path, ConnectionConfig::default()).await
}

/// Connect with explicit configuration.
pub async fn connect_with_config(
    path: impl AsRef<Path>,
    config: ConnectionConfig,
) -> Result<(Connection, ConnectionTask)> {
    let stream = UnixDomainSocket::connect(path).await?;
    Ok(spawn_io(stream, config))
}
