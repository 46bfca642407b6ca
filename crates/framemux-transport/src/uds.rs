use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Unix domain socket transport.
///
/// Provides async bind/accept/connect over filesystem-path UDS on Linux and
/// macOS. The socket file is removed on `Drop` if it still belongs to this
/// listener.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket, it is removed first
    /// (stale socket cleanup). Must be called within a tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;
        let created = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            created_inode: Some((created.dev(), created.ino())),
            path,
        })
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(stream)
    }

    /// Connect to a listening Unix domain socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to unix domain socket");
        Ok(stream)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}
