//! Minimal RPC server: answers `demo/echo` and `demo/count` on one socket.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- call /tmp/framemux-echo-<pid>/echo.sock \
//!     demo/echo --data hello

use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use framemux::conn::ConnectionListener;
use framemux::rpc::{HandlerError, Handlers};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("framemux-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let mut handlers = Handlers::new();
    handlers.register("demo", "echo", |input| async move {
        Ok::<_, HandlerError>(input)
    });
    handlers.register("demo", "count", |input: Bytes| async move {
        Ok::<_, HandlerError>(Bytes::from(input.len().to_string()))
    });
    let handlers = Arc::new(handlers);

    let listener = ConnectionListener::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    // Serve one client until it disconnects.
    let (conn, task) = listener.accept().await?;
    eprintln!("Client connected");
    handlers.attach(&conn);
    task.join().await?;
    eprintln!("Client disconnected");

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
