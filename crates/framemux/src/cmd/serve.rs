use std::sync::Arc;

use bytes::Bytes;
use framemux_conn::{ConnectionListener, Stream};
use framemux_rpc::{respond, HandlerError, Handlers, STATUS_OK};
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{conn_error, CliError, CliResult, INTERNAL, SUCCESS};

pub const NAMESPACE: &str = "echo";

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    let listener =
        ConnectionListener::bind(&args.path).map_err(|err| conn_error("bind failed", err))?;
    let handlers = Arc::new(builtin_handlers());
    info!(
        path = %listener.path().display(),
        operations = ?handlers.operations(),
        "serving"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                })?;
                info!("interrupted; shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (conn, task) = accepted.map_err(|err| conn_error("accept failed", err))?;
                handlers.attach(&conn);
                tokio::spawn(async move {
                    if let Err(err) = task.join().await {
                        warn!(error = %err, "connection ended with error");
                    }
                });
            }
        }
    }

    Ok(SUCCESS)
}

/// The operations served by `framemux serve`.
pub fn builtin_handlers() -> Handlers {
    let mut handlers = Handlers::new();
    handlers.register(NAMESPACE, "echo", |input| async move {
        Ok::<_, HandlerError>(input)
    });
    handlers.register(NAMESPACE, "upper", |input: Bytes| async move {
        let text = std::str::from_utf8(&input)?;
        Ok::<_, HandlerError>(Bytes::from(text.to_uppercase()))
    });
    handlers.register(NAMESPACE, "fail", |input: Bytes| async move {
        let reason = String::from_utf8_lossy(&input);
        let message = if reason.is_empty() {
            "requested failure".to_string()
        } else {
            reason.into_owned()
        };
        Err::<Bytes, HandlerError>(message.into())
    });
    handlers.register_stateful(NAMESPACE, "whoami", |id, _| async move {
        Ok::<_, HandlerError>(Bytes::from(id))
    });
    handlers.register_streaming(NAMESPACE, "stream", |stream: Stream| async move {
        respond(&stream, STATUS_OK, Bytes::new(), false)?;
        while let Some(message) = stream.receive_data().await? {
            stream.send_data(message, false)?;
        }
        stream.close()?;
        Ok::<_, HandlerError>(())
    });
    handlers
}
