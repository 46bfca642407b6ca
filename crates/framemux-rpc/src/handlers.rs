use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use framemux_conn::{Connection, Stream};
use framemux_frame::{Metadata, PATH, STATUS};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::config::DEFAULT_BASE_PATH;
use crate::error::{HandlerError, Result};
use crate::path::{route_key, OperationPath};
use crate::response::{STATUS_INTERNAL, STATUS_NOT_FOUND, STATUS_OK};

type HandlerResult<T> = std::result::Result<T, HandlerError>;

pub type UnaryHandler = Arc<dyn Fn(Bytes) -> BoxFuture<'static, HandlerResult<Bytes>> + Send + Sync>;
pub type StatefulHandler =
    Arc<dyn Fn(String, Bytes) -> BoxFuture<'static, HandlerResult<Bytes>> + Send + Sync>;
pub type StreamingHandler =
    Arc<dyn Fn(Stream) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

/// How a registered operation is served. Fixed at registration time.
#[derive(Clone)]
pub enum Route {
    /// One request payload in, one response payload out.
    Unary(UnaryHandler),
    /// Like `Unary`, addressed to one entity via `namespace/id/operation`.
    Stateful(StatefulHandler),
    /// The handler owns the open stream and answers with [`respond`].
    Streaming(StreamingHandler),
}

/// Server side of the RPC layer: routes peer-initiated streams by `:path`.
pub struct Handlers {
    base_path: String,
    routes: HashMap<String, Route>,
    stateful_routes: HashMap<String, Route>,
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl Handlers {
    pub fn new() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            routes: HashMap::new(),
            stateful_routes: HashMap::new(),
        }
    }

    /// Expect paths under `base_path` instead of `/`.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn register<F, Fut>(&mut self, namespace: &str, operation: &str, handler: F)
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Bytes>> + Send + 'static,
    {
        let handler: UnaryHandler = Arc::new(move |input| handler(input).boxed());
        self.routes
            .insert(route_key(namespace, operation), Route::Unary(handler));
    }

    /// Register an operation whose handler also receives the entity id.
    pub fn register_stateful<F, Fut>(&mut self, namespace: &str, operation: &str, handler: F)
    where
        F: Fn(String, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Bytes>> + Send + 'static,
    {
        let handler: StatefulHandler = Arc::new(move |id, input| handler(id, input).boxed());
        self.stateful_routes
            .insert(route_key(namespace, operation), Route::Stateful(handler));
    }

    /// Register an operation that keeps the stream open for many messages.
    pub fn register_streaming<F, Fut>(&mut self, namespace: &str, operation: &str, handler: F)
    where
        F: Fn(Stream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        let handler: StreamingHandler = Arc::new(move |stream| handler(stream).boxed());
        self.routes
            .insert(route_key(namespace, operation), Route::Streaming(handler));
    }

    /// Registered route keys, sorted.
    pub fn operations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .routes
            .keys()
            .cloned()
            .chain(self.stateful_routes.keys().cloned())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Find the route for a parsed path.
    pub fn lookup(&self, path: &OperationPath) -> Option<&Route> {
        let table = match path.entity_id {
            Some(_) => &self.stateful_routes,
            None => &self.routes,
        };
        table.get(&path.route_key())
    }

    /// Install these handlers as `conn`'s new-stream handler.
    pub fn attach(self: &Arc<Self>, conn: &Connection) {
        let handlers = Arc::clone(self);
        conn.set_handler(move |stream: Stream| {
            let handlers = Arc::clone(&handlers);
            // Read before the task is spawned, while the opening HEADERS
            // is still the latest one applied.
            let metadata = stream.metadata();
            async move { handlers.dispatch_with(stream, metadata).await }
        });
    }

    /// Serve one peer-initiated stream to completion.
    ///
    /// Failures are answered on the stream itself; nothing escapes to the
    /// connection.
    pub async fn dispatch(&self, stream: Stream) {
        let metadata = stream.metadata();
        self.dispatch_with(stream, metadata).await
    }

    async fn dispatch_with(&self, stream: Stream, metadata: Metadata) {
        if let Err(err) = self.serve(&stream, &metadata).await {
            warn!(stream_id = stream.stream_id(), error = %err, "dispatch failed");
        }
    }

    async fn serve(&self, stream: &Stream, metadata: &Metadata) -> Result<()> {
        let raw_path = metadata.scalar(PATH).unwrap_or_default();
        let target = OperationPath::parse(raw_path, &self.base_path)
            .and_then(|path| self.lookup(&path).map(|route| (path, route.clone())));

        let Some((path, route)) = target else {
            debug!(stream_id = stream.stream_id(), path = raw_path, "no handler");
            respond(stream, STATUS_NOT_FOUND, Bytes::new(), true)?;
            return Ok(());
        };

        let outcome = match route {
            Route::Streaming(handler) => {
                let result = handler(stream.clone()).await;
                if let Err(err) = result {
                    warn!(stream_id = stream.stream_id(), path = raw_path, error = %err, "streaming handler failed");
                    if !stream.is_self_closed() {
                        respond(stream, STATUS_INTERNAL, err.to_string(), true)?;
                    }
                }
                return Ok(());
            }
            Route::Unary(handler) => handler(receive_input(stream).await?).await,
            Route::Stateful(handler) => {
                let id = path.entity_id.unwrap_or_default();
                handler(id, receive_input(stream).await?).await
            }
        };

        match outcome {
            Ok(output) => {
                debug!(stream_id = stream.stream_id(), path = raw_path, status = STATUS_OK, "handled");
                respond(stream, STATUS_OK, output, true)?;
            }
            Err(err) => {
                warn!(stream_id = stream.stream_id(), path = raw_path, error = %err, "handler failed");
                respond(stream, STATUS_INTERNAL, err.to_string(), true)?;
            }
        }
        Ok(())
    }
}

async fn receive_input(stream: &Stream) -> Result<Bytes> {
    Ok(stream.receive_data().await?.unwrap_or_default())
}

/// Answer on `stream` with `status` and an optional payload.
///
/// With `end`, the reply is a complete unary response and the local half
/// closes. Without it, further [`Stream::send_data`] calls may follow.
pub fn respond(stream: &Stream, status: u16, payload: impl Into<Bytes>, end: bool) -> Result<()> {
    let metadata = Metadata::new().with(STATUS, status.to_string());
    let payload = payload.into();
    if end {
        stream.send_unary(&metadata, payload)?;
        return Ok(());
    }
    stream.send_metadata(&metadata, false)?;
    if !payload.is_empty() {
        stream.send_data(payload, false)?;
    }
    Ok(())
}
