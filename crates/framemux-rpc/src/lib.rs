//! Path-routed RPC over framemux streams.
//!
//! [`Invoker`] issues calls: each call opens a stream whose first HEADERS
//! frame carries `:path` (`/namespace/operation` or
//! `/namespace/id/operation`). [`Handlers`] answers them: the reply's
//! HEADERS frame carries `:status` (200, 404 or 500) and the DATA frame the
//! output or error message.

pub mod config;
pub mod error;
pub mod handlers;
pub mod invoker;
pub mod path;
pub mod response;

pub use config::{InvokerConfig, DEFAULT_BASE_PATH};
pub use error::{HandlerError, Result, RpcError};
pub use handlers::{respond, Handlers, Route};
pub use invoker::Invoker;
pub use path::OperationPath;
pub use response::{status_of, Response, STATUS_INTERNAL, STATUS_NOT_FOUND, STATUS_OK};
