//! tern-core: Minimal HTTP/1.1 text-protocol server
//!
//! Accepts TCP connections, frames and parses one request at a time,
//! matches the path against registered patterns (see `tern-router`) and
//! hands the request to the bound handler. Handlers write their own
//! response and close the connection; unmatched or unparseable requests
//! just get the connection closed.
//!
//! ## Example
//! ```no_run
//! use tern_core::{handler, Request, Response, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> tern_core::Result<()> {
//!     let server = Server::bind(ServerConfig::new().port(8080))?;
//!     server.register("/users/{id}", handler(|req: Request| async move {
//!         let body = format!("user {}", req.param("id").unwrap_or_default());
//!         let _ = req.conn.write_all(&Response::html(body).to_http1_bytes()).await;
//!         let _ = req.conn.close().await;
//!     }));
//!     server.serve().await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod conn;
pub mod error;
pub mod logging;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;

// Re-exports
pub use config::ServerConfig;
pub use conn::Conn;
pub use error::{Error, Result};
pub use parser::{parse_request, FrameState, ParsedRequest, RequestFramer};
pub use request::{QueryParams, Request};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use server::{create_optimized_socket, handler, serve_connection, Handler, Server, ServerState};
pub use tern_router::{Match, Mismatch, Pattern, PrefixPolicy, Router};
