//! Native server implementation
//!
//! - One tokio task per accepted connection
//! - Route table behind a reader/writer lock: shared for matching,
//!   exclusive for registration
//! - SO_REUSEPORT and TCP_NODELAY on the listening socket

use crate::conn::Conn;
use crate::parser::{parse_request, RequestFramer};
use crate::{Error, Request, Result, ServerConfig};
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tern_router::{Pattern, PrefixPolicy, Router};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpListener;

/// Route handler type
///
/// Handlers own the response: they write to `req.conn` and close it. The
/// server sends nothing on their behalf.
pub type Handler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure as a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Patterns plus the handlers bound to them
///
/// The router only knows handler IDs; the handler itself is looked up
/// separately once a pattern has matched.
#[derive(Default)]
struct RouteTable {
    router: Router,
    handlers: HashMap<u32, Handler>,
    next_id: u32,
}

/// Server state shared across all connections
pub struct ServerState {
    routes: RwLock<RouteTable>,
}

impl ServerState {
    pub fn new(policy: PrefixPolicy) -> Self {
        Self {
            routes: RwLock::new(RouteTable {
                router: Router::with_policy(policy),
                ..RouteTable::default()
            }),
        }
    }

    /// Bind `handler` to `pattern`, replacing any handler already bound to
    /// the exact same pattern string
    pub fn register(&self, pattern: &str, handler: Handler) {
        let mut routes = self.routes.write();
        let id = match routes.router.lookup(pattern) {
            Some(id) => id,
            None => {
                let id = routes.next_id;
                routes.next_id += 1;
                routes.router.insert(pattern, id);
                id
            }
        };
        routes.handlers.insert(id, handler);
        tracing::debug!(pattern, id, "route registered");
    }

    /// Drop the handler bound to `pattern` but keep the pattern in the
    /// table. Paths it matches then resolve to nothing, even if a later
    /// pattern would also match them.
    pub fn unbind(&self, pattern: &str) -> bool {
        let mut routes = self.routes.write();
        match routes.router.lookup(pattern) {
            Some(id) => routes.handlers.remove(&id).is_some(),
            None => false,
        }
    }

    /// Remove `pattern` and its handler entirely
    pub fn deregister(&self, pattern: &str) -> bool {
        let mut routes = self.routes.write();
        match routes.router.remove(pattern) {
            Some(id) => {
                routes.handlers.remove(&id);
                true
            }
            None => false,
        }
    }

    /// Resolve a path to its handler and captured parameters
    ///
    /// The first matching pattern wins unconditionally: if it has no handler
    /// bound, resolution fails rather than trying other patterns.
    pub fn resolve(&self, path: &str) -> Result<(Handler, HashMap<String, String>)> {
        let routes = self.routes.read();
        let matched = routes
            .router
            .find(path)
            .ok_or_else(|| Error::NoRouteMatch(path.to_string()))?;

        match routes.handlers.get(&matched.handler_id) {
            Some(handler) => Ok((handler.clone(), matched.params_map())),
            None => {
                tracing::debug!(pattern = %matched.pattern, path, "matched pattern has no handler");
                Err(Error::NoRouteMatch(path.to_string()))
            }
        }
    }

    /// Check a single pattern against a path with this table's prefix policy
    pub fn check_route(&self, pattern: &str, path: &str) -> Result<HashMap<String, String>> {
        let policy = self.routes.read().router.policy();
        Pattern::parse(pattern)
            .match_path(path, policy)
            .map(|params| params.into_iter().collect())
            .map_err(|m| Error::from_mismatch(m, path))
    }

    /// Registered patterns in match order
    pub fn patterns(&self) -> Vec<String> {
        self.routes.read().router.patterns().map(str::to_string).collect()
    }

    /// Route a request and run its handler, or close the connection when
    /// nothing matches
    pub async fn dispatch(&self, mut req: Request) {
        // The read guard is released before any await
        let resolved = self.resolve(&req.path);

        match resolved {
            Ok((handler, params)) => {
                req.params = params;
                handler(req).await;
            }
            Err(e) => {
                tracing::debug!(method = %req.method, path = %req.path, error = %e, "no route");
                if let Err(e) = req.conn.close().await {
                    tracing::debug!(error = %e, "close after no route failed");
                }
            }
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(PrefixPolicy::default())
    }
}

/// Drive one connection until it closes or sends something unparseable
///
/// Reads are collected into frames; each frame is parsed and dispatched in
/// turn. The connection is closed on every exit path.
pub async fn serve_connection<R>(state: &ServerState, mut reader: R, conn: Conn, config: &ServerConfig)
where
    R: AsyncRead + Unpin,
{
    let mut framer = RequestFramer::new(config.max_request_size);
    let mut buf = vec![0u8; config.read_buffer_size];
    let peer = conn.peer_addr();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                if framer.buffered() > 0 {
                    tracing::debug!(?peer, buffered = framer.buffered(), "eof inside request");
                }
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(?peer, error = %e, "read failed");
                break;
            }
        };

        let frame = match framer.feed(&buf[..n]) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(?peer, error = %e, "dropping connection");
                break;
            }
        };

        let parsed = match parse_request(&frame) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(?peer, error = %e, "bad request");
                break;
            }
        };

        tracing::trace!(?peer, method = %parsed.method, path = %parsed.path, "request");
        state.dispatch(Request::from_parsed(parsed, conn.clone())).await;

        if conn.is_closed() {
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(?peer, error = %e, "close failed");
    }
}

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // SO_REUSEPORT - enable kernel load balancing across processes
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // TCP_NODELAY - accepted sockets inherit it on most platforms
    socket.set_nodelay(true)?;

    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Listening server
pub struct Server {
    config: Arc<ServerConfig>,
    state: Arc<ServerState>,
    listener: TcpListener,
}

impl Server {
    /// Bind the listening socket. Must be called inside a tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.addr()?;
        let socket = create_optimized_socket(&addr)?;
        let listener = TcpListener::from_std(socket.into())?;

        tracing::info!(address = %listener.local_addr()?, "listening");

        Ok(Self {
            state: Arc::new(ServerState::new(config.prefix_policy)),
            config: Arc::new(config),
            listener,
        })
    }

    /// Shared route state; registrations through it are visible to live
    /// connections immediately
    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    pub fn register(&self, pattern: &str, handler: Handler) {
        self.state.register(pattern, handler);
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task each. Accept errors are logged
    /// and skipped.
    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let state = self.state.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection opened");
                let (reader, writer) = stream.into_split();
                serve_connection(&state, reader, Conn::new(writer, Some(peer)), &config).await;
                tracing::debug!(%peer, "connection finished");
            });
        }
    }
}
