// Small demo server showing route registration and the HTML response helper

use mimalloc::MiMalloc;
use tern_core::{handler, logging, Request, Response, Server, ServerConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

async fn reply(req: Request, body: String) {
    if let Err(e) = req.conn.write_all(&Response::html(body).to_http1_bytes()).await {
        tracing::debug!(error = %e, "write failed");
    }
    let _ = req.conn.close().await;
}

/// Escape text for interpolation into HTML
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.hostname,
        port = config.port,
        workers = config.workers,
        prefix_policy = ?config.prefix_policy,
        "tern-demo starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server = Server::bind(config)?;

        server.register(
            "/hello/{name}",
            handler(|req: Request| async move {
                let body = format!(
                    "<h1>Hello, {}!</h1>",
                    escape_html(req.param("name").unwrap_or("stranger"))
                );
                reply(req, body).await;
            }),
        );
        server.register(
            "/files/v{id}",
            handler(|req: Request| async move {
                let body = format!(
                    "<p>file version {}</p>",
                    escape_html(req.param("id").unwrap_or_default())
                );
                reply(req, body).await;
            }),
        );
        server.register(
            "/echo",
            handler(|req: Request| async move {
                let body = escape_html(&String::from_utf8_lossy(&req.body));
                reply(req, body).await;
            }),
        );
        // "/" has two empty segments, so it accepts any single-segment path;
        // registered last so the routes above are tried first
        server.register(
            "/",
            handler(|req: Request| async move {
                reply(req, "<h1>tern</h1>".to_string()).await;
            }),
        );

        server.serve().await
    })?;

    Ok(())
}
