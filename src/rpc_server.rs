//! Eigo Browser RPC server: JSON-lines control protocol over stdin/stdout,
//! backed by headless surfaces.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"tabs.add", "params":{"url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Browser events are written as they happen: {"event":"tabs_changed", ...}

use std::io::{self, Write};
use std::time::Instant;

use eigo_browser::app::App;
use eigo_browser::rpc_handler::handle_method;
use eigo_browser::surface::headless::HeadlessSurfaceFactory;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn write_line(value: &Value) {
    let mut out = io::stdout().lock();
    if writeln!(out, "{}", value).and_then(|_| out.flush()).is_err() {
        warn!("stdout closed");
    }
}

fn flush_notifications(app: &mut App) {
    for event in app.take_notifications() {
        match serde_json::to_value(&event) {
            Ok(value) => write_line(&value),
            Err(e) => warn!(error = %e, "unserializable event"),
        }
    }
}

fn handle_line(app: &mut App, rate_limiter: &mut RateLimiter, line: &str) {
    let req: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            write_line(&json!({"id": null, "error": format!("parse error: {}", e)}));
            return;
        }
    };

    let id = req.get("id").cloned().unwrap_or(Value::Null);

    if !rate_limiter.check() {
        write_line(&json!({"id": id, "error": "rate limit exceeded"}));
        return;
    }

    let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let params = req.get("params").cloned().unwrap_or(json!({}));

    let response = match handle_method(app, method, &params) {
        Ok(val) => json!({"id": id, "result": val}),
        Err(err) => json!({"id": id, "error": err}),
    };
    write_line(&response);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eigo_browser=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config_path = std::env::args().nth(1);
    let mut app = match App::open(Box::new(HeadlessSurfaceFactory::new()), config_path, None) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    write_line(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    flush_notifications(&mut app);

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => Some(line),
            _ = app.wait_for_work() => None,
        };

        match line {
            Some(Ok(Some(line))) => {
                if !line.trim().is_empty() {
                    handle_line(&mut app, &mut rate_limiter, &line);
                }
            }
            Some(Ok(None)) => break,
            Some(Err(e)) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
            None => {}
        }

        app.pump();
        flush_notifications(&mut app);
    }

    if let Err(e) = app.tab_manager.save_session() {
        warn!(error = %e, "final session save failed");
    }
    info!("stdin closed, exiting");
}
