use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use gemgate::bridge::{run_with_config, BridgeConfig};

fn parse_port_env(name: &str) -> Option<u16> {
    match std::env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return Some(args[i + 1].clone());
            }
        i += 1;
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Flags win over environment, environment over defaults.
    let http_port = parse_flag(&args, "--port")
        .and_then(|v| v.parse::<u16>().ok())
        .or_else(|| parse_port_env("GEMGATE_HTTP_PORT"))
        .unwrap_or(7878);
    let backend_base = parse_flag(&args, "--backend-url")
        .or_else(|| std::env::var("GEMGATE_BACKEND_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    // An explicitly empty backend command disables the spawn entirely.
    let backend_cmd = match parse_flag(&args, "--backend-cmd").or_else(|| std::env::var("GEMGATE_BACKEND_CMD").ok()) {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v),
        None => Some("uvicorn main:app --host 127.0.0.1 --port 8000".to_string()),
    };

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "gemgate",
        "gemgate starting: RUST_LOG='{}', http_port={}, backend_base='{}', backend_cmd={:?}",
        rust_log, http_port, backend_base, backend_cmd
    );

    run_with_config(BridgeConfig { http_port, backend_base, backend_cmd }).await
}
