use std::path::PathBuf;

use {
    anyhow::{Context, Result},
    clap::{Parser, ValueEnum},
    tracing::{info, warn},
    tracing_subscriber::EnvFilter,
};

/// Forward proxy that rewrites HTML so every reference loads back through it.
#[derive(Parser, Debug)]
#[command(name = "wayfarer", version)]
struct Args {
    /// Config file. Defaults to ./wayfarer.toml, then the user config dir.
    #[arg(long, short, env = "WAYFARER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to (overrides `server.bind`).
    #[arg(long, env = "WAYFARER_BIND")]
    bind: Option<String>,

    /// Port to listen on (overrides `server.port`).
    #[arg(long, short, env = "WAYFARER_PORT")]
    port: Option<u16>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "WAYFARER_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut config =
        wayfarer_config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    wayfarer_gateway::start_proxy(&config, shutdown_signal()).await
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse() {
        let args = Args::try_parse_from([
            "wayfarer",
            "--config",
            "/etc/wayfarer.toml",
            "--bind",
            "0.0.0.0",
            "--port",
            "9000",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/wayfarer.toml")));
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Args::try_parse_from(["wayfarer", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn args_are_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
