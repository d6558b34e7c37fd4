use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::path::Path;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use super::Cli;
use crate::config::{Config, LoggingConfig};
use crate::proxy::NewsProxy;
use crate::server;

/// Run the proxy server
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let proxy = NewsProxy::from_config(&config).context("Failed to build news proxy")?;

    info!(
        upstream = %config.upstream.base_url,
        feed_ttl = config.upstream.feed_ttl,
        article_ttl = config.article.cache_ttl,
        "starting newsproxy"
    );

    server::start_server(&config.server, proxy)
        .await
        .context("Server terminated with an error")
}

/// Extract a single article without starting the server
pub async fn extract(config: &Config, url: &str) -> Result<()> {
    let proxy = NewsProxy::from_config(config).context("Failed to build news proxy")?;

    let article = proxy
        .fetch_full_article(url)
        .await
        .with_context(|| format!("Failed to extract {}", url))?;

    println!("{}", serde_json::to_string_pretty(&article)?);
    Ok(())
}

/// Generate shell completions
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let cmd_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, cmd_name, &mut std::io::stdout());
}

/// Initialize logging from configuration and verbosity flags.
///
/// `--debug` and `--verbose` win over `RUST_LOG`, which wins over the
/// configured level. The returned guard must outlive the program when
/// file logging is enabled.
pub fn init_logging(config: &LoggingConfig, debug: bool, verbose: bool) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .context("Invalid log level")?
    };

    let stdout_layer = if config.json_format {
        fmt::layer().json().boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_file(debug)
            .with_line_number(debug)
            .boxed()
    };

    let (file_layer, guard) = if config.log_to_file {
        let path = Path::new(&config.log_file);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let file_name = path.file_name().context("Log file path has no file name")?;

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Logging already initialized")?;

    debug!("Logging initialized");
    Ok(guard)
}
