//! # tabrelay
//!
//! Relay server binary: loads settings, installs logging and metrics, and
//! serves the browser WebSocket plus the HTTP command surface until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tabrelay_core::logging::{LogFormat, init_subscriber};
use tabrelay_server::{RelayServer, ServerConfig};
use tabrelay_settings::RelaySettings;

/// Time allowed for in-flight work to wind down after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run JavaScript in an open browser tab over a local relay.
#[derive(Parser, Debug)]
#[command(name = "tabrelay", about = "Browser tab relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.tabrelay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(tabrelay_settings::settings_path)
    }

    /// Apply flag overrides on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn log_format(settings: &RelaySettings) -> LogFormat {
    if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings_path();
    let mut settings = tabrelay_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);
    tabrelay_settings::validate(&settings).context("Invalid settings after CLI overrides")?;

    init_subscriber(&settings.logging.level, log_format(&settings));
    tracing::debug!(path = %settings_path.display(), "settings loaded");

    let mut server = RelayServer::new(ServerConfig::from_settings(&settings));
    match tabrelay_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed, /metrics disabled"),
    }

    let handle = server.start().await.context("Failed to start server")?;
    let addr = handle.local_addr();
    tracing::info!("tabrelay listening on http://{addr} (browser socket ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    handle.shutdown(Some(SHUTDOWN_TIMEOUT)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_leaves_settings_untouched() {
        let cli = Cli::parse_from(["tabrelay"]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, RelaySettings::default().server.host);
        assert_eq!(settings.server.port, RelaySettings::default().server.port);
        assert!(!settings.logging.json);
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "tabrelay",
            "--host",
            "0.0.0.0",
            "--port",
            "9001",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(log_format(&settings), LogFormat::Json);
    }

    #[test]
    fn explicit_settings_path_wins() {
        let cli = Cli::parse_from(["tabrelay", "--settings", "/tmp/relay.json"]);
        assert_eq!(cli.settings_path(), PathBuf::from("/tmp/relay.json"));
    }

    #[test]
    fn default_settings_path_under_home() {
        let cli = Cli::parse_from(["tabrelay"]);
        assert!(cli.settings_path().ends_with(".tabrelay/settings.json"));
    }

    #[test]
    fn settings_file_feeds_server_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 7777}}"#).unwrap();

        let cli = Cli::parse_from(["tabrelay", "--settings", path.to_str().unwrap()]);
        let mut settings = tabrelay_settings::load_settings_from_path(&cli.settings_path()).unwrap();
        cli.apply(&mut settings);
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.port, 7777);
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Cli::try_parse_from(["tabrelay", "--port", "70000"]).is_err());
    }
}
