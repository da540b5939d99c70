//! # confide-relay
//!
//! Confide relay binary: loads settings, starts the HTTP/WebSocket server,
//! and shuts down cleanly on Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use confide_logging::LogFormat;
use confide_server::config::ServerConfig;
use confide_server::server::ConfideServer;
use confide_settings::ConfideSettings;

/// Anonymous confessor/listener chat relay.
#[derive(Parser, Debug)]
#[command(name = "confide-relay", about = "Anonymous confessor/listener chat relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.confide/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the built web client.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Allowed CORS origin. Repeat for several; none allows any origin.
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Log line format: `compact` or `json`.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Load settings from the chosen file, then layer flags on top.
    fn resolve_settings(&self) -> Result<ConfideSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(confide_settings::settings_path);
        let mut settings = confide_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut ConfideSettings) {
        let server = &mut settings.server;
        if let Some(host) = &self.host {
            server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            server.static_dir = Some(dir.to_string_lossy().into_owned());
        }
        if !self.cors_origins.is_empty() {
            server.cors_origins.clone_from(&self.cors_origins);
        }
        if let Some(max) = self.max_connections {
            server.max_connections = max;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;

    confide_logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = confide_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let server = ConfideServer::new(config, metrics);

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        max_connections = server.config().max_connections,
        static_dir = ?server.config().static_dir,
        "Confide relay listening on http://{addr}"
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["confide-relay"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.cors_origins.is_empty());

        let mut settings = ConfideSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, ConfideSettings::default());
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "confide-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--static-dir",
            "client/build",
            "--cors-origin",
            "http://localhost:5173",
            "--cors-origin",
            "https://confide.example",
            "--max-connections",
            "50",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ]);
        let mut settings = ConfideSettings::default();
        cli.apply(&mut settings);

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.static_dir.as_deref(), Some("client/build"));
        assert_eq!(
            settings.server.cors_origins,
            vec!["http://localhost:5173", "https://confide.example"]
        );
        assert_eq!(settings.server.max_connections, 50);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        let result = Cli::try_parse_from(["confide-relay", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_settings_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"heartbeatIntervalSecs": 15, "heartbeatTimeoutSecs": 40}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from(["confide-relay", "--config", path.to_str().unwrap()]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.heartbeat_interval_secs, 15);
        assert_eq!(settings.server.heartbeat_timeout_secs, 40);
    }

    #[test]
    fn resolve_settings_rejects_invalid_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cli = Cli::parse_from([
            "confide-relay",
            "--config",
            path.to_str().unwrap(),
            "--max-connections",
            "0",
        ]);
        assert!(cli.resolve_settings().is_err());
    }

    #[test]
    fn resolve_settings_reports_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cli = Cli::parse_from(["confide-relay", "--config", path.to_str().unwrap()]);
        let err = cli.resolve_settings().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load settings"));
    }

    #[tokio::test]
    async fn server_boots_and_answers_health() {
        let config = ServerConfig::default();
        let server = ConfideServer::new(config, confide_server::metrics::detached_handle());
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        server.shutdown().shutdown();
        let _ = handle.await;
    }
}
