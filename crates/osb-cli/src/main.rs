//! Example osb client.
//!
//! Starts a cloud browser session pointed at a web page, opens the UI
//! stream, and simulates remote-control navigation in a loop until
//! interrupted with Ctrl-C.

#![deny(unsafe_code)]

mod stub;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use osb_client::{keys, ui, ClientConfig, InputEvent, SessionRegistry, SessionStartOptions};

use crate::stub::StubListener;

const DELAY_BETWEEN_KEYS: Duration = Duration::from_millis(500);
const DELAY_TO_VIEW: Duration = Duration::from_secs(2);

/// osb example client.
#[derive(Parser, Debug)]
#[command(name = "osb-cli", about = "Run a cloud browser session until interrupted")]
struct Cli {
    /// The server IP or host name.
    #[arg(long, default_value = "localhost")]
    ip: String,

    /// The server port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// The web address of the page to be loaded.
    #[arg(long, default_value = "https://www.youtube.com/tv?env_mediaSourceDevelopment=1")]
    url: String,

    /// UI stream format to pull.
    #[arg(long, default_value = ui::UI_FMT_JPEG_ALPHA_PNG)]
    format: String,

    /// UI stream bitrate in kbps.
    #[arg(long, default_value_t = 1000)]
    bitrate: u32,
}

impl Cli {
    /// `proto://host[:port]`, defaulting the scheme from well-known ports.
    fn server_base(&self) -> String {
        match self.port {
            80 => format!("http://{}", self.ip),
            443 => format!("https://{}", self.ip),
            port => format!("http://{}:{port}", self.ip),
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_subscriber();
    let cli = Cli::parse();
    let server_base = cli.server_base();

    let registry = SessionRegistry::new(ClientConfig::default());
    let session = registry
        .start(
            SessionStartOptions::new(&server_base, &cli.url)
                .pull_mode(true)
                .video_passthru(true)
                .size(1280, 720)
                .listener(Arc::new(StubListener::new())),
        )
        .await
        .context("failed to start session")?;
    println!("New session: {}", session.session_id());

    session
        .ui_stream_start(&cli.format, false, Some(cli.bitrate))
        .await
        .context("failed to start UI stream")?;

    // Simulate a user navigating with the remote until Ctrl-C.
    let nav_session = Arc::clone(&session);
    let navigation = tokio::spawn(async move {
        loop {
            for code in [keys::KEY_RIGHT, keys::KEY_DOWN, keys::KEY_UP, keys::KEY_LEFT] {
                if let Err(err) = nav_session
                    .send_event(InputEvent::Key {
                        code,
                        char_code: None,
                    })
                    .await
                {
                    warn!(%err, "failed to send key event");
                }
                tokio::time::sleep(DELAY_BETWEEN_KEYS).await;
            }
            tokio::time::sleep(DELAY_TO_VIEW).await;
        }
    });

    info!(session_id = session.session_id(), "running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    println!("Exiting...");

    navigation.abort();
    registry
        .stop(&session)
        .await
        .context("failed to stop session")?;
    println!("Done");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_base_uses_scheme_defaults() {
        let cli = Cli::parse_from(["osb-cli", "--ip", "box", "--port", "80"]);
        assert_eq!(cli.server_base(), "http://box");

        let cli = Cli::parse_from(["osb-cli", "--ip", "box", "--port", "443"]);
        assert_eq!(cli.server_base(), "https://box");

        let cli = Cli::parse_from(["osb-cli", "--ip", "box", "--port", "8080"]);
        assert_eq!(cli.server_base(), "http://box:8080");
    }

    #[test]
    fn defaults_match_the_appliance() {
        let cli = Cli::parse_from(["osb-cli"]);
        assert_eq!(cli.ip, "localhost");
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.format, ui::UI_FMT_JPEG_ALPHA_PNG);
    }
}
