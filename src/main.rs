//! eventsub-tail entry point.
//!
//! Connects to the configured EventSub endpoint and prints every session
//! event as a JSON line until interrupted.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use eventsub_session::config::SessionConfig;
use eventsub_session::service::SessionController;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays machine-readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("tls crypto provider already installed");
    }

    let config = SessionConfig::from_env()?;
    tracing::info!(url = %config.url, "starting eventsub-tail");

    let controller = SessionController::new(SessionConfig {
        connect: false,
        ..config
    });
    let mut events = controller.subscribe();
    controller.connect(None, false);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(error = %err, event = event.name(), "failed to encode event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event consumer lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.shutdown().await;
    Ok(())
}
