//! Logging setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_telemetry(json: bool) -> Result<()> {
    let json_layer = json.then(|| fmt::layer().json().with_current_span(true));
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dispersal_cli=debug,dispersal_world=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    info!(json, "Telemetry initialized");
    Ok(())
}
