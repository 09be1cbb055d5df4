use std::{net::SocketAddr, sync::Arc, time::Duration};

use api::{serve, App};
use color_eyre::Result;
use installation::read_installation;
use log::{debug, info, warn};

use crate::settings::{read_settings, Settings};

mod api;
mod dispatch;
mod feature;
mod installation;
mod protocols;
mod settings;
mod wled;

fn init_logging(settings: &Settings) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.parse_filters(settings.server.log_level.as_deref().unwrap_or("info"));

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();
}

fn log_installation(app: &App) {
    info!(
        "Loaded '{}': {} controllers, {} features",
        app.installation.name,
        app.installation.controllers.len(),
        app.dispatcher.registry().len()
    );

    if app.dispatcher.registry().is_empty() {
        warn!("No usable features in '{}'", app.installation.name);
    }

    for client in app.dispatcher.controllers().iter() {
        debug!("Controller '{}' ({}): {} segments", client.key, client.name, client.segments);
    }

    for feature in app.dispatcher.registry().features() {
        debug!(
            "Feature '{}' ({}) group={:?} color={:?} -> {:?}",
            feature.key,
            feature.name,
            feature.group,
            feature.color,
            feature.targets()
        );
    }
}

/// Logs one line per controller so offline hardware is obvious at startup.
async fn log_connectivity(app: &App) {
    let controllers = app.dispatcher.controllers();
    let report = controllers.ping_all().await;

    for (key, status) in report {
        let name = controllers.get(&key).map(|client| client.name.as_str()).unwrap_or_default();

        if status.online {
            info!(
                "Controller '{}' ({}) online, version {}",
                key,
                name,
                status.version.as_deref().unwrap_or("unknown")
            );
        } else {
            warn!(
                "Controller '{}' ({}) offline: {}",
                key,
                name,
                status.error.as_deref().unwrap_or("no response")
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = read_settings()?;
    init_logging(&settings);

    let installation = read_installation(&settings.installation.path)?;
    let timeout = Duration::from_millis(settings.installation.request_timeout_ms);
    let app = Arc::new(App::new(installation, timeout));

    log_installation(&app);
    log_connectivity(&app).await;

    let addr: SocketAddr = format!("{}:{}", settings.server.bind, settings.server.port).parse()?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {:?}", e);
        }
    };

    serve(app, addr, shutdown).await
}
