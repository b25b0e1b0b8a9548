use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, trace};
use realm_panel::auth::{PasswordVerifier, SessionStore};
use realm_panel::cli::PanelArguments;
use realm_panel::config::ConfigStore;
use realm_panel::http::{self, AppState};
use realm_panel::rules::RuleService;
use realm_panel::service::ServiceControl;
use realm_panel::settings::PanelSettings;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = PanelArguments::parse();
    pretty_env_logger::env_logger::builder()
        .format_timestamp(None)
        .filter_level(if args.verbose { LevelFilter::Trace } else { LevelFilter::Info })
        .init();

    trace!("Arguments: {:#?}", args);
    if let Err(e) = run(args).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: PanelArguments) -> Result<()> {
    if args.handle_arguments().await? {
        return Ok(());
    }

    info!("Starting realm-panel");

    let store = Arc::new(ConfigStore::load(&args.config_path).await.context("Failed to load the realm daemon config")?);
    if args.watch_config {
        store.clone().watch_config_file()?;
    }

    let mut settings = PanelSettings::load(&args.settings_path).await.context("Failed to load the panel settings")?;
    settings.ensure_session_key().await?;
    settings.validate()?;

    let verifier = PasswordVerifier::from_configured(&settings.auth.password)?;
    let sessions = SessionStore::new(settings.session_key_bytes(), settings.https.enabled)?;

    let state = AppState {
        rules: RuleService::new(store),
        service: ServiceControl::new(args.systemctl.clone(), args.unit.clone(), Duration::from_secs(args.service_timeout)),
        verifier,
        templates_dir: args.templates_dir.clone(),
        static_dir: args.static_dir.clone(),
        https_enabled: settings.https.enabled,
        https_port: settings.port(),
    };

    http::run(state, sessions, &settings).await
}
