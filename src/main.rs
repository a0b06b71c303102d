use std::net::SocketAddr;

use anyhow::Context;
use contacts_api::{
    config::AppConfig,
    db::connection,
    logging::init_tracing,
    routes::app,
    services::{
        ServiceContext,
        avatar::LocalAvatarStorage,
        mail::{MailQueue, mailer_from_config},
    },
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        eprintln!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.logging);

    let stores = connection::connect(&cfg.database).await?;
    let mail = MailQueue::spawn(mailer_from_config(&cfg.mail)?, &cfg.mail);
    let avatars = std::sync::Arc::new(LocalAvatarStorage::new(&cfg.avatar));

    let state = AppState::new(cfg, stores, mail, avatars);
    match state.config.admin_seed() {
        Some((email, password)) => {
            ServiceContext::from_state(&state)
                .auth()
                .seed_admin(email, password)
                .await?
        }
        None => tracing::info!("no admin credentials configured, skipping admin seed"),
    }

    let addr: SocketAddr = format!("{}:{}", state.config.general.host, state.config.general.port)
        .parse()
        .context("invalid host/port")?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
