mod config;
mod handlers;
mod scheduler;
mod state;

use std::sync::Arc;

use anyhow::Result;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::{dptree, prelude::*};
use tracing::info;

use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = Config::from_env()?;

    info!("admin ids: {:?}", cfg.admins);
    info!("forwarding from source channels: {:?}", cfg.source_channels);
    if let Some(footer) = &cfg.forward_footer {
        info!("using custom forward footer: {footer}");
    }
    if cfg.welcome_message.is_some() {
        info!("welcome message feature is enabled");
    }
    if !cfg.blacklist.is_empty() {
        info!("blacklist active, keywords: {:?}", cfg.blacklist);
    }
    if cfg.promo_messages.is_empty() {
        tracing::warn!("PROMO_MESSAGES is empty, scheduled ad posts will be skipped");
    }

    let bot = Bot::new(cfg.token.clone());
    let state = Arc::new(AppState::new(cfg));
    let scheduler = Arc::new(Scheduler::new());

    {
        let bot = bot.clone();
        let state = state.clone();
        scheduler.schedule_repeating(
            state.config.ad_first_delay,
            state.config.ad_interval,
            move || handlers::post_promo(bot.clone(), state.clone()),
        );
    }

    info!("starting dispatcher");
    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![state, scheduler.clone()])
        .default_handler(|upd| async move {
            let _ = upd;
        })
        .error_handler(LoggingErrorHandler::with_custom_text("update handler error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.shutdown();
    Ok(())
}
