mod aggregate;
mod config;
mod dispatch;
mod store;
mod user;
mod version;
mod weather;
mod wechat;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;
use wxnotify_core::{ColorPolicy, clock::now_in};

use crate::{
    aggregate::Aggregator,
    config::{Config, open_config, write_default_config},
    dispatch::{send_all, send_feedback},
    store::open_store,
    user::Recipient,
    version::short_version,
    weather::QWeatherClient,
    wechat::WechatClient,
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    init: bool,

    /// 集計結果をログに出すだけで送信・書き戻しを行わない
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.init {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    info!(version = short_version(), "wxnotify version");

    let mut config = open_config(&args.config).context("Failed to load configuration")?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    info!(timezone = %config.timezone, collection = %config.collection, "Configuration loaded");

    run(config, args.dry_run).await
}

/// 1 回分の集計と送信を行う。
async fn run(config: Config, dry_run: bool) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(config.http.timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let weather = QWeatherClient::new(http.clone(), &config.weather);
    let wechat = WechatClient::new(http.clone(), &config.wechat);
    let store = open_store(&config.store, http).context("Failed to open document store")?;
    let colors = ColorPolicy::new(config.show_color);

    let now = now_in(config.timezone);
    info!(now = %now.format("%Y-%m-%d %H:%M:%S"), "Starting run");

    let aggregator = Aggregator::new(&weather, store.as_ref(), colors, &config.collection);
    let aggregator = if dry_run { aggregator.dry_run() } else { aggregator };
    let users = aggregator.aggregate(&now).await?;

    let recipients: Vec<Recipient> = users.iter().map(Recipient::from).collect();

    if dry_run {
        for recipient in &recipients {
            info!(user = %recipient.id, fields = ?recipient.fields, "Dry run; not sending");
        }
        return Ok(());
    }

    let summary = send_all(&wechat, &recipients, None, None).await;
    info!(
        need = summary.need_post_num,
        success = summary.success_post_num,
        fail = summary.fail_post_num,
        success_ids = %summary.success_post_ids,
        fail_ids = %summary.fail_post_ids,
        "Finished sending messages"
    );

    send_feedback(
        &wechat,
        config.feedback.as_ref(),
        &summary,
        &recipients,
        &now,
        &colors,
    )
    .await;

    Ok(())
}
