#![deny(clippy::all, clippy::cargo)]
#![warn(clippy::nursery, clippy::pedantic)]
#![allow(clippy::cargo_common_metadata, clippy::multiple_crate_versions)]

use std::sync::Arc;

use anyhow::anyhow;
use config::{AppConfig, FromEnv, ViewerConfig};
use domain::models::PlayerId;
use infra_async_store::{PlayerWithScoresStore, SharedProvider, StatsHistoryStore, StoreRegistry};
use infra_upstream_provider_impl::{
    PlayerWithScores, PlayerWithScoresProvider, StatsHistoryProvider, UpstreamClient,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::environment::{ENV, SENTRY};

mod environment;

type PlayerStores = StoreRegistry<PlayerId, PlayerWithScoresStore<PlayerWithScores>>;
type HistoryStores = StoreRegistry<(), StatsHistoryStore>;

fn player_stores(
    client: &UpstreamClient,
    api_host: &str,
    viewer_config: &ViewerConfig,
) -> Arc<PlayerStores> {
    let client = client.clone();
    let api_host = api_host.to_owned();
    let scores_type = viewer_config.scores_type.clone();
    let scores_page = viewer_config.scores_page;

    // one provider per store, torn down with it
    StoreRegistry::new(move |player_id: &PlayerId| {
        let provider: SharedProvider<PlayerWithScores> =
            Arc::new(PlayerWithScoresProvider::new(client.clone(), api_host.as_str()));
        PlayerWithScoresStore::new(
            provider,
            Some(player_id.clone()),
            &scores_type,
            scores_page,
            None,
        )
    })
}

fn history_stores(client: &UpstreamClient, api_url: &str) -> Arc<HistoryStores> {
    let client = client.clone();
    let api_url = api_url.to_owned();
    StoreRegistry::new(move |_: &()| {
        StatsHistoryStore::new(Arc::new(StatsHistoryProvider::new(
            client.clone(),
            api_url.as_str(),
        )))
    })
}

async fn show_player(
    players: &Arc<PlayerStores>,
    histories: &Arc<HistoryStores>,
    player_id: PlayerId,
) -> anyhow::Result<()> {
    let player_subscription = players.subscribe(player_id);
    let store = player_subscription.store();

    store
        .subscribe_loading()
        .wait_for(|loading| !*loading)
        .await?;

    if let Some(error) = store.error() {
        return Err(anyhow!("fetching player failed: {error}"));
    }

    let Some(state) = store.state() else {
        tracing::warn!(player_id = %player_subscription.key(), "player not found");
        return Ok(());
    };

    tracing::info!(
        player_id = %state.player.player_id,
        name = state.player.name.as_deref().unwrap_or_default(),
        scores_type = %state.scores_type,
        scores_page = state.scores_page,
        scores = state.scores.len(),
        "player loaded"
    );

    let history_subscription = histories.subscribe(());
    let outcome = history_subscription
        .store()
        .fetch_stats(&state.player)
        .await;
    tracing::info!(?outcome, "stats history fetched");

    if let Some(history) = history_subscription
        .store()
        .history_of(&state.player.player_id)
    {
        for field in history.fields() {
            let latest = history.field(field).and_then(|samples| samples.last().copied().flatten());
            tracing::info!(field, ?latest, "latest sample");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // setup sentry
    // only send sentry events when it's not running locally
    let _sentry_guard = match &SENTRY.dsn {
        Some(dsn) if ENV.environment_name != "local" => {
            let guard = sentry::init((
                dsn.as_str(),
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    traces_sample_rate: 0.1,
                    environment: Some(ENV.environment_name.clone().into()),
                    ..Default::default()
                },
            ));
            sentry::configure_scope(|scope| scope.set_level(Some(sentry::Level::Warning)));
            Some(guard)
        }
        _ => None,
    };

    // initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    let app_config = AppConfig::from_env()?;
    let upstream = &app_config.upstream_config;
    let client = UpstreamClient::try_new(upstream)?;

    let players = player_stores(&client, &upstream.player_api_host, &app_config.viewer_config);
    let histories = history_stores(&client, &upstream.stats_history_api_url);

    show_player(
        &players,
        &histories,
        PlayerId::from(app_config.viewer_config.player_id.clone()),
    )
    .await?;

    tracing::debug!(
        live_player_stores = players.len(),
        live_history_stores = histories.len(),
        "subscriptions released"
    );

    Ok(())
}
