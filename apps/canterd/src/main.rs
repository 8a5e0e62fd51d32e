use std::sync::Arc;

use anyhow::Context;
use canterd::datastore::{DataDirector, MemoryRecordSource, RecordSource};
use canterd::infractions::InfractionList;
use canterd::lobby::LobbyDirector;
use canterd::otp::OtpRegistry;
use canterd::race::RaceDirector;
use canterd::rooms::RoomRegistry;
use canterd::{config, net, relay, LobbyProtocol, RaceProtocol};
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,canterd=info".into()),
        )
        .with_target(false)
        .init();

    let config = Arc::new(config::parse_args());

    let infractions = Arc::new(
        InfractionList::load(&config.bans_path)
            .with_context(|| format!("loading ban list {:?}", config.bans_path))?,
    );

    let source = Arc::new(MemoryRecordSource::new());
    seed_accounts(&source);
    let data = Arc::new(DataDirector::new(
        Arc::clone(&source) as Arc<dyn RecordSource>
    ));

    let otp = Arc::new(OtpRegistry::new());
    let rooms = Arc::new(RoomRegistry::new());

    let lobby_listener = TcpListener::bind(config.lobby_bind)
        .await
        .with_context(|| format!("binding the lobby tier on {}", config.lobby_bind))?;
    let race_listener = TcpListener::bind(config.race_bind)
        .await
        .with_context(|| format!("binding the race tier on {}", config.race_bind))?;
    let relay_socket = UdpSocket::bind(config.relay_bind)
        .await
        .with_context(|| format!("binding the p2p relay on {}", config.relay_bind))?;

    info!(addr = %config.lobby_bind, "lobby tier listening");
    info!(addr = %config.race_bind, "race tier listening");
    info!(
        ranch = %format_args!("{}:{}", config.ranch_advert.address, config.ranch_advert.port),
        race = %format_args!("{}:{}", config.race_advert.address, config.race_advert.port),
        messenger = %format_args!("{}:{}", config.messenger_advert.address, config.messenger_advert.port),
        "advertising tiers"
    );

    let (lobby_handle, lobby_events) = net::start::<LobbyProtocol>(lobby_listener, "lobby");
    let lobby = LobbyDirector::new(
        lobby_handle,
        Arc::clone(&config),
        Arc::clone(&data),
        Arc::clone(&otp),
        Arc::clone(&rooms),
        infractions,
    );
    tokio::spawn(lobby.run(lobby_events));

    let (race_handle, race_events) = net::start::<RaceProtocol>(race_listener, "race");
    let race = RaceDirector::new(
        race_handle,
        Arc::clone(&config),
        Arc::clone(&data),
        Arc::clone(&otp),
        Arc::clone(&rooms),
    );
    tokio::spawn(race.run(race_events));

    tokio::spawn(relay::run(relay_socket));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

/// Seed accounts for standalone operation: `CANTER_SEED_USERS` holds
/// comma-separated `name:token[:nickname]` entries. Without a nickname the
/// account goes through the character creator on first login.
fn seed_accounts(source: &MemoryRecordSource) {
    let Ok(raw) = std::env::var("CANTER_SEED_USERS") else {
        return;
    };

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.splitn(3, ':');
        let (Some(name), Some(token)) = (parts.next(), parts.next()) else {
            info!(entry, "skipping malformed seed entry");
            continue;
        };
        match parts.next() {
            Some(nickname) => {
                source.add_user_with_character(name, token, nickname);
            }
            None => source.add_user(name, token),
        }
        info!(user = name, "seeded account");
    }
}
