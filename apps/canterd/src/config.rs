//! Daemon configuration.
//!
//! Environment variables provide the defaults; a small `--flag value`
//! argument loop overrides them. Anything unrecognized prints usage and
//! exits nonzero.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// An `(address, port)` pair a tier advertises to clients.
#[derive(Debug, Clone, Copy)]
pub struct AdvertisedEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl AdvertisedEndpoint {
    /// The address as the protocol carries it.
    pub fn wire_address(&self) -> u32 {
        u32::from(self.address)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub lobby_bind: SocketAddr,
    pub race_bind: SocketAddr,
    pub relay_bind: SocketAddr,
    pub ranch_advert: AdvertisedEndpoint,
    pub race_advert: AdvertisedEndpoint,
    pub messenger_advert: AdvertisedEndpoint,
    pub notice: String,
    pub bans_path: PathBuf,
    /// Grace for racers to load into a race before they are written off.
    pub load_timeout: Duration,
    /// Grace for stragglers to cross the line once the race is finishing.
    pub finish_timeout: Duration,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "usage: canterd [--lobby-bind ADDR:PORT] [--race-bind ADDR:PORT] \
         [--relay-bind ADDR:PORT] [--notice TEXT] [--bans PATH]\n\
         env: CANTER_LOBBY_BIND, CANTER_RACE_BIND, CANTER_RELAY_BIND,\n\
         CANTER_RANCH_ADVERT, CANTER_RACE_ADVERT, CANTER_MESSENGER_ADVERT,\n\
         CANTER_NOTICE, CANTER_BANS"
    );
    std::process::exit(2);
}

fn env_sockaddr(key: &str, default: &str) -> SocketAddr {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit())
}

fn env_endpoint(key: &str, default: &str) -> AdvertisedEndpoint {
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_endpoint(&value).unwrap_or_else(|| usage_and_exit())
}

fn env_millis(key: &str, default: u64) -> Duration {
    let ms = std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(ms)
}

fn parse_endpoint(value: &str) -> Option<AdvertisedEndpoint> {
    let (address, port) = value.split_once(':')?;
    Some(AdvertisedEndpoint {
        address: address.trim().parse().ok()?,
        port: port.trim().parse().ok()?,
    })
}

pub fn parse_args() -> Config {
    let lobby_bind = env_sockaddr("CANTER_LOBBY_BIND", "127.0.0.1:10030");
    let race_bind = env_sockaddr("CANTER_RACE_BIND", "127.0.0.1:10032");
    let relay_bind = env_sockaddr("CANTER_RELAY_BIND", "127.0.0.1:10500");

    let ranch_advert = env_endpoint("CANTER_RANCH_ADVERT", "127.0.0.1:10031");
    let race_advert = env_endpoint("CANTER_RACE_ADVERT", "127.0.0.1:10032");
    let messenger_advert = env_endpoint("CANTER_MESSENGER_ADVERT", "127.0.0.1:10033");

    let notice = std::env::var("CANTER_NOTICE")
        .unwrap_or_else(|_| "welcome! {players_online} riders online".to_string());
    let bans_path: PathBuf = std::env::var("CANTER_BANS")
        .unwrap_or_else(|_| "var/bans.json".to_string())
        .into();

    let load_timeout = env_millis("CANTER_LOAD_TIMEOUT_MS", 30_000);
    let finish_timeout = env_millis("CANTER_FINISH_TIMEOUT_MS", 15_000);

    let mut config = Config {
        lobby_bind,
        race_bind,
        relay_bind,
        ranch_advert,
        race_advert,
        messenger_advert,
        notice,
        bans_path,
        load_timeout,
        finish_timeout,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--lobby-bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                config.lobby_bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--race-bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                config.race_bind = v.parse().unwrap_or_else(|_| usage_and_exit());
                config.race_advert = parse_endpoint(&v).unwrap_or_else(|| usage_and_exit());
            }
            "--relay-bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                config.relay_bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--notice" => {
                config.notice = it.next().unwrap_or_else(|| usage_and_exit());
            }
            "--bans" => {
                config.bans_path = it.next().unwrap_or_else(|| usage_and_exit()).into();
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parses_and_converts() {
        let ep = parse_endpoint("127.0.0.1:10031").unwrap();
        assert_eq!(ep.port, 10031);
        assert_eq!(ep.wire_address(), 0x7F00_0001);
    }

    #[test]
    fn bad_endpoint_is_none() {
        assert!(parse_endpoint("no-port").is_none());
        assert!(parse_endpoint("1.2.3.4:notaport").is_none());
        assert!(parse_endpoint("nothost:80").is_none());
    }
}
