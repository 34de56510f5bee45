use clap::Parser;
use log::info;
use server::network::Server;
use shared::pickup::PickupSpec;
use shared::{GameConfig, StunPolicy};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds a stunned character stays stunned
    #[arg(long, default_value = "5.0", value_parser = parse_stun_duration)]
    stun_duration: f32,

    /// What a stun does to an attack in progress: keep or supersede
    #[arg(long, default_value = "keep")]
    stun_policy: StunPolicy,

    /// Pickups to place, as x,y,z:damage or x,y,z:random
    #[arg(long, value_delimiter = ';')]
    pickups: Vec<PickupSpec>,
}

const MAX_STUN_DURATION: f32 = 3600.0;

fn parse_stun_duration(value: &str) -> Result<f32, String> {
    let seconds: f32 = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;

    if !(0.0..=MAX_STUN_DURATION).contains(&seconds) {
        return Err(format!(
            "stun duration must be between 0 and {} seconds",
            MAX_STUN_DURATION
        ));
    }
    Ok(seconds)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);

    let config = GameConfig {
        stun_duration: args.stun_duration,
        stun_policy: args.stun_policy,
        ..GameConfig::default()
    };

    info!("Starting server...");
    info!(
        "Tick rate {}Hz, stun {:.1}s ({}), {} pickups",
        tick_rate,
        config.stun_duration,
        config.stun_policy,
        args.pickups.len()
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        args.max_clients,
        config,
    )
    .await?;

    for spec in args.pickups {
        server.game_mut().add_pickup(spec.location, spec.kind);
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_duration_bounds() {
        assert_eq!(parse_stun_duration("2.5"), Ok(2.5));
        assert_eq!(parse_stun_duration("0"), Ok(0.0));
        assert!(parse_stun_duration("-1").is_err());
        assert!(parse_stun_duration("1e20").is_err());
        assert!(parse_stun_duration("inf").is_err());
        assert!(parse_stun_duration("NaN").is_err());
        assert!(parse_stun_duration("soon").is_err());
    }
}
