use clap::Parser;
use client::input::{Script, ScriptedInput};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Input routine to play: idle, circle, brawler or strafe
    #[arg(long, default_value = "brawler")]
    script: Script,

    /// Override the attack animation length in seconds
    #[arg(long)]
    attack_duration: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Playing the {} script", args.script);

    let mut client = client::network::Client::new(
        &args.server,
        args.fake_ping,
        Box::new(ScriptedInput::new(args.script)),
        args.attack_duration,
    )
    .await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
