mod logging;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use headunit::config::HeadUnitSettings;
use headunit::sink::LoggingSink;
use headunit_link::{HeadUnit, LinkConfig, LinkState};
use headunit_transport::TransportKind;
use tracing::info;

use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "headunit", version, about = "Android Auto head unit")]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a phone and run until it disconnects.
    Run(RunArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Settings file.
    #[arg(long, value_name = "PATH", default_value = "headunit.json")]
    config: PathBuf,

    /// Connect over Wi-Fi regardless of the settings file.
    #[arg(long)]
    wifi: bool,

    /// Phone address for the Wi-Fi transport.
    #[arg(long, value_name = "ADDR")]
    phone: Option<IpAddr>,

    /// Fail immediately when no device is reachable instead of waiting.
    #[arg(long)]
    no_wait: bool,

    /// Car bluetooth adapter MAC advertised to the phone.
    #[arg(long, value_name = "MAC")]
    bluetooth: Option<String>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Settings file.
    #[arg(long, value_name = "PATH", default_value = "headunit.json")]
    config: PathBuf,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Config(args) => show_config(args),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = HeadUnitSettings::load(&args.config);
    let kind = if args.wifi {
        TransportKind::Wifi
    } else {
        settings.transport_kind()
    };
    let phone_ip: Option<IpAddr> = match args.phone {
        Some(ip) => Some(ip),
        None => settings
            .phone_address
            .as_deref()
            .map(str::parse)
            .transpose()?,
    };

    let sink = LoggingSink::new(args.bluetooth);
    let handle_slot = sink.handle_slot();
    let mut server = HeadUnit::new(LinkConfig::default(), Box::new(sink))?;
    let handle = server.start(kind, phone_ip, !args.no_wait)?;
    let _ = handle_slot.set(handle);

    info!(?kind, "head unit running");
    while server.state() != LinkState::Stopped {
        std::thread::sleep(Duration::from_millis(200));
    }
    server.stop();
    info!("head unit stopped");
    Ok(())
}

fn show_config(args: ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = HeadUnitSettings::load(&args.config);
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
