use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use coolpak6000::{
    client::CoolpakClient,
    config::WatchdogConfig,
    error::Error,
    status::field_label,
    tracker::FileStateStore,
    transport::{SerialTransport, discover_port},
    watchdog::{CommandAlert, InfluxMetrics, Poll, Watchdog},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "coolpak",
    version,
    about = "Leybold COOLPAK 6000 compressor control and watchdog"
)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, discovered by USB manufacturer when omitted
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// USB adapter manufacturer to look for
    #[arg(long, global = true)]
    manufacturer: Option<String>,

    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the interpreted status line
    Status,
    /// Print the logged error codes
    Errors,
    /// Switch the compressor on or off
    Power {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Send a raw command token (DAT, SYS1, SYS0, ERR) and print the reply
    Raw { token: String },
    /// Poll once, alert on power state change and persist the new state
    Watchdog {
        /// Overrides `state_file` from the config
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => WatchdogConfig::from_file(path)?,
        None => WatchdogConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = Some(port);
    }
    if let Some(manufacturer) = cli.manufacturer {
        config.manufacturer = manufacturer;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }

    match cli.command {
        Commands::Watchdog { state_file } => {
            if let Some(state_file) = state_file {
                config.state_file = state_file;
            }
            run_watchdog(&config)
        }
        Commands::Status => {
            let mut client = connect(&config)?;
            print_status(&mut client)
        }
        Commands::Errors => {
            let mut client = connect(&config)?;
            let errors = client.query_errors()?;
            println!("Number of errors = {}", errors.len());
            for (index, error) in errors.iter().enumerate() {
                println!("error {} : {}", index, error);
            }
            Ok(())
        }
        Commands::Power { state } => {
            let mut client = connect(&config)?;
            let on = matches!(state, Switch::On);
            match client.set_power(on)? {
                Some(reply) => println!("Reply: {}", reply.escape_debug()),
                None => println!("No confirmation received"),
            }
            Ok(())
        }
        Commands::Raw { token } => {
            let mut client = connect(&config)?;
            let reply = client.send_token(&token)?;
            println!("{}", String::from_utf8_lossy(&reply).escape_debug());
            Ok(())
        }
    }
}

fn resolve_port(config: &WatchdogConfig) -> Result<Option<String>> {
    if let Some(port) = &config.port {
        return Ok(Some(port.clone()));
    }
    discover_port(&config.manufacturer).context("Failed to enumerate serial ports")
}

fn open(config: &WatchdogConfig, port: &str) -> Result<CoolpakClient<SerialTransport>> {
    let client = CoolpakClient::open(port, config.baud_rate)?
        .with_read_timeout(config.read_timeout())
        .with_settle_interval(config.settle_interval());
    Ok(client)
}

fn connect(config: &WatchdogConfig) -> Result<CoolpakClient<SerialTransport>> {
    match resolve_port(config)? {
        Some(port) => {
            println!("Found unit in port: {}", port);
            open(config, &port)
        }
        None => bail!("No {} serial adapter found", config.manufacturer),
    }
}

fn print_fields(fields: &[String]) {
    for (index, value) in fields.iter().enumerate() {
        println!("{} : {}", field_label(index).unwrap_or("Unexpected field"), value);
    }
}

fn print_status(client: &mut CoolpakClient<SerialTransport>) -> Result<()> {
    match client.query_status() {
        Ok(status) => {
            println!("COOLPAK status is: {}", status.raw().as_slice().join("/"));
            print_fields(status.raw().as_slice());
            Ok(())
        }
        Err(Error::MalformedResponse { fields }) => {
            log::warn!("Length of the response is strange, interpreting anyway");
            print_fields(&fields);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_watchdog(config: &WatchdogConfig) -> Result<()> {
    let Some(port) = resolve_port(config)? else {
        log::info!("No {} serial adapter found, nothing to do", config.manufacturer);
        return Ok(());
    };

    let poll = {
        let mut client = open(config, &port)?;
        let poll = Poll::from_result(client.query_status())?;
        client.close();
        poll
    };

    let mut watchdog = Watchdog::new(&config.device_name, FileStateStore::new(&config.state_file))
        .silent_device_is_off(config.silent_device_is_off);
    if let Some(program) = &config.alert_command {
        watchdog = watchdog.with_alert(CommandAlert::new(program));
    }
    if let Some(metrics) = &config.metrics {
        match InfluxMetrics::new(metrics) {
            Ok(sink) => watchdog = watchdog.with_metrics(sink),
            Err(err) => log::warn!("Metrics disabled: {}", err),
        }
    }

    let report = watchdog.run(&poll)?;
    log::debug!("Watchdog run finished: {:?}", report);
    Ok(())
}
