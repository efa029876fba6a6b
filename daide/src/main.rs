mod config;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use config::{Config, Strategy};
use daide_client::{Client, ClientError, HoldStrategy, ProtocolError, RandomStrategy, Role};
use daide_util::connection::{Connection, ConnectionError};

#[derive(Parser, Debug)]
#[command(name = "daide", about = "Connect to a DAIDE adjudicator and play or observe")]
struct Args {
    /// Adjudicator host; overrides the config file.
    #[arg(long)]
    host: Option<String>,
    /// Adjudicator port; overrides the config file.
    #[arg(long)]
    port: Option<u16>,
    /// Register as an observer instead of a player.
    #[arg(long)]
    observe: bool,
    /// Name sent with NME.
    #[arg(long)]
    name: Option<String>,
    /// Order strategy for a playing client.
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,
    /// Config file; missing files fall back to defaults.
    #[arg(long, default_value = "daide.toml")]
    config: PathBuf,
}

fn run(config: Config) -> Result<daide_client::SessionEnd, ClientError> {
    let connection = Connection::connect(&config.host, config.port)?;
    if let Some(secs) = config.timeout_secs {
        connection.set_timeout(Some(Duration::from_secs(secs)))?;
    }
    println!("connected to {}:{}", config.host, config.port);

    let role = if config.observe {
        Role::Observer
    } else {
        Role::Player {
            name: config.name.clone(),
            version: config.version.clone(),
        }
    };
    let mut client = Client::new(connection, role);
    if !config.observe {
        client = match config.strategy {
            Strategy::Hold => client.with_strategy(HoldStrategy),
            Strategy::Rand => client.with_strategy(RandomStrategy),
        };
    }
    client.register()?;
    client.run()
}

fn main() -> ExitCode {
    // Help and version exit clean; anything else malformed is 3.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(3)
            };
            let _ = err.print();
            return code;
        }
    };

    let mut config = match Config::load(&[&args.config]) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("bad config {}: {}", args.config.display(), err);
            return ExitCode::from(3);
        }
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(name) = args.name {
        config.name = name;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.observe |= args.observe;

    match run(config) {
        Ok(end) => {
            println!("session complete: {:?}", end);
            ExitCode::SUCCESS
        }
        Err(
            ClientError::Protocol(ProtocolError::RegistrationRejected)
            | ClientError::Protocol(ProtocolError::ErrorMessage(_))
            | ClientError::Connection(ConnectionError::Handshake),
        ) => {
            eprintln!("registration refused by the server");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("session failed: {}", err);
            ExitCode::from(1)
        }
    }
}
