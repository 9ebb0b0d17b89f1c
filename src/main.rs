use clap::{Parser, ValueEnum};
use cecbridge::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputMode {
    Cec,
    Keyboard,
}

#[derive(Parser, Debug)]
#[command(name = "cec-avr-bridged")]
#[command(author = "bigbro")]
#[command(about = "Bridges an IP-controlled amplifier onto the HDMI-CEC bus", long_about = None)]
struct Args {
    #[arg(short, long)]
    #[arg(help = "path to the daemon configuration file")]
    #[arg(value_name = "FILE")]
    config: Option<String>,

    #[arg(long, value_enum, default_value_t = InputMode::Cec)]
    #[arg(help = "input source for the protocol engine")]
    input: InputMode,

    #[arg(long)]
    #[arg(help = "overrides the configured log level")]
    log_level: Option<log::LevelFilter>,
}

fn get_configuration(path: &Option<String>) -> Config {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).expect("configuration file not found");
            toml::from_str(&text).expect("invalid configuration file")
        }
        None => Config::default(),
    }
}

fn setup_logging(level: log::LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .target(env_logger::Target::Stdout)
        .init();
    log::info!("logger initialized with level {:?}", level);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut configuration = get_configuration(&args.config);
    if let Some(level) = args.log_level {
        configuration.log_level = level;
    }

    setup_logging(configuration.log_level);

    if args.input == InputMode::Keyboard {
        log::error!("keyboard input mode is a manual-test harness and is not implemented");
        std::process::exit(2);
    }

    if configuration.target.address.is_none() {
        log::error!("no amplifier target address configured; discovery is not part of this daemon");
        std::process::exit(2);
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let mut supervisor = tokio::spawn(cecbridge::supervisor::run(configuration, stop_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("received interrupt, shutting down");
            let _ = stop_tx.send(true);
            let _ = supervisor.await;
        }
        result = &mut supervisor => {
            let _ = result;
        }
    }
}
