use std::{error::Error, path::PathBuf, process, sync::Arc, time::Duration};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use onair::{
    config::{Config, StationFile},
    http,
    metadata::{DemoSource, HttpSource, Source},
    observer::{MediaSession, Notification},
    session::{Command, Session},
    signal::{self, Lifecycle},
    stream::{HttpConnector, Output},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Station file
    ///
    /// TOML file with the station's name, stream and metadata endpoints.
    /// Settings given on the command line take precedence.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "ONAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Station name
    #[arg(short = 'n', long, env = "ONAIR_STATION")]
    station: Option<String>,

    /// Audio stream URL
    #[arg(long, value_hint = ValueHint::Url, env = "ONAIR_STREAM_URL")]
    stream_url: Option<Url>,

    /// Now playing metadata URL
    ///
    /// Without one, the station's fallback record is shown.
    #[arg(long, value_hint = ValueHint::Url, env = "ONAIR_METADATA_URL")]
    metadata_url: Option<Url>,

    /// Seconds between metadata polls
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Show random demo tracks instead of polling metadata
    #[arg(long, default_value_t = false, conflicts_with = "metadata_url")]
    demo: bool,

    /// Write the raw stream to a file, or `-` for standard output
    ///
    /// Useful to pipe into a decoder: `onair --output - | mpv -`.
    /// Logging goes to standard error.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    output: Option<String>,

    /// Start playing right away
    #[arg(short, long, default_value_t = false)]
    autoplay: bool,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(args: &Args) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if args.quiet || args.verbose > 0 {
        let level = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("onair", level);
    }

    logger.init();
}

/// Builds the configuration from defaults, the station file and the
/// command line, in that order.
///
/// # Errors
///
/// Returns an error if the station file cannot be read or holds invalid
/// settings.
fn load_config(args: &Args) -> onair::error::Result<Config> {
    let mut config = Config::new()?;

    if let Some(ref path) = args.config {
        let file = StationFile::from_file(path).inspect_err(|_| {
            info!(
                "see station.toml.example for the format of {}",
                path.display()
            );
        })?;
        config.apply(file)?;
    }

    if let Some(ref station) = args.station {
        config.station_name.clone_from(station);
    }
    if let Some(ref url) = args.stream_url {
        config.stream_url = url.clone();
    }
    if args.metadata_url.is_some() {
        config.metadata_url.clone_from(&args.metadata_url);
    }
    if let Some(secs) = args.interval {
        config.poll_interval = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Main application loop.
///
/// # Errors
///
/// This function returns an error when the configuration is invalid or the
/// signal handlers cannot be installed. Playback failures are reported and
/// recovered from inside the session.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    info!(
        "tuning in to {} at {}",
        config.station_name, config.stream_url
    );

    let http_client = http::Client::new(&config)?;
    let source: Arc<dyn Source> = if args.demo {
        Arc::new(DemoSource::new(&config.station_name))
    } else {
        Arc::new(HttpSource::new(
            http_client.clone(),
            config.metadata_url.clone(),
        ))
    };

    let output = match args.output {
        Some(ref output) => output.parse()?,
        None => Output::Discard,
    };
    let connector = Arc::new(HttpConnector::new(http_client, output));

    let mut session = Session::new(&config, source, connector);
    session.observe(Arc::new(MediaSession::new()));
    session.observe(Arc::new(Notification::new(&config.station_name)));

    let mut signals = signal::Handler::new()?;
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    session.start().await;
    if args.autoplay {
        session.handle(Command::Toggle).await;
    }

    loop {
        tokio::select! {
            // Prioritize lifecycle signals.
            biased;

            lifecycle = signals.recv() => {
                info!("received {lifecycle}");
                session.stop().await;

                match lifecycle {
                    Lifecycle::Restart => session.start().await,
                    Lifecycle::Interrupt | Lifecycle::Terminate => {
                        info!("shutting down gracefully");
                        break Ok(());
                    }
                }
            }

            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    match line {
                        "" => {}
                        "q" | "quit" => {
                            session.stop().await;
                            break Ok(());
                        }
                        command => match command.parse::<Command>() {
                            Ok(command) => session.handle(command).await,
                            Err(e) => warn!("{e}"),
                        },
                    }
                }
                Ok(None) => {
                    debug!("standard input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("error reading standard input: {e}");
                    stdin_open = false;
                }
            },

            wakeup = session.wait() => session.process(wakeup).await,
        }
    }
}

/// Main entry point of the application.
///
/// This function parses the command line arguments, initializes the logger
/// facade, and starts the main application loop.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
