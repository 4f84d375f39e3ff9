use clap::Parser;
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::{
    append::rolling_file::{
        RollingFileAppender,
        policy::compound::{
            CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use scoreboard_common::{protocol::Credentials, state::ScoreboardState};
use std::path::PathBuf;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
    task,
    time::Instant,
};

mod channel;
mod conflict;
mod console;
mod countdown;
mod error;
mod message;
mod session;
mod state_store;
mod sync_client;

mod config;
use config::Config;

use channel::tcp::TcpChannel;
use console::{Console, Input};
use message::Command;
use state_store::{LocalStateStore, ViewData};
use sync_client::SyncClient;

const APP_NAME: &str = "scoreboard-admin";
const COMMAND_CHANNEL_LEN: usize = 8;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long)]
    /// Secret token of the board to edit
    secret: String,

    #[clap(long)]
    /// Identifier of the board to edit
    uuid: String,

    #[clap(long)]
    /// Server to connect to, overrides the config file
    host: Option<String>,

    #[clap(long)]
    /// Port to connect to, overrides the config file
    port: Option<u16>,

    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = match args.log_location {
        Some(path) => path,
        None => {
            let mut path = directories::BaseDirs::new()
                .ok_or("Could not find a directory to store logs")?
                .data_local_dir()
                .to_path_buf();
            path.push("scoreboard-logs");
            path
        }
    };
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path;
    log_path.push(format!("{APP_NAME}-log.txt"));
    archived_log_path.push(format!("{APP_NAME}-log-{{}}.txt.gz"));

    #[cfg(debug_assertions)]
    println!("Log path: {}", log_path.display());

    // Only log to the console in debug mode
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    // Setup the file log roller
    let archive_pattern = archived_log_path
        .to_str()
        .ok_or("The log location must be valid UTF-8")?;
    let roller = FixedWindowRoller::builder()
        .build(archive_pattern, args.num_old_logs)
        .map_err(|e| e.to_string())?;
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(log_path, Box::new(file_policy))?;

    // Setup the logging from all locations to use `LevelFilter::Error`
    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    // Setup the top level logging config
    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build("scoreboard_admin", log_level))
        .logger(Logger::builder().build("scoreboard_common", log_level))
        .build(root)?;

    log4rs::init_config(log_config)?;
    log_panics::init();

    info!(
        "Reading config file from {:?}",
        confy::get_configuration_file_path(APP_NAME, None)?
    );

    let mut config: Config = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            if let Err(e) = confy::store(APP_NAME, None, &config) {
                error!("Failed to write the default config file: {e}");
            }
            config
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    debug!("Using config {config:?}");

    let initial = ScoreboardState::new(
        &config.defaults.home_team,
        &config.defaults.away_team,
        config.defaults.remaining,
    );
    let store = LocalStateStore::new(initial, Instant::now());

    info!(
        "Connecting to {}:{} for board {}",
        config.server.host, config.server.port, args.uuid
    );
    let (channel, events) = TcpChannel::connect(config.server.channel_settings());
    let credentials = Credentials {
        token: args.secret,
        uuid: args.uuid,
    };
    let client = SyncClient::new(channel, credentials, store, config.display_assets);

    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_LEN);
    task::spawn(print_views(client.subscribe()));
    task::spawn(read_commands(Console::new(config.presets), command_tx));

    println!("{}", console::render(&client.view()));
    println!("{}", console::HELP);

    info!("Starting session");
    let client = session::run_session(client, events, command_rx).await;
    info!(
        "Session ended with {} after {} conflicts",
        client.store().state(),
        client.resolver().conflicts()
    );

    Ok(())
}

async fn read_commands(console: Console, tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                break;
            }
        };

        match console.parse(&line) {
            Ok(Input::Commands(commands)) => {
                for command in commands {
                    if tx.send(command).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Input::Help) => println!("{}", console::HELP),
            Ok(Input::Nothing) => {}
            Err(e) => println!("{e}"),
        }
    }

    info!("Input closed");
}

async fn print_views(mut rx: watch::Receiver<ViewData>) {
    while rx.changed().await.is_ok() {
        let line = console::render(&rx.borrow_and_update());
        println!("{line}");
    }
}
