use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tradedesk_app::{logging, Coordinator, DeskConfig, LogDestination};
use tradedesk_core::{OperationKind, OperationStatus, Severity, WatchList};
use tradedesk_logging::desk_info;

const TICK: Duration = Duration::from_millis(75);

#[derive(Parser)]
#[command(name = "tradedesk", about = "Drive dashboard jobs and watch lists from the terminal")]
struct Cli {
    /// Config file (RON). Defaults to ./tradedesk.ron when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a stock scan and wait for its results
    Scan {
        #[arg(value_enum)]
        side: Side,
    },
    /// Run the market breadth analysis
    Breadth,
    /// Download and ingest the latest bhavcopy files
    UpdateBhavcopy,
    /// Control the live trading bot
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },
    /// Add a symbol to a watch list, or remove it with --remove
    Watch {
        #[arg(value_enum)]
        list: Side,
        symbol: String,
        #[arg(long)]
        remove: bool,
    },
}

#[derive(Subcommand)]
enum BotCommand {
    /// Start the bot and follow its log until it stops
    Start {
        #[arg(long, default_value = "continuation")]
        mode: String,
    },
    /// Follow the log of a bot that is already running
    Logs,
    /// Ask the running bot to stop
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Continuation,
    Reversal,
}

impl Side {
    fn scan_kind(self) -> OperationKind {
        match self {
            Side::Continuation => OperationKind::ContinuationScan,
            Side::Reversal => OperationKind::ReversalScan,
        }
    }

    fn watch_list(self) -> WatchList {
        match self {
            Side::Continuation => WatchList::Continuation,
            Side::Reversal => WatchList::Reversal,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DeskConfig::load(cli.config.as_deref())?;
    logging::initialize(cli.log, config.level());
    desk_info!("tradedesk talking to {}", config.base_url);

    let mut desk = Coordinator::new(&config)?;
    issue(&mut desk, cli.command);
    drive(&mut desk);
    Ok(())
}

fn issue(desk: &mut Coordinator, command: Command) {
    match command {
        Command::Scan { side } => desk.start_operation(side.scan_kind(), json!({})),
        Command::Breadth => desk.start_operation(OperationKind::BreadthAnalysis, json!({})),
        Command::UpdateBhavcopy => desk.start_operation(OperationKind::BhavcopyUpdate, json!({})),
        Command::Bot {
            command: BotCommand::Start { mode },
        } => desk.start_operation(OperationKind::LiveBot, json!({ "mode": mode })),
        Command::Bot {
            command: BotCommand::Logs,
        } => desk.observe_bot(),
        Command::Bot {
            command: BotCommand::Stop,
        } => desk.stop_bot(),
        Command::Watch {
            list,
            symbol,
            remove,
        } => desk.toggle(list.watch_list(), symbol, remove, json!({})),
    }
}

/// Pumps the coordinator until nothing is tracked, pending or on screen.
fn drive(desk: &mut Coordinator) {
    let mut printer = Printer::default();
    loop {
        thread::sleep(TICK);
        if desk.pump(Instant::now()) {
            printer.report(desk);
        }
        let finished: Vec<String> = desk
            .list()
            .into_iter()
            .filter(|operation| operation.is_terminal())
            .map(|operation| operation.id.clone())
            .collect();
        for id in finished {
            desk.stop_observing(id);
        }
        if !desk.is_busy() {
            break;
        }
    }
}

#[derive(Default)]
struct Printer {
    toasts: HashSet<String>,
    progress: HashMap<String, (OperationStatus, u8, String)>,
    log_lines: HashMap<String, usize>,
}

impl Printer {
    fn report(&mut self, desk: &Coordinator) {
        for operation in desk.list() {
            let line = (operation.status, operation.progress, operation.message.clone());
            if self.progress.get(&operation.id) != Some(&line) {
                if !operation.kind.is_log_tail() {
                    println!(
                        "{} {:>3}% {}",
                        operation.kind, operation.progress, operation.message
                    );
                }
                self.progress.insert(operation.id.clone(), line);
            }

            let seen = self.log_lines.entry(operation.id.clone()).or_insert(0);
            for entry in operation.log.iter().skip(*seen) {
                println!("{entry}");
            }
            *seen = (*seen).max(operation.log.len());

            if operation.status == OperationStatus::Completed && !operation.kind.is_log_tail() {
                if let Some(result) = &operation.result {
                    let text = serde_json::to_string_pretty(result)
                        .unwrap_or_else(|_| result.to_string());
                    println!("{text}");
                }
            }
        }

        for toast in desk.view().toasts {
            if self.toasts.insert(toast.id.clone()) {
                println!("[{}] {}", severity_tag(toast.severity), toast.text);
            }
        }
    }
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "ok",
        Severity::Warning => "warn",
        Severity::Error => "error",
    }
}
