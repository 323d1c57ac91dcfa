extern crate clap;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use log::{debug, error};
use speedcheck::config::Settings;
use speedcheck::errors::{exit_codes, format_error_for_display, ErrorKind, SpeedTestError};
use speedcheck::history::DEFAULT_CAPACITY;
use speedcheck::notifier::Notifier;
use speedcheck::runner::SessionTarget;
use speedcheck::session::ServerInfo;
use speedcheck::stats::Comparison;
use speedcheck::tui::controller::FAILURE_MESSAGE;
use speedcheck::tui::{DisplayMode, TuiController};
use speedcheck::{report, ResultRecord};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Where test results are kept
    #[arg(long, global = true, value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Number of results kept in the history
    #[arg(long, global = true, value_name = "N", default_value_t = DEFAULT_CAPACITY)]
    history_cap: usize,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a speed test (the default)
    Run(RunArgs),
    /// Show recent results and statistics
    History {
        /// Number of results to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List nearby test servers
    Servers {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare the latest result with the one before it
    Compare,
    /// Delete all stored results
    Clear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Test against the server with this id instead of the best one (must
    /// be among the nearby servers `speedcheck servers` lists)
    #[arg(long, value_name = "ID")]
    server: Option<String>,
    /// Output the result as JSON
    #[arg(long)]
    json: bool,
    /// Plain text progress instead of the full-screen view
    #[arg(long)]
    plain: bool,
    /// Do not add the result to the history
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    debug!(
        "speedcheck {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("SPEEDCHECK_BUILD_GIT_HASH").unwrap_or("unknown revision")
    );

    let mut settings = Settings { history_cap: cli.history_cap, ..Settings::default() };
    if let Some(path) = cli.history_file {
        settings.history_file = path;
    }

    let outcome = match cli.command {
        None => run(&settings, cli.run).await,
        Some(Command::Run(args)) => run(&settings, args).await,
        Some(Command::History { limit, json }) => history(&settings, limit, json),
        Some(Command::Servers { json }) => servers(&settings, json).await,
        Some(Command::Compare) => compare(&settings),
        Some(Command::Clear { yes }) => clear(&settings, yes),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", format_error_for_display(&e).red());
            std::process::exit(e.exit_code());
        }
    }
}

fn display_error(e: io::Error) -> SpeedTestError {
    SpeedTestError::new(ErrorKind::Unknown, format!("terminal error: {}", e)).with_source(e)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), SpeedTestError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(settings: &Settings, args: RunArgs) -> Result<i32, SpeedTestError> {
    let mode = DisplayMode::detect(args.json, args.plain, io::stdout().is_terminal());
    let target = match args.server {
        Some(id) => SessionTarget::Server(id),
        None => SessionTarget::BestAvailable,
    };

    let mut client = settings.measurement_client()?;
    let (notifier, events) = Notifier::channel();
    client.set_notifier(notifier);

    let (done_tx, done) = oneshot::channel();
    let handle = client.run_threaded(target, move |record| {
        let _ = done_tx.send(record);
    })?;

    let mut controller = TuiController::new(mode);
    controller.init().map_err(display_error)?;
    let outcome = controller.drive(events, done).await;
    controller.cleanup().map_err(display_error)?;
    let outcome = outcome.map_err(display_error)?;

    // The callback fires just before the thread exits.
    let _ = handle.join();

    let Some(record) = outcome else {
        if mode == DisplayMode::Json {
            print_json(&serde_json::json!({ "error": FAILURE_MESSAGE }))?;
        } else {
            eprintln!("{}", FAILURE_MESSAGE.red());
        }
        return Ok(exit_codes::NETWORK_ERROR);
    };

    if !args.no_save {
        settings.history().append(record.clone());
    }

    if mode == DisplayMode::Json {
        print_json(&record)?;
    } else {
        print!("{}", report::result(&record));
        println!("\nTotal test time: {:.1} seconds", record.test_duration);
    }

    Ok(exit_codes::SUCCESS)
}

fn history(settings: &Settings, limit: usize, json: bool) -> Result<i32, SpeedTestError> {
    let store = settings.history();

    if json {
        let recent: Vec<&ResultRecord> = store.recent(limit).collect();
        print_json(&recent)?;
    } else {
        print!("{}", report::history(store.records(), limit));
    }

    Ok(exit_codes::SUCCESS)
}

async fn servers(settings: &Settings, json: bool) -> Result<i32, SpeedTestError> {
    let client = settings.measurement_client()?;
    if !json {
        println!("Getting server list...");
    }

    let info = client.get_server_info().await;
    if json {
        print_json(&info)?;
    }

    match info {
        ServerInfo::Servers(servers) => {
            if !json {
                print!("{}", report::servers(&servers));
            }
            Ok(exit_codes::SUCCESS)
        }
        ServerInfo::Error(message) => {
            if !json {
                eprintln!("{} {}", "Error getting servers:".red(), message);
            }
            Ok(exit_codes::NETWORK_ERROR)
        }
    }
}

fn compare(settings: &Settings) -> Result<i32, SpeedTestError> {
    let store = settings.history();

    match Comparison::latest(store.records()) {
        Some(comparison) => print!("{}", report::comparison(&comparison)),
        None => println!("Need at least 2 tests for comparison!"),
    }

    Ok(exit_codes::SUCCESS)
}

fn clear(settings: &Settings, yes: bool) -> Result<i32, SpeedTestError> {
    let mut store = settings.history();

    if store.is_empty() {
        println!("No history to clear!");
        return Ok(exit_codes::SUCCESS);
    }

    println!("Current history: {} tests", store.len());

    if !yes {
        print!("Are you sure you want to clear all history? (y/N): ");
        io::stdout().flush().map_err(display_error)?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).map_err(display_error)?;

        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Operation cancelled!");
            return Ok(exit_codes::SUCCESS);
        }
    }

    store.clear();
    println!("{}", "History cleared!".green());

    Ok(exit_codes::SUCCESS)
}
