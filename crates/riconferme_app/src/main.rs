use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bot_logging::{bot_error, bot_info, bot_warn, LogBuffer};
use clap::Parser;
use riconferme_app::platform::last_run::{already_ran_on, write_last_run};
use riconferme_app::platform::logging::{self, LogDestination};
use riconferme_app::platform::panic::catch_panic;
use riconferme_app::platform::settings::{load_settings, Settings};
use riconferme_app::{Bot, RunMode};
use riconferme_core::system_clock;
use riconferme_engine::{ReqwestTransport, TransportSettings};

#[derive(Parser)]
#[command(name = "riconferme")]
#[command(version, about = "Annual reconfirmation of wiki administrators")]
struct Cli {
    #[arg(long, short, default_value = "riconferme.ron")]
    settings: PathBuf,

    /// Run only these tasks, in the given order
    #[arg(long, value_delimiter = ',', conflicts_with = "subtask")]
    task: Vec<String>,

    /// Run only these subtasks, in the given order
    #[arg(long, value_delimiter = ',')]
    subtask: Vec<String>,

    /// Run even if a full run already happened today
    #[arg(long)]
    force: bool,

    #[arg(long, value_enum, default_value_t = LogDestination::Both)]
    log_to: LogDestination,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli.settings) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mode = match RunMode::from_cli(&cli.task, &cli.subtask) {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let buffer = LogBuffer::new();
    logging::initialize(cli.log_to, &settings.log_file, buffer.clone());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(settings, mode, cli.force, buffer))
}

async fn run(settings: Settings, mode: RunMode, force: bool, buffer: LogBuffer) -> ExitCode {
    let transport = TransportSettings {
        request_timeout: settings.request_timeout(),
        ..TransportSettings::default()
    };
    let transport = match ReqwestTransport::new(transport) {
        Ok(transport) => transport,
        Err(err) => {
            bot_warn!("Cannot build the configured HTTP client ({err}), using a basic one");
            match ReqwestTransport::basic() {
                Ok(transport) => transport,
                Err(err) => {
                    bot_error!("Cannot build HTTP client: {err}");
                    return ExitCode::FAILURE;
                }
            }
        }
    };
    let mut bot = match Bot::new(settings.clone(), Arc::new(transport), system_clock()) {
        Ok(bot) => bot,
        Err(err) => {
            bot_error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = catch_panic(execute(&mut bot, &settings, &mode, force)).await;
    if let Err(err) = &outcome {
        bot_error!("Run aborted: {err:#}");
    }
    if let Err(err) = bot.flush_log(&buffer).await {
        eprintln!("Error: cannot write the on-wiki log: {err:#}");
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn execute(bot: &mut Bot, settings: &Settings, mode: &RunMode, force: bool) -> Result<()> {
    let today = bot.today();
    if mode.is_full() && !force && already_ran_on(&settings.last_run_file, today) {
        bot_warn!("A full run already happened on {today}; use --force to run again");
        return Ok(());
    }

    bot.prepare().await.context("cannot load the bot configuration")?;
    let result = bot.run(mode).await;
    if result.is_ok() {
        bot_info!("{}", result.report());
    } else {
        bot_error!("{}", result.report());
    }

    if mode.is_full() {
        write_last_run(&settings.last_run_file, today)?;
    }
    Ok(())
}
