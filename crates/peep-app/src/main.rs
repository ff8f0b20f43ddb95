//! Peep application binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML > defaults)
//! 2. Open the SQLite reminder store
//! 3. Run the requested command: the spoken reminder dialogue on the
//!    terminal, the stored reminder list, or the notification plan

mod cli;
mod console;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use peep_core::config::PeepConfig;
use peep_core::types::ReminderRecord;
use peep_schedule::{plan_notifications, Database, ReminderStore, SqliteReminderStore};
use peep_voice::{DialogueController, DialogueOutcome, Navigator, Speaker};

use cli::{CliArgs, Command};
use console::{ConsoleNavigator, ConsoleSpeechInput, ConsoleTts};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let loaded = PeepConfig::load(&config_file);

    // Tracing. Logs go to stderr so prompts on stdout stay readable.
    let level = args
        .resolve_log_level()
        .or_else(|| loaded.as_ref().ok().map(|c| c.general.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    let mut config = config_or_default(&config_file, loaded);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }

    // Storage.
    let data_dir = cli::expand_home(&config.general.data_dir);
    let db_path = data_dir.join(&config.schedule.store_file);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "Reminder store opened");
    let store: Arc<dyn ReminderStore> = Arc::new(SqliteReminderStore::new(db));

    match args.command() {
        Command::Voice => run_voice(&config, store).await,
        Command::List => run_list(store.as_ref()).await,
        Command::Plan { json } => run_plan(&config, store.as_ref(), json).await,
    }
}

/// Fall back to defaults when the config file could not be loaded.
///
/// On first run the defaults are written to `path` so there is a file to
/// edit. An existing file that failed to parse is left untouched.
fn config_or_default(path: &Path, loaded: peep_core::Result<PeepConfig>) -> PeepConfig {
    match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Using default configuration");
            let config = PeepConfig::default();
            if !path.exists() {
                match config.save(path) {
                    Ok(()) => tracing::info!(path = %path.display(), "Default configuration written"),
                    Err(e) => tracing::warn!(error = %e, "Failed to write default configuration"),
                }
            }
            config
        }
    }
}

/// Run one reminder dialogue on the terminal.
async fn run_voice(
    config: &PeepConfig,
    store: Arc<dyn ReminderStore>,
) -> Result<(), Box<dyn Error>> {
    let speaker = Arc::new(Speaker::new(ConsoleTts));
    let input = Arc::new(ConsoleSpeechInput::stdin());
    let navigator: Arc<dyn Navigator> = Arc::new(ConsoleNavigator);
    let controller = DialogueController::new(
        speaker,
        Arc::clone(&input),
        navigator,
        store,
        config.voice.clone(),
    );

    let handle = controller
        .start(
            |record| tracing::info!(name = %record.name, "Reminder added"),
            || tracing::info!("Reminder dialogue cancelled"),
        )
        .await?;

    // Ctrl-C or end of input cancels the dialogue.
    let cancel = handle.canceller();
    let watched = Arc::clone(&input);
    let interrupt = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            _ = watched.closed() => tracing::info!("Input closed"),
        }
        cancel();
    });

    let outcome = handle.wait().await;
    interrupt.abort();

    match outcome? {
        DialogueOutcome::Saved(record) => print_plan(config, &record),
        DialogueOutcome::Cancelled => println!("취소되었습니다."),
        DialogueOutcome::TextEntry => println!("텍스트 입력은 앱 화면에서만 지원됩니다."),
    }
    Ok(())
}

async fn run_list(store: &dyn ReminderStore) -> Result<(), Box<dyn Error>> {
    let reminders = store.list().await?;
    if reminders.is_empty() {
        println!("등록된 알림이 없습니다.");
        return Ok(());
    }
    for (i, record) in reminders.iter().enumerate() {
        println!(
            "{}. {} ({}) {} / {}",
            i + 1,
            record.name,
            record.dosage_label(),
            record.days_label(),
            record.times_label()
        );
        if !record.notes.is_empty() {
            println!("   {}", record.notes);
        }
    }
    Ok(())
}

async fn run_plan(
    config: &PeepConfig,
    store: &dyn ReminderStore,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let reminders = store.list().await?;
    if json {
        let now = chrono::Local::now().naive_local();
        let planned: Vec<_> = reminders
            .iter()
            .flat_map(|record| plan_notifications(record, now, &config.schedule))
            .collect();
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }
    for record in &reminders {
        print_plan(config, record);
    }
    Ok(())
}

fn print_plan(config: &PeepConfig, record: &ReminderRecord) {
    let now = chrono::Local::now().naive_local();
    for planned in plan_notifications(record, now, &config.schedule) {
        println!(
            "[{}] {} {} ({}, #{})",
            planned.label,
            planned.fire_at.format("%Y-%m-%d %H:%M"),
            planned.message,
            planned.title,
            planned.id
        );
    }
}
