use atmbank::application::bank::Bank;
use atmbank::config::{BankConfig, SelectionMode};
use atmbank::interfaces::csv::account_writer::AccountWriter;
use atmbank::interfaces::csv::script_reader::ScriptReader;
use atmbank::interfaces::script::ScriptRunner;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Csv,
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ATM script CSV file
    script: PathBuf,

    /// JSON configuration file
    #[arg(long, env = "ATMBANK_CONFIG")]
    config: Option<PathBuf>,

    /// Size of each identifier pool (overrides the config file)
    #[arg(long)]
    pool_capacity: Option<u32>,

    /// Where session account selections are kept (overrides the config file)
    #[arg(long, value_enum)]
    selection_mode: Option<SelectionMode>,

    /// Output format for the final account report
    #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
    format: ReportFormat,

    /// Log level
    #[arg(long, env = "ATMBANK_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }

    let mut config = BankConfig::load(cli.config.as_deref()).into_diagnostic()?;
    if let Some(capacity) = cli.pool_capacity {
        config.pool_capacity = capacity;
    }
    if let Some(mode) = cli.selection_mode {
        config.selection_mode = mode;
    }
    config.validate().into_diagnostic()?;

    let bank = Arc::new(Bank::new(config));

    let file = File::open(&cli.script).into_diagnostic()?;
    let reader = ScriptReader::new(file);
    ScriptRunner::new(bank.clone())
        .run(reader.steps())
        .await
        .into_diagnostic()?;

    let mut accounts = bank.accounts();
    accounts.sort_by(|a, b| a.owner.cmp(&b.owner).then(a.account.cmp(&b.account)));

    let stdout = io::stdout();
    match cli.format {
        ReportFormat::Csv => {
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(accounts).into_diagnostic()?;
        }
        ReportFormat::Json => {
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &accounts).into_diagnostic()?;
            writeln!(out).into_diagnostic()?;
        }
    }

    Ok(())
}
