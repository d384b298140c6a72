use crate::commands::{Dispatcher, Reply};
use crate::config::RecorderConfig;
use crate::indexer::PaisaRefresher;
use crate::ledger_add::LedgerWriter;
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pocketledger", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a single command message, e.g. `record food 25.000 lunch`.
    Record(RecordArgs),
    /// Read command messages from stdin, one per line.
    Serve(ServeArgs),
    /// Print the available commands.
    Commands(CommonArgs),
}

#[derive(Args)]
struct CommonArgs {
    #[arg(long, value_name = "PATH", help = "Config file (JSON).")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Ledger file, overriding the config.")]
    ledger: Option<PathBuf>,
    #[arg(long, value_name = "ID", help = "Sender identity checked against allowed_user_id.")]
    user: Option<i64>,
}

#[derive(Args)]
struct RecordArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long, default_value_t = false, help = "Print the outcome as JSON.")]
    json: bool,
    #[arg(value_name = "COMMAND")]
    command: String,
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Record(args) => run_record(args),
        Commands::Serve(args) => run_serve(args),
        Commands::Commands(args) => run_commands(args),
    }
}

fn load_config(args: &CommonArgs) -> Result<RecorderConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => crate::config::read_config(path, true)?,
        None => match crate::config::default_config_path() {
            Some(path) => crate::config::read_config(&path, false)?,
            None => RecorderConfig::default(),
        },
    };
    if let Some(ledger) = &args.ledger {
        config.ledger_file = ledger.clone();
    }
    Ok(config)
}

fn build_dispatcher(config: &RecorderConfig) -> Dispatcher {
    let mut writer = LedgerWriter::new(&config.ledger_file, &config.commodity);
    if let Some(indexer_config) = &config.indexer_config {
        let mut refresher = PaisaRefresher::new(indexer_config);
        if let Some(binary) = &config.indexer_binary {
            refresher = refresher.with_binary(binary);
        }
        writer = writer.with_refresher(Arc::new(refresher));
    }
    Dispatcher::new(config, writer)
}

fn run_record(args: RecordArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.common)?;
    let dispatcher = build_dispatcher(&config);

    let name = args.command.trim_start_matches('/');
    let mut message = format!("/{name}");
    for arg in &args.args {
        message.push(' ');
        message.push_str(arg);
    }
    let reply = dispatcher.dispatch(args.common.user, &message);
    dispatcher.writer().wait_for_refresh();

    if args.json {
        println!("{}", serde_json::to_string(&reply)?);
    } else if let Some(text) = reply.text() {
        println!("{text}");
    }

    match reply {
        Reply::Ignored => Err("message ignored: sender is not allowed".into()),
        reply if reply.is_failure() => Err(reply.text().unwrap_or_default().into()),
        _ => Ok(()),
    }
}

fn run_serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.common)?;
    let dispatcher = Arc::new(build_dispatcher(&config));
    log::info!(
        "recording to {} ({} commands)",
        config.ledger_file.display(),
        dispatcher.commands().len()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let handled = runtime.block_on(crate::serve::serve_lines(
        Arc::clone(&dispatcher),
        args.common.user,
        tokio::io::BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    ))?;
    dispatcher.writer().wait_for_refresh();
    log::info!("handled {handled} messages");
    Ok(())
}

fn run_commands(args: CommonArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    print!("{}", build_dispatcher(&config).help_text());
    Ok(())
}
