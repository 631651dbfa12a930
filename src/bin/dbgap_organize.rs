use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dbgap_organizer::app::{OrganizeOptions, Organizer};
use dbgap_organizer::config::ConfigLoader;
use dbgap_organizer::error::OrganizeError;
use dbgap_organizer::inventory::Inventory;
use dbgap_organizer::output::{self, InventoryEntry, JsonOutput, OutputMode, TextOutput};
use dbgap_organizer::prepare::SystemDecryptor;

#[derive(Parser)]
#[command(name = "dbgap-organize")]
#[command(about = "Classify, reconcile and organize dbGaP phenotype downloads")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate a download tree and link it into a curated layout")]
    Organize(OrganizeArgs),
    #[command(about = "List every file under a tree with its classification")]
    Inventory(InventoryArgs),
}

#[derive(Args)]
struct OrganizeArgs {
    input: PathBuf,

    output: PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    consent_variable: Option<String>,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    decrypt: bool,

    #[arg(long)]
    decrypt_tool: Option<PathBuf>,

    #[arg(long)]
    no_decompress: bool,

    #[arg(long)]
    no_lock: bool,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct InventoryArgs {
    root: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<OrganizeError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OrganizeError) -> u8 {
    match error {
        OrganizeError::NotFound { .. } | OrganizeError::ConfigRead(_) => 2,
        OrganizeError::MissingTool(_) | OrganizeError::ToolFailed(_) => 3,
        error if error.is_validation() => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Organize(args) => run_organize(args, mode),
        Commands::Inventory(args) => run_inventory(args, mode),
    }
}

fn run_organize(args: OrganizeArgs, mode: OutputMode) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let mut options = OrganizeOptions::from(&config);
    if args.consent_variable.is_some() {
        options.consent_variable = args.consent_variable;
    }
    if args.limit.is_some() {
        options.limit = args.limit;
    }
    options.decrypt |= args.decrypt;
    options.decompress &= !args.no_decompress;
    options.lock_output &= !args.no_lock;
    options.dry_run = args.dry_run;

    let decryptor = match args.decrypt_tool.or(config.decrypt_tool) {
        Some(program) => SystemDecryptor::with_program(program),
        None => SystemDecryptor::new(),
    };
    let organizer = Organizer::new(decryptor);

    match mode {
        OutputMode::Json => {
            let report = organizer.run(&args.input, &args.output, &options, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()?;
        }
        OutputMode::Text => {
            let report = organizer.run(&args.input, &args.output, &options, &TextOutput)?;
            TextOutput::print_report(&report).into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_inventory(args: InventoryArgs, mode: OutputMode) -> miette::Result<()> {
    let inventory = Inventory::build(&args.root)?;
    let entries = InventoryEntry::from_inventory(&inventory);
    output::print_inventory(&entries, mode).into_diagnostic()?;
    Ok(())
}
