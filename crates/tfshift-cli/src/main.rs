use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tfshift::MigratorOption;
use tfshift_exec::CancelToken;

#[derive(Parser)]
#[command(name = "tfshift", version)]
#[command(about = "Verified terraform state migrations", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration without pushing any state
    Plan(RunArgs),
    /// Run the migration and push the new state
    Apply(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Migration file (default: $TFSHIFT_CONFIG or tfshift.yaml)
    file: Option<PathBuf>,

    /// terraform command, may include arguments (default: $TFSHIFT_EXEC_PATH or terraform)
    #[arg(long)]
    exec_path: Option<String>,

    /// Save the plan of a forced migration to this file in the migrated directory
    #[arg(long)]
    plan_out: Option<PathBuf>,
}

impl RunArgs {
    fn option(&self) -> MigratorOption {
        let mut option = MigratorOption::from_env();
        if let Some(exec_path) = &self.exec_path {
            option.exec_path = exec_path.clone();
        }
        if let Some(plan_out) = &self.plan_out {
            option.plan_out = Some(plan_out.clone());
        }
        option
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (args, commit) = match &cli.command {
        Commands::Plan(args) => (args, false),
        Commands::Apply(args) => (args, true),
    };
    let verb = if commit { "apply" } else { "plan" };

    let path = tfshift_config::find_migration_file(args.file.as_deref())?;
    let file = tfshift_config::load_migration_file(&path)?;
    let mut migrator = file
        .migration
        .new_migrator(&args.option())
        .with_context(|| format!("invalid migration file {}", path.display()))?;

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the migration");
            on_signal.cancel();
        }
    });

    println!("{} {}", format!("{}:", verb).bold(), path.display());
    let result = if commit {
        migrator.apply(&cancel).await
    } else {
        migrator.plan(&cancel).await
    };

    match result {
        Ok(()) => {
            let done = if commit { "applied" } else { "planned" };
            println!("{} migration {}", "✓".green(), done);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {} failed in phase {}", "✗".red(), verb, e.phase());
            Err(e).with_context(|| format!("tfshift {} {}", verb, path.display()))
        }
    }
}
