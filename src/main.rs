use clap::Parser;
use hostvault::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Env var controlling log verbosity (e.g. `HOSTVAULT_LOG=debug`).
const LOG_ENV: &str = "HOSTVAULT_LOG";

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so `get` and `export` output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => hostvault::cli::commands::init::execute(&cli),
        Commands::Set {
            ref name,
            ref value,
            scope,
        } => hostvault::cli::commands::set::execute(&cli, name, value.as_deref(), scope),
        Commands::Get { ref name } => hostvault::cli::commands::get::execute(&cli, name),
        Commands::List { scope } => hostvault::cli::commands::list::execute(&cli, scope),
        Commands::Delete { ref name, force } => {
            hostvault::cli::commands::delete::execute(&cli, name, force)
        }
        Commands::Rotate { ref name } => hostvault::cli::commands::rotate::execute(&cli, name),
        Commands::Export { ref output } => {
            hostvault::cli::commands::export::execute(&cli, output.as_deref())
        }
        Commands::Import {
            ref bundle,
            ref source_key,
        } => hostvault::cli::commands::import_cmd::execute(&cli, bundle, source_key),
        Commands::Audit { last, ref since } => {
            hostvault::cli::commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Stats => hostvault::cli::commands::stats::execute(&cli),
    };

    if let Err(e) = result {
        hostvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
