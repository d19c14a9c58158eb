mod browser;
mod cli;
mod config;
mod db;
mod error;
mod fetch;
mod fmt;
mod loader;
mod mobius;
mod models;
mod portals;
mod render;
mod reports;
mod settings;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "cboc=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            district,
            divisions,
        } => cli::init::run(data_dir, district, divisions),
        Commands::Fetch {
            credentials,
            period,
            browser,
            base_dir,
            divisions,
            detailed_activity,
            linger,
        } => cli::fetch::run(cli::fetch::FetchArgs {
            credentials,
            period,
            browser,
            base_dir,
            divisions,
            detailed_activity,
            linger,
        }),
        Commands::DscLogin {
            credentials,
            browser,
        } => cli::dsc_login::run(credentials, browser),
        Commands::Load {
            base_dir,
            database,
            replace,
        } => cli::load::run(base_dir, database, replace),
        Commands::Render {
            database,
            output_dir,
        } => cli::render::run(database, output_dir),
        Commands::Status => cli::status::run(),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "cboc", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
