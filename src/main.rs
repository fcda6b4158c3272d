mod cli;
mod ops;

use anyhow::Result;
use clap::Parser;
use std::time::Instant;

use cli::{Cli, Commands};
use dbsnap::drivers::selector::default_builders;
use dbsnap::registry::ProjectStore;
use dbsnap::utils::logging::init_tracing;
use ops::App;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Version = cli.command {
        ops::do_version();
        return Ok(());
    }

    let started = Instant::now();
    let app = App::new(ProjectStore::locate()?, default_builders(), cli.project)?;

    match cli.command {
        Commands::Init {
            project,
            database_url,
        } => {
            app.do_init(&project, &database_url)?;
        }
        Commands::Select { project } => {
            app.do_select(&project)?;
        }
        Commands::Set { key, value } => {
            app.do_set(&key, &value)?;
        }
        Commands::Status => {
            app.do_status()?;
        }
        Commands::Snapshot { name } => {
            app.do_snapshot(&name)?;
        }
        Commands::Restore { name, fast, safe } => {
            app.do_restore(&name, Commands::restore_override(fast, safe))?;
        }
        Commands::Remove { name, yes } => {
            app.do_delete(&name, yes)?;
        }
        Commands::List => {
            app.do_list()?;
        }
        Commands::Version => {}
    }

    println!("Done in {:.3}s.", started.elapsed().as_secs_f64());
    Ok(())
}
