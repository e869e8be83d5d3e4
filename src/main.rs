//! rsrxn: run compartmental reaction-diffusion networks.
//!
//! ```bash
//! rsrxn -v run demos/birth_death.toml
//! rsrxn graph demos/membrane_slab.toml -o membrane.dot
//! rsrxn state demos/diffusion_1d.toml -o layout.csv
//! rsrxn list
//! ```

use clap::{ArgAction, Parser, Subcommand};
use rsrxn::errors::CliResult;
use rsrxn::run::{graph, run, state_layout};
use rsrxn::RunConfig;
use rsrxn_networks::NETWORK_NAMES;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rsrxn")]
#[command(about = "Deterministic and stochastic simulation of compartmental reaction networks")]
struct Cli {
    /// More log output, repeat for more detail
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a configured network and write reporter and state CSVs
    Run { config: PathBuf },
    /// Export the compartment connectivity as a DOT graph
    Graph {
        config: PathBuf,
        /// Output file, stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Divide compartment positions by this length (nm) when placing nodes
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
    },
    /// Write the state layout (species, compartment and position per entry)
    State {
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the built-in networks
    List,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to set up logging: {e}");
    }
}

fn execute(command: Command) -> CliResult<()> {
    match command {
        Command::Run { config } => {
            let outcome = run(&RunConfig::from_file(&config)?)?;
            for file in &outcome.files {
                println!("{}", file.display());
            }
        }
        Command::Graph {
            config,
            output,
            scale,
        } => {
            let dot = graph(&RunConfig::from_file(&config)?, scale)?;
            match output {
                Some(path) => fs::write(path, dot)?,
                None => println!("{dot}"),
            }
        }
        Command::State { config, output } => {
            let state = state_layout(&RunConfig::from_file(&config)?, &output)?;
            log::info!("{} state entries written to {}", state.len(), output.display());
        }
        Command::List => {
            for name in NETWORK_NAMES {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = execute(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
