use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use simscore::Element;
use simsred::data::report::{catalogue_lines, write_summary};
use simsred::data::run_file::RunFile;

#[derive(Parser)]
#[command(name = "simsred", version)]
#[command(about = "Reduce parsed SIMS isotope-ratio runs to drift- and bias-corrected delta values")]
struct Cli {
    /// Log intermediate values
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reduction pipeline over a parsed run file
    Reduce {
        /// Run file written by the import step (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output summary (JSON)
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Seed of the Monte-Carlo draws, overrides the run file
        #[arg(long)]
        seed: Option<u64>,

        /// Number of Monte-Carlo draws, overrides the run file
        #[arg(long)]
        ensemble_size: Option<usize>,
    },
    /// List the supported isotope combinations of an element
    Catalogue {
        #[arg(short, long)]
        element: Element,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Reduce { input, output, seed, ensemble_size } => {
            let mut run = RunFile::load(&input)?;
            if let Some(seed) = seed {
                run.config.seed = seed;
            }
            if let Some(n) = ensemble_size {
                run.config.ensemble_size = n;
            }
            info!("{}: {} sample(s), method {}", input.display(), run.samples.len(), run.method);

            let summary = run.reduce()?;
            write_summary(&output, &summary)?;
            info!("summary written to {}", output.display());
        }
        Command::Catalogue { element } => {
            for line in catalogue_lines(element) {
                println!("{line}");
            }
        }
    }

    Ok(())
}
