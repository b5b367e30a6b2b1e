//! tealforge CLI Application
//!
//! Builds, prints and simulates the sample contract programs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tealforge::cli;
use tealforge::samples::Template;
use tealforge::storage::ArtifactConfig;

#[derive(Parser)]
#[command(name = "tealforge")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Compile contract expression trees to TEAL listings", long_about = None)]
struct Cli {
    /// JSON file with artifact settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove old artifacts, compile a template and write its listings
    Build {
        /// Sample program to build
        #[arg(short, long, value_enum, default_value = "router")]
        template: Template,

        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Program version
        #[arg(short = 'V', long)]
        version: Option<u8>,
    },

    /// Print the listings of a template
    Show {
        #[arg(short, long, value_enum, default_value = "router")]
        template: Template,

        #[arg(short = 'V', long)]
        version: Option<u8>,
    },

    /// List the sample programs
    Templates,

    /// Create a template application and run a scenario against it
    Simulate {
        #[arg(short, long, value_enum, default_value = "router")]
        template: Template,

        /// Scenario JSON file
        #[arg(short, long)]
        scenario: PathBuf,

        #[arg(short = 'V', long)]
        version: Option<u8>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ArtifactConfig::load(path)?,
        None => ArtifactConfig::default(),
    };

    match cli.command {
        Commands::Build {
            template,
            out_dir,
            version,
        } => {
            if let Some(dir) = out_dir {
                config.out_dir = dir;
            }
            if let Some(v) = version {
                config.version = v;
            }
            cli::cmd_build(&config, template)?;
        }

        Commands::Show { template, version } => {
            cli::cmd_show(template, version.unwrap_or(config.version))?;
        }

        Commands::Templates => {
            cli::cmd_templates()?;
        }

        Commands::Simulate {
            template,
            scenario,
            version,
        } => {
            cli::cmd_simulate(template, version.unwrap_or(config.version), &scenario)?;
        }
    }

    Ok(())
}
