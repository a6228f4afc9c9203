// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "edgeview")]
#[command(about = "Live camera preview with edge detection")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Run the live preview pipeline
    Run(cli::RunArgs),

    /// Show the configuration file
    Config {
        /// Overwrite the configuration file with the defaults
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=edgeview=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Run(args)) => cli::run(args),
        Some(Commands::Config { reset }) => cli::show_config(reset),
        None => cli::run(cli::RunArgs::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "edgeview",
            "run",
            "--duration",
            "3",
            "--raw",
            "--snapshot",
            "out.png",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.duration, Some(3));
                assert!(args.raw);
                assert!(!args.software);
                assert_eq!(args.snapshot, Some(Some(PathBuf::from("out.png"))));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_config_reset_flag() {
        let cli = Cli::try_parse_from(["edgeview", "config", "--reset"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { reset: true })));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["edgeview"]).unwrap();
        assert!(cli.command.is_none());
    }
}
