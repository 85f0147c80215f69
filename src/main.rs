// Copyright 2026 Vitrin Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use vitrin::cli;

#[derive(Parser)]
#[command(
    name = "vitrin",
    about = "Vitrin crawls product pages into structured records behind a CRUD API",
    version,
    after_help = "Run 'vitrin <command> --help' for details on each command."
)]
struct Cli {
    /// Output logs as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Verbose (debug-level) logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        /// Port for the HTTP API
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Crawl a single product page and print the resolved variant tree
    Crawl {
        /// Product page URL
        url: String,
    },
    /// Emit a completion script for your shell
    Completions {
        /// Target shell (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Global flags travel as environment variables so every module can
    // check them.
    if cli.json {
        std::env::set_var("VITRIN_JSON", "1");
    }
    if cli.verbose {
        std::env::set_var("VITRIN_VERBOSE", "1");
    }

    let result = match cli.command {
        Commands::Serve { port } => cli::serve::run(port).await,
        Commands::Crawl { url } => cli::crawl_cmd::run(&url).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vitrin", &mut std::io::stdout());
            Ok(())
        }
    };

    // Failures land on stderr and exit nonzero.
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
