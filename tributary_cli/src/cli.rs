use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tributary", version, about = "Tributary sync tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect the integration auth catalog.
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Work with sync DAG files.
    Dag {
        #[command(subcommand)]
        command: DagCommand,
    },

    /// List every built-in plugin descriptor.
    Plugins,
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Load and validate a catalog file.
    Validate {
        /// Catalog file (else derived from TRIBUTARY_ENVIRONMENT / TRIBUTARY_CATALOG_DIR).
        #[arg(long, env = "TRIBUTARY_CATALOG_PATH")]
        path: Option<PathBuf>,
    },

    /// Print one integration's auth strategy (secrets omitted).
    Show {
        short_name: String,

        #[arg(long, env = "TRIBUTARY_CATALOG_PATH")]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum DagCommand {
    /// Validate a YAML sync DAG and print its nodes in topological order.
    Validate {
        /// Path to the YAML DAG file.
        file: PathBuf,
    },
}
