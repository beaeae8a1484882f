use clap::Parser;
use tributary_cli::cli::{CatalogCommand, Cli, Commands, DagCommand};
use tributary_cli::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // JSON logs unless TRIBUTARY_LOG_FORMAT=pretty.
    tributary_core::telemetry::init_global_from_env()?;
    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Catalog {
            command: CatalogCommand::Validate { path },
        } => commands::catalog_validate(path).await?,
        Commands::Catalog {
            command: CatalogCommand::Show { short_name, path },
        } => commands::catalog_show(&short_name, path).await?,
        Commands::Dag {
            command: DagCommand::Validate { file },
        } => commands::dag_validate(&file).await?,
        Commands::Plugins => commands::plugins()?,
    };
    print!("{output}");
    Ok(())
}
