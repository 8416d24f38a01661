use clap::Parser;
use autodoc_proxy::cli::{commands, Cli, Commands};
use autodoc_proxy::server::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_tracing();
            commands::execute_run(args).await?
        }
        Commands::Init(args) => commands::execute_init(args)?,
    }

    Ok(())
}
