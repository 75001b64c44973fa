use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rill::app::AppContext;
use rill::cli::{commands, Cli, Commands};
use rill::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(cli.db)?;

    let result = match cli.command {
        Commands::Login { endpoint, token } => {
            commands::login(&ctx, &config, endpoint, token).await
        }
        Commands::Import => commands::import(&ctx).await,
        Commands::Sync { watch } => commands::sync(&ctx, &config, watch).await,
        Commands::List { items, source } => {
            if items || source.is_some() {
                commands::list_items(&ctx, source)
            } else {
                commands::list_sources(&ctx)
            }
        }
        Commands::Read { id } => commands::set_read(&ctx, id, true).await,
        Commands::Unread { id } => commands::set_read(&ctx, id, false).await,
        Commands::Star { id } => commands::set_starred(&ctx, id, true).await,
        Commands::Unstar { id } => commands::set_starred(&ctx, id, false).await,
        Commands::ReadAll {
            sources,
            before,
            after,
        } => commands::read_all(&ctx, &sources, before.as_deref(), after.as_deref()).await,
    };

    // Queued rule commands still need to reach the service.
    ctx.shutdown().await;
    result?;

    Ok(())
}
