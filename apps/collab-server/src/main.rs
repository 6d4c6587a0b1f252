//! Meme Collaboration Server
//! Serves the collaboration REST API over a JSON-snapshot repository

use clap::Parser;
use collab_server::{app, config::Config};
use collaboration::{CollaborationService, CollaborationStore, InMemoryMemeCatalog};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .init();

    info!("Starting Meme Collaboration Server...");

    let store = CollaborationStore::open(&config.data_dir)?;
    info!("Storage initialized at: {}", config.data_dir.display());

    let memes = match &config.memes_file {
        Some(path) => InMemoryMemeCatalog::from_file(path)?,
        None => {
            info!("No memes file configured; remix creation will not resolve any meme");
            InMemoryMemeCatalog::new()
        }
    };

    let service = Arc::new(CollaborationService::new(
        Arc::new(store),
        Arc::new(memes),
        config.service_config()?,
    ));

    info!("Collaboration server listening on http://{}", config.bind);
    info!("API endpoints:");
    info!("  GET  /collaborations                     - List public collaborations");
    info!("  POST /collaborations                     - Create collaboration");
    info!("  GET  /collaborations/trending            - Trending");
    info!("  GET  /collaborations/templates           - Templates");
    info!("  GET  /collaborations/user/invites        - My pending invites");
    info!("  GET  /collaborations/:id                 - Collaboration details");
    info!("  POST /collaborations/:id/invite          - Invite collaborator");
    info!("  POST /collaborations/:id/invites/accept  - Accept invite");
    info!("  POST /collaborations/:id/join            - Join or request to join");
    info!("  POST /collaborations/:id/versions        - Add version");
    info!("  POST /collaborations/:id/comments        - Add comment");
    info!("  POST /collaborations/:id/fork            - Fork");
    info!("  GET  /collaborations/:id/stats           - Stats");
    info!("  GET  /collaborations/:id/activity        - Activity feed");
    info!("  GET  /collaborations/:id/insights        - Insights");

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app(service)).await?;

    Ok(())
}
