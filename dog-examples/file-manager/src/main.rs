use std::sync::Arc;

use anyhow::Result;
use dog_upload::UploadConfig;
use file_manager::ServerSettings;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = ServerSettings::from_env()?;
    let config = UploadConfig::from_env()?;

    let app = file_manager::build(&settings, config);
    file_manager::spawn_chunk_sweeper(Arc::clone(&app.state.uploader), settings.sweep_every);

    app.listen(settings.addr()).await?;

    Ok(())
}
