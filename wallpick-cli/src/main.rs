use anyhow::Result;
use clap::Parser;
use wallpick_cli::{Cli, WallpickCliApp};

#[tokio::main]
async fn main() -> Result<()> {
    let default_level = if cfg!(debug_assertions) {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    // RUST_LOG still wins over the default level.
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let app = WallpickCliApp::new()?;
    app.run(cli).await
}
