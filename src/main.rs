use anyhow::Context;
use anyhow::Result;
use rusty_facets::server;
use rusty_facets::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::from_env().context("Failed to load configuration")?;
    server::serve(config).await
}
