//! Example: fetching a rendered admin panel fragment.
//!
//! ```bash
//! cargo run --example panel
//! ```

use anyhow::Context;
use agentbox_client::{ClientConfig, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::load()?;
    let registry = SessionRegistry::new(&config)?;
    let session = registry.get_or_create(
        config.username.as_deref().context("AGENTBOX_USERNAME is not set")?,
        config.password.as_deref(),
        None,
    )?;

    let fragment = session.panel("c_card", "c_tabs", &[("cid", "10008")]).await?;
    println!("{fragment}");

    Ok(())
}
