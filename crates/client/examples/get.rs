//! Example: fetching single resources from the admin API.
//!
//! # Setup
//!
//! ```bash
//! export AGENTBOX_BASE_URL=https://yourdomain.agentboxcrm.com.au
//! export AGENTBOX_USERNAME=you@example.com
//! export AGENTBOX_PASSWORD=...
//! cargo run --example get
//! ```
//!
//! A `.env` file with the same variables works too.

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

    let contact = session.get("/contacts/1", None).await?;
    println!("{}", serde_json::to_string_pretty(&contact)?);

    // Ten lookups at once; the session caps how many hit the wire
    // concurrently.
    let lookups = (1..=10).map(|id| {
        let session = std::sync::Arc::clone(&session);
        async move { session.get(&format!("/contacts/{id}"), None).await.ok() }
    });
    let contacts = futures::future::join_all(lookups).await;
    println!("fetched {} of 10 contacts", contacts.iter().flatten().count());

    Ok(())
}
