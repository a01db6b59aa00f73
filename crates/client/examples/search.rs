//! Example: streaming every contact modified since a given date.
//!
//! # Setup
//!
//! Same environment variables as the `get` example.
//!
//! ```bash
//! cargo run --example search
//! ```

use std::collections::BTreeMap;

use anyhow::Context;
use agentbox_client::{ClientConfig, RequestParameters, SessionRegistry};
use futures::StreamExt;

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

    let params = RequestParameters {
        include: vec!["clientRef".into(), "comments".into(), "lastContacted".into()],
        filter: BTreeMap::from([
            ("status".to_string(), "all".to_string()),
            ("modifiedAfter".to_string(), "2025-05-23".to_string()),
        ]),
    };

    let mut stream = std::pin::pin!(session.search("/contacts", params));
    let mut count = 0u64;
    while let Some(contact) = stream.next().await {
        let contact = contact?;
        count += 1;
        println!("{}", contact["id"]);
    }
    println!("{count} contacts");

    Ok(())
}
