//! Example: comparing the sequential and the speculative retrieval
//! strategies on the same listing.
//!
//! The speculative strategy trades away page order for wall-clock time;
//! on a large result set it should finish well ahead of the sequential
//! walk.
//!
//! ```bash
//! cargo run --example background_search
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

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
        include: Vec::new(),
        filter: BTreeMap::from([("status".to_string(), "all".to_string())]),
    };

    let started = Instant::now();
    let speculative = session
        .search_in_background("/contacts", params.clone())
        .filter_map(|item| async { item.ok() })
        .count()
        .await;
    println!("search_in_background: {speculative} items in {:?}", started.elapsed());

    let started = Instant::now();
    let sequential = {
        let stream = std::pin::pin!(session.search("/contacts", params));
        stream.filter_map(|item| async { item.ok() }).count().await
    };
    println!("search:               {sequential} items in {:?}", started.elapsed());

    Ok(())
}
