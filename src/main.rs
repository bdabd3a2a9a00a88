use anyhow::Result;
use rmcp::{transport::stdio, ServiceExt};
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

mod adapters;
mod model;
mod server;
mod store;
mod util;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport; logs go to stderr. The reload handle
    // lets the protocol's logging/setLevel request adjust severity at runtime.
    let (filter, log_handle) = reload::Layer::new(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let region = std::env::var("TOS_REGION").ok();
    let client = adapters::tos::client_from_env(region.clone()).await;
    let store = store::TosStore::from_env(Box::new(client));

    info!(
        region = region.as_deref().unwrap_or("cn-beijing"),
        configured_buckets = store.configured_buckets.len(),
        max_buckets = store.max_buckets,
        "starting tos mcp server"
    );

    let service = server::TosServer::new(store, log_handle)
        .serve(stdio())
        .await
        .inspect_err(|err| {
            tracing::error!("serve error: {:?}", err);
        })?;

    service.waiting().await?;

    Ok(())
}
