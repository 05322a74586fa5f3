mod dispatch;
mod error;
mod host;
mod probe;
mod store;
mod time_source;
mod web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
