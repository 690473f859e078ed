use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    counsel_api::run().await
}
