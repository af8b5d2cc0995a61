//! FashionMatch HTTP API - Entry Point
//!
//! Minimal entry point that delegates to the server module.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    fashionmatch_api::run().await
}
