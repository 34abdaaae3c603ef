mod app;
mod artifact;
mod capture;
mod commands;
mod config;
mod image;
mod logging;
mod meter;
mod recorder;
mod session;
mod ui;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    app::run().await
}
