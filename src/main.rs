#[macro_use]
extern crate log;

mod buffer;
mod config;
mod cursor;
mod error;
mod handler;
mod protocol;

use clap::Parser;
use simple_logger::SimpleLogger;

use crate::config::{Cli, Config};
use crate::handler::HandlerContext;

//dig @127.0.0.1 -p 2053 +noedns codecrafters.io
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    SimpleLogger::new().with_level(config.log_level).init()?;

    let context = match HandlerContext::from(&config).await {
        Ok(context) => context,
        Err(e) => {
            error!("failed to bind {}: {}", config.bind, e);
            return Err(e.into());
        }
    };
    info!(
        "listening on {}, forwarding to {} (timeout {:?}, merge {:?})",
        context.local_addr()?,
        config.resolver,
        config.upstream_timeout,
        config.merge_strategy
    );
    context.run().await;
    Ok(())
}
