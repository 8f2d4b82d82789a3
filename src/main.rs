use clap::Parser;
use lora_medium_broker::{Broker, BrokerConfig};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    lora_medium_broker::logging::init_logger();
    let config = BrokerConfig::parse();

    let broker = Arc::new(Broker::new(&config));
    match broker.run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: "lora_medium_broker", "event=FATAL error={err}");
            ExitCode::FAILURE
        }
    }
}
