//! Broker process configuration.

use clap::Parser;

/// Configuration for the broker process (§6: environment variables /
/// configuration). Every option is settable by flag or environment
/// variable; `RUST_LOG` (the `env_logger` convention) governs log
/// verbosity rather than a bespoke flag.
#[derive(Parser, Debug, Clone)]
#[command(name = "lora-medium-broker")]
#[command(about = "Virtual RF medium broker for LoRa-style radio nodes")]
pub struct BrokerConfig {
    /// Address to listen on.
    #[arg(long, env = "LORA_BROKER_LISTEN", default_value = "0.0.0.0:8765")]
    pub listen: String,

    /// RNG seed for reproducible runs. Unset draws from OS entropy.
    #[arg(long, env = "LORA_BROKER_SEED")]
    pub seed: Option<u64>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8765".to_string(),
            seed: None,
        }
    }
}
