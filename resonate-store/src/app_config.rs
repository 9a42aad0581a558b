use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Percentage surcharge the marketplace retains on every order
    #[serde(default = "default_fee_rate")]
    pub platform_fee_rate: f64,
    /// Delivery window applied when an order request carries no deadline
    #[serde(default = "default_delivery_days")]
    pub default_delivery_days: i64,
}

fn default_fee_rate() -> f64 {
    0.15
}

fn default_delivery_days() -> i64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of RESONATE)
            .add_source(config::Environment::with_prefix("RESONATE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
