//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{Result, TradeError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. `BINANCE_API_KEY` / `BINANCE_API_SECRET`
/// 2. Environment variables prefixed with `APP__` (e.g. `APP__TRADING__CHUNKS`)
/// 3. Configuration file (TOML format), if present
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("trading.symbols")
            .try_parsing(true),
    );

    builder = builder
        .set_override_option("exchange.api_key", std::env::var("BINANCE_API_KEY").ok())?
        .set_override_option("exchange.api_secret", std::env::var("BINANCE_API_SECRET").ok())?;

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

/// Check settings that span sections, after any command line overrides
pub fn validate(config: &AppConfig) -> Result<()> {
    if !config.exchange.paper_trading && config.exchange.credentials().is_none() {
        return Err(TradeError::Configuration(
            "live trading needs exchange.api_key and exchange.api_secret".to_string(),
        ));
    }
    if config.settings.feed_capacity == 0 || config.settings.command_capacity == 0 {
        return Err(TradeError::Configuration(
            "channel capacities must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_config(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "naive_trader_{}_{}.toml",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_from_file() {
        let path = write_config(
            r#"
[exchange]
paper_trading = true

[trading]
symbols = ["XRPUSDT", "BTCUSDT"]
chunks = 3
budget = "250.5"
tick_size = "0.0001"

[trading.overrides.BTCUSDT]
chunks = 1

[settings]
max_worker_restarts = 7
"#,
        );

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.trading.symbols, vec!["XRPUSDT", "BTCUSDT"]);
        assert_eq!(config.trading.chunks, 3);
        assert_eq!(config.trading.budget, dec!(250.5));
        assert_eq!(config.trading.tick_size, Some(dec!(0.0001)));
        assert_eq!(config.settings.max_worker_restarts, 7);
        assert_eq!(config.settings.command_capacity, 256);
        assert_eq!(config.exchange.rest_url, "https://api.binance.com");

        let btc = config
            .trading
            .pool_settings(
                "BTCUSDT",
                Some(&crate::common::types::SymbolFilters {
                    tick_size: dec!(0.01),
                    step_size: dec!(0.00001),
                }),
            )
            .unwrap();
        assert_eq!(btc.chunks, 1);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Some("/nonexistent/naive_trader.toml")).unwrap();
        assert!(config.exchange.paper_trading);
        assert_eq!(config.trading.chunks, 5);
    }

    #[test]
    fn test_live_without_credentials_rejected() {
        let path = write_config("[exchange]\npaper_trading = false\n");
        if std::env::var("BINANCE_API_KEY").is_err() {
            let config = load_config(path.to_str()).unwrap();
            assert!(matches!(validate(&config), Err(TradeError::Configuration(_))));
        }
        std::fs::remove_file(path).ok();
    }
}
