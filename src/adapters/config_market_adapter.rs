//! Symbol metadata and account state read from the `[symbol]` and
//! `[account]` sections, for offline runs without a broker.

use crate::domain::config_validation::{build_account_state, build_symbol_meta};
use crate::domain::error::SignalforgeError;
use crate::domain::risk::{AccountState, SymbolMeta};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::{AccountProvider, SymbolMetaProvider};

pub struct ConfigMarketAdapter<C> {
    config: C,
}

impl<C: ConfigPort> ConfigMarketAdapter<C> {
    pub fn new(config: C) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }
}

impl<C: ConfigPort> SymbolMetaProvider for ConfigMarketAdapter<C> {
    /// Missing or malformed `[symbol]` data is reported as invalid metadata
    /// so only the sizing step fails.
    fn symbol_meta(&self, symbol: &str) -> Result<SymbolMeta, SignalforgeError> {
        let meta = build_symbol_meta(&self.config).map_err(|e| match e {
            SignalforgeError::InvalidSymbolMetadata { .. } => e,
            other => SignalforgeError::InvalidSymbolMetadata {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        })?;
        if !meta.name.eq_ignore_ascii_case(symbol) {
            return Err(SignalforgeError::InvalidSymbolMetadata {
                symbol: symbol.to_string(),
                reason: format!("configured metadata is for {}", meta.name),
            });
        }
        meta.validate()?;
        Ok(meta)
    }
}

impl<C: ConfigPort> AccountProvider for ConfigMarketAdapter<C> {
    fn account(&self) -> Result<AccountState, SignalforgeError> {
        build_account_state(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const CONFIG: &str = r#"
[symbol]
name = USDJPY
point = 0.001
digits = 3
contract_size = 100000
tick_value = 0.67
tick_size = 0.001
lot_min = 0.01
lot_max = 50
lot_step = 0.01

[account]
balance = 20000
"#;

    fn make_adapter(content: &str) -> ConfigMarketAdapter<FileConfigAdapter> {
        ConfigMarketAdapter::new(FileConfigAdapter::from_string(content).unwrap())
    }

    #[test]
    fn provides_symbol_meta() {
        let meta = make_adapter(CONFIG).symbol_meta("usdjpy").unwrap();
        assert_eq!(meta.name, "USDJPY");
        assert_eq!(meta.digits, 3);
        assert_eq!(meta.lot_max, 50.0);
    }

    #[test]
    fn other_symbol_is_invalid_metadata() {
        let err = make_adapter(CONFIG).symbol_meta("EURUSD").unwrap_err();
        assert!(matches!(err, SignalforgeError::InvalidSymbolMetadata { symbol, .. } if symbol == "EURUSD"));
    }

    #[test]
    fn missing_field_is_invalid_metadata() {
        let adapter = make_adapter(&CONFIG.replace("tick_value = 0.67\n", ""));
        let err = adapter.symbol_meta("USDJPY").unwrap_err();
        assert!(matches!(err, SignalforgeError::InvalidSymbolMetadata { reason, .. } if reason.contains("tick_value")));
    }

    #[test]
    fn provides_account_with_defaults() {
        let account = make_adapter(CONFIG).account().unwrap();
        assert_eq!(account.balance, 20000.0);
        assert_eq!(account.equity, 20000.0);
        assert_eq!(account.leverage, 100.0);
    }

    #[test]
    fn missing_account_is_config_error() {
        let adapter = make_adapter("[symbol]\nname = X\n");
        assert!(matches!(
            adapter.account(),
            Err(SignalforgeError::ConfigMissing { .. })
        ));
    }
}
