//! Symbol metadata and account state ports.

use crate::domain::error::SignalforgeError;
use crate::domain::risk::{AccountState, SymbolMeta};

pub trait SymbolMetaProvider {
    fn symbol_meta(&self, symbol: &str) -> Result<SymbolMeta, SignalforgeError>;
}

pub trait AccountProvider {
    fn account(&self) -> Result<AccountState, SignalforgeError>;
}
