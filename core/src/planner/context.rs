use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The decision request a planning cycle is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Instrument identifier, e.g. `BTC/USDT`.
    pub symbol: String,

    /// Opaque inputs forwarded to handlers (market snapshot, caller hints).
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl RequestContext {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// `BTC` for `BTC/USDT`.
    pub fn base_symbol(&self) -> &str {
        self.symbol.split('/').next().unwrap_or(&self.symbol)
    }

    /// `USDT` when the symbol carries no quote part.
    pub fn quote_symbol(&self) -> &str {
        self.symbol.split_once('/').map_or("USDT", |(_, q)| q)
    }

    /// Substitute `{symbol}`, `{base}` and `{quote}` placeholders.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{symbol}", &self.symbol)
            .replace("{base}", self.base_symbol())
            .replace("{quote}", self.quote_symbol())
    }
}
