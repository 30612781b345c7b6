//! Engine configuration.

use rent_core::Address;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Default domain name.
pub const DEFAULT_NAME: &str = "rent-market";

/// Default domain version.
pub const DEFAULT_VERSION: &str = "1";

/// Identity and domain parameters of one engine deployment.
///
/// Everything here feeds the domain separator, so changing any field
/// invalidates every signature collected under the old values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Operator address the custody collaborator must approve.
    pub market: Address,
    /// Human-readable domain name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Domain version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Deployment identity (e.g. network + deployment slot).
    pub instance_id: String,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl MarketConfig {
    /// Config for `market` with default name and version and a
    /// `instance_id` derived from the market address.
    #[must_use]
    pub fn for_market(market: Address) -> Self {
        Self {
            market,
            name: default_name(),
            version: default_version(),
            instance_id: market.to_string(),
        }
    }

    /// Parses and validates a JSON config.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidConfig` on malformed JSON or failed
    /// validation.
    pub fn from_json(json: &str) -> Result<Self, MarketError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MarketError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the domain fields are usable.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidConfig` if any domain string is empty.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.name.trim().is_empty() {
            return Err(MarketError::InvalidConfig("name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(MarketError::InvalidConfig("version must not be empty".into()));
        }
        if self.instance_id.trim().is_empty() {
            return Err(MarketError::InvalidConfig(
                "instance_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_applies_defaults() {
        let market = Address::from_bytes([5; 32]);
        let json = format!(r#"{{"market":"{market}","instance_id":"devnet-1"}}"#);
        let config = MarketConfig::from_json(&json).expect("parse");
        assert_eq!(config.market, market);
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.instance_id, "devnet-1");
    }

    #[test]
    fn from_json_rejects_empty_instance() {
        let market = Address::from_bytes([5; 32]);
        let json = format!(r#"{{"market":"{market}","instance_id":"  "}}"#);
        assert!(matches!(
            MarketConfig::from_json(&json),
            Err(MarketError::InvalidConfig(_))
        ));
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(MarketConfig::from_json("{").is_err());
        assert!(MarketConfig::from_json(r#"{"market":"xyz","instance_id":"a"}"#).is_err());
    }

    #[test]
    fn for_market_is_valid() {
        let config = MarketConfig::for_market(Address::from_bytes([5; 32]));
        assert!(config.validate().is_ok());
    }
}
