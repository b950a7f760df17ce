use alloy::primitives::{Address, address};
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::errors::{PrimeError, Result};

/// Builder address used when the caller does not configure one.
pub const SYSTEM_BUILDER: Address = address!("1924b8561eef20e70eca41f0e54b3818ba9425c1");

/// Default builder fee in basis points.
pub const DEFAULT_BUILDER_FEE_BPS: u32 = 1;

/// Builder fees above this are rejected at construction.
pub const MAX_BUILDER_FEE_BPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// Directive for the tracing-subscriber env filter.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "hyperprime=debug",
            LogLevel::Info => "hyperprime=info",
            LogLevel::Warn => "hyperprime=warn",
            LogLevel::Error => "hyperprime=error",
            LogLevel::Silent => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(format!("invalid log level '{other}'")),
        }
    }
}

/// Per-order builder fee routed to a configured address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub address: Address,
    /// Fee in basis points, 0..=10.
    pub fee_bps: u32,
}

impl BuilderConfig {
    /// Wire unit: tenths of a basis point.
    pub fn fee_tenth_bps(&self) -> u64 {
        self.fee_bps as u64 * 10
    }

    /// Approval rate string, e.g. fee_bps = 5 -> "0.05%".
    pub fn max_fee_rate(&self) -> String {
        format!("{}%", self.fee_bps as f64 / 100.0)
    }
}

/// Builder setting tri-state: absent -> system default, explicit null ->
/// disabled, object -> custom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuilderSetting {
    #[default]
    Unset,
    Disabled,
    Custom(BuilderConfig),
}

impl BuilderSetting {
    /// Resolve to the effective builder config, validating the fee range.
    pub fn resolve(self) -> Result<Option<BuilderConfig>> {
        match self {
            BuilderSetting::Unset => Ok(Some(BuilderConfig {
                address: SYSTEM_BUILDER,
                fee_bps: DEFAULT_BUILDER_FEE_BPS,
            })),
            BuilderSetting::Disabled => Ok(None),
            BuilderSetting::Custom(cfg) => {
                if cfg.fee_bps > MAX_BUILDER_FEE_BPS {
                    return Err(PrimeError::InvalidConfig(format!(
                        "builder fee {} bps out of range 0..={MAX_BUILDER_FEE_BPS}",
                        cfg.fee_bps
                    )));
                }
                Ok(Some(cfg))
            }
        }
    }
}

/// SDK construction options. See [`SdkConfig::build`] for validation.
#[derive(Debug, Clone, Default)]
pub struct SdkConfig {
    /// Hex private key. Optional; enables trading operations.
    pub private_key: Option<String>,
    /// Overrides the address derived from the key. Required for account
    /// reads when no key is configured.
    pub wallet_address: Option<Address>,
    pub testnet: bool,
    pub default_slippage: Option<f64>,
    pub log_level: Option<LogLevel>,
    pub builder: BuilderSetting,
}

/// Validated configuration consumed by the facade.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub wallet_address: Option<Address>,
    pub has_wallet: bool,
    pub testnet: bool,
    pub default_slippage: f64,
    pub log_level: LogLevel,
    pub builder: Option<BuilderConfig>,
}

impl SdkConfig {
    pub fn build(self) -> Result<ResolvedConfig> {
        let derived = match &self.private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .map_err(|e| PrimeError::InvalidConfig(format!("invalid private key: {e}")))?;
                Some(signer.address())
            }
            None => None,
        };

        let slippage = self.default_slippage.unwrap_or(0.01);
        if !(0.0..1.0).contains(&slippage) {
            return Err(PrimeError::InvalidConfig(format!(
                "default_slippage {slippage} must be in [0, 1)"
            )));
        }

        Ok(ResolvedConfig {
            wallet_address: self.wallet_address.or(derived),
            has_wallet: self.private_key.is_some(),
            testnet: self.testnet,
            default_slippage: slippage,
            log_level: self.log_level.unwrap_or(LogLevel::Info),
            builder: self.builder.resolve()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_unset_resolves_to_system_default() {
        let cfg = BuilderSetting::Unset.resolve().unwrap().unwrap();
        assert_eq!(cfg.address, SYSTEM_BUILDER);
        assert_eq!(cfg.fee_bps, 1);
    }

    #[test]
    fn builder_disabled_resolves_to_none() {
        assert!(BuilderSetting::Disabled.resolve().unwrap().is_none());
    }

    #[test]
    fn builder_fee_out_of_range_fails_construction() {
        let setting = BuilderSetting::Custom(BuilderConfig {
            address: SYSTEM_BUILDER,
            fee_bps: 11,
        });
        assert!(matches!(
            setting.resolve(),
            Err(PrimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_wire_conversions() {
        let cfg = BuilderConfig {
            address: SYSTEM_BUILDER,
            fee_bps: 5,
        };
        assert_eq!(cfg.fee_tenth_bps(), 50);
        assert_eq!(cfg.max_fee_rate(), "0.05%");
    }

    #[test]
    fn config_defaults() {
        let resolved = SdkConfig::default().build().unwrap();
        assert!(!resolved.has_wallet);
        assert!(resolved.wallet_address.is_none());
        assert_eq!(resolved.default_slippage, 0.01);
        assert_eq!(resolved.log_level, LogLevel::Info);
        assert!(resolved.builder.is_some());
    }

    #[test]
    fn config_rejects_bad_key() {
        let cfg = SdkConfig {
            private_key: Some("not-a-key".to_string()),
            ..Default::default()
        };
        assert!(matches!(cfg.build(), Err(PrimeError::InvalidConfig(_))));
    }

    #[test]
    fn config_derives_wallet_from_key() {
        // anvil's well-known first dev key
        let cfg = SdkConfig {
            private_key: Some(
                "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            ..Default::default()
        };
        let resolved = cfg.build().unwrap();
        assert!(resolved.has_wallet);
        assert_eq!(
            format!("{:?}", resolved.wallet_address.unwrap()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
