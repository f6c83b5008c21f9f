// 7.0 config.rs: all settings in one place. range widths, skim, issuance caps,
// loan durations and fees. 7.1 presets, 7.2 validation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::issuance::IssuanceParams;
use crate::math::{MAX_DECIMALS, MIN_DECIMALS};
use crate::types::{Bps, SECONDS_PER_DAY};

// Widths and shares used when ranges are (re)deployed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityParams {
    // Anchor width above spot after a shift
    pub anchor_width_bips: Bps,
    // Narrower anchor width used by slide
    pub slide_anchor_width_bips: Bps,
    // Discovery reaches this far above the anchor's upper price
    pub discovery_width_bips: Bps,
    // Share of withdrawn anchor/discovery reserve moved into the floor on shift
    pub skim_bps: Bps,
    // Cap on a single issuance as a share of circulating supply
    pub max_issuance_bps: Bps,
    // Share of idle tokens the anchor may pair with its reserve; discovery gets the rest
    pub anchor_token_share_bps: Bps,
}

impl Default for LiquidityParams {
    fn default() -> Self {
        Self {
            anchor_width_bips: Bps::new(1000),      // 10%
            slide_anchor_width_bips: Bps::new(500), // 5%
            discovery_width_bips: Bps::new(10_000), // 2x
            skim_bps: Bps::new(2500),               // 25%
            max_issuance_bps: Bps::new(1000),       // 10% of circulating
            anchor_token_share_bps: Bps::new(5000), // half
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingParams {
    pub min_duration_secs: u64,
    pub max_duration_secs: u64,
    // Fee per day on the borrowed amount, charged up front
    pub daily_fee_rate: Decimal,
    // Loans at or above this loan-to-value are eligible for self-repay
    pub self_repay_ltv: Decimal,
}

impl Default for LendingParams {
    fn default() -> Self {
        Self {
            min_duration_secs: 30 * SECONDS_PER_DAY,
            max_duration_secs: 365 * SECONDS_PER_DAY,
            daily_fee_rate: dec!(0.00027), // ~10% a year
            self_repay_ltv: dec!(0.9),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub name: String,
    pub token_symbol: String,
    pub reserve_symbol: String,
    // Shared precision of the token and reserve asset
    pub decimals: u32,
    pub tick_spacing: i32,
    pub liquidity: LiquidityParams,
    pub lending: LendingParams,
    pub issuance: IssuanceParams,
    // Maximum number of events to retain in memory
    pub max_events: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            name: "Floor Vault".to_string(),
            token_symbol: "FLR".to_string(),
            reserve_symbol: "WETH".to_string(),
            decimals: 18,
            tick_spacing: 60,
            liquidity: LiquidityParams::default(),
            lending: LendingParams::default(),
            issuance: IssuanceParams::default(),
            max_events: 100_000,
        }
    }
}

impl VaultConfig {
    // 7.1: reserve is a 6-decimal stablecoin
    pub fn stablecoin_reserve() -> Self {
        let mut config = Self::default();
        config.reserve_symbol = "USDC".to_string();
        config.decimals = 6;
        config.issuance.decimals = 6;
        config.tick_spacing = 10;
        config
    }

    // short loans and a fast-reacting controller for test deployments
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.name = "Floor Vault Testnet".to_string();
        config.lending.min_duration_secs = SECONDS_PER_DAY;
        config.lending.max_duration_secs = 30 * SECONDS_PER_DAY;
        config.issuance.steepness = dec!(5);
        config.max_events = 10_000;
        config
    }

    // smaller issuance, bigger skim
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.liquidity.skim_bps = Bps::new(4000);
        config.liquidity.max_issuance_bps = Bps::new(500);
        config.lending.self_repay_ltv = dec!(0.95);
        config
    }

    // 7.2
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_DECIMALS..=MAX_DECIMALS).contains(&self.decimals) {
            return Err(ConfigError::InvalidDecimals(self.decimals));
        }
        if self.issuance.decimals != self.decimals {
            return Err(ConfigError::InvalidIssuance {
                reason: "Controller decimals must match the vault".to_string(),
            });
        }
        if self.tick_spacing <= 0 {
            return Err(ConfigError::InvalidLiquidity {
                reason: "Tick spacing must be positive".to_string(),
            });
        }

        let lp = &self.liquidity;
        if lp.anchor_width_bips.value() == 0
            || lp.slide_anchor_width_bips.value() == 0
            || lp.discovery_width_bips.value() == 0
        {
            return Err(ConfigError::InvalidLiquidity {
                reason: "Range widths must be positive".to_string(),
            });
        }
        if lp.skim_bps.value() > 10_000
            || lp.max_issuance_bps.value() > 10_000
            || lp.anchor_token_share_bps.value() > 10_000
        {
            return Err(ConfigError::InvalidLiquidity {
                reason: "Shares cannot exceed 100%".to_string(),
            });
        }
        if lp.anchor_token_share_bps.value() == 0 {
            return Err(ConfigError::InvalidLiquidity {
                reason: "Anchor needs a share of idle tokens".to_string(),
            });
        }

        let lending = &self.lending;
        if lending.min_duration_secs == 0 || lending.min_duration_secs > lending.max_duration_secs {
            return Err(ConfigError::InvalidLending {
                reason: "Duration bounds must satisfy 0 < min <= max".to_string(),
            });
        }
        if lending.daily_fee_rate < Decimal::ZERO || lending.daily_fee_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidLending {
                reason: "Daily fee rate must be in [0, 1)".to_string(),
            });
        }
        if lending.self_repay_ltv <= Decimal::ZERO || lending.self_repay_ltv > Decimal::ONE {
            return Err(ConfigError::InvalidLending {
                reason: "Self-repay LTV must be in (0, 1]".to_string(),
            });
        }

        let issuance = &self.issuance;
        if issuance.steepness <= Decimal::ZERO {
            return Err(ConfigError::InvalidIssuance {
                reason: "Steepness must be positive".to_string(),
            });
        }
        if issuance.max_demand_ratio <= Decimal::ZERO || issuance.max_demand_ratio >= Decimal::ONE {
            return Err(ConfigError::InvalidIssuance {
                reason: "Demand ratio clamp must be in (0, 1)".to_string(),
            });
        }
        // exp(60) is the largest power of e that stays well inside a 96-bit decimal
        if issuance.max_exponent <= Decimal::ZERO || issuance.max_exponent > dec!(60) {
            return Err(ConfigError::InvalidIssuance {
                reason: "Exponent clamp must be in (0, 60]".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidLiquidity {
                reason: "Event log needs room for at least one event".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported decimals {0}")]
    InvalidDecimals(u32),

    #[error("Invalid liquidity params: {reason}")]
    InvalidLiquidity { reason: String },

    #[error("Invalid lending params: {reason}")]
    InvalidLending { reason: String },

    #[error("Invalid issuance params: {reason}")]
    InvalidIssuance { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> VaultConfig {
        match self {
            Environment::Development => VaultConfig::default(),
            Environment::Testnet => VaultConfig::testnet(),
            Environment::Mainnet => VaultConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(VaultConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_valid() {
        assert!(VaultConfig::stablecoin_reserve().validate().is_ok());
        assert!(VaultConfig::testnet().validate().is_ok());
        assert!(VaultConfig::mainnet_conservative().validate().is_ok());
        assert_eq!(VaultConfig::stablecoin_reserve().decimals, 6);
    }

    #[test]
    fn test_invalid_decimals() {
        let mut config = VaultConfig::default();
        config.decimals = 24;
        assert_eq!(config.validate(), Err(ConfigError::InvalidDecimals(24)));

        let mut config = VaultConfig::default();
        config.decimals = 6;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidIssuance { .. })));
    }

    #[test]
    fn test_invalid_durations() {
        let mut config = VaultConfig::default();
        config.lending.min_duration_secs = config.lending.max_duration_secs + 1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLending { .. })));
    }

    #[test]
    fn test_invalid_skim() {
        let mut config = VaultConfig::default();
        config.liquidity.skim_bps = Bps::new(10_001);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLiquidity { .. })));
    }

    #[test]
    fn test_invalid_anchor_token_share() {
        let mut config = VaultConfig::default();
        config.liquidity.anchor_token_share_bps = Bps::new(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLiquidity { .. })));
        config.liquidity.anchor_token_share_bps = Bps::new(10_001);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLiquidity { .. })));
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = VaultConfig::testnet();
        let json = serde_json::to_string(&config).unwrap();
        let back: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, config.name);
        assert_eq!(back.lending.min_duration_secs, SECONDS_PER_DAY);
        assert_eq!(back.liquidity.skim_bps, config.liquidity.skim_bps);
    }
}
