//! Network staking parameters
//!
//! Defaults are the network launch constants. Ratios are fixed-point with
//! 18 decimals (see [`crate::types::unit`]). A config can be loaded from JSON
//! where amounts are hex-encoded `U256` strings.

use crate::error::{Result, ValidationError};
use crate::types::{parse_units, percent, unit, Address, Amount};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Minimum lockup duration in seconds (14 days)
pub const MIN_LOCKUP_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

/// Maximum lockup duration in seconds (365 days)
pub const MAX_LOCKUP_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Withdrawal delay in seconds (7 days)
pub const WITHDRAWAL_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Withdrawal delay in sealed epochs
pub const WITHDRAWAL_PERIOD_EPOCHS: u64 = 3;

/// Missed blocks above which a validator counts as offline
pub const OFFLINE_PENALTY_THRESHOLD_BLOCKS: u64 = 1000;

/// Offline time from which a validator counts as offline (5 days)
pub const OFFLINE_PENALTY_THRESHOLD_SECS: u64 = 5 * 24 * 60 * 60;

/// Staking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Minimum self-stake to run a validator
    pub min_self_stake: Amount,

    /// Maximum delegated stake per unit of self-stake
    pub max_delegated_ratio: Amount,

    /// Validator cut of every raw epoch reward
    pub validator_commission: Amount,

    /// Share of epoch fees that is burnt
    pub burnt_fee_share: Amount,

    /// Share of epoch fees sent to the treasury
    pub treasury_fee_share: Amount,

    /// Reward rate of unlocked stake relative to a maximum lockup
    pub unlocked_reward_ratio: Amount,

    /// Shortest allowed lockup in seconds
    pub min_lockup_duration: u64,

    /// Longest allowed lockup in seconds
    pub max_lockup_duration: u64,

    /// Sealed epochs a withdrawal request must wait
    pub withdrawal_period_epochs: u64,

    /// Seconds a withdrawal request must wait
    pub withdrawal_period_time: u64,

    /// Base reward emitted per second of epoch
    pub base_reward_per_second: Amount,

    /// Missed blocks threshold of the offline penalty
    pub offline_penalty_threshold_blocks: u64,

    /// Offline time threshold of the offline penalty
    pub offline_penalty_threshold_time: u64,

    /// Treasury receiving its fee share; the share is burnt when unset
    pub treasury: Option<Address>,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            min_self_stake: U256::from(3175u64) * U256::exp10(14),
            max_delegated_ratio: unit() * U256::from(16u64),
            validator_commission: percent(15),
            burnt_fee_share: percent(20),
            treasury_fee_share: percent(10),
            unlocked_reward_ratio: percent(30),
            min_lockup_duration: MIN_LOCKUP_DURATION_SECS,
            max_lockup_duration: MAX_LOCKUP_DURATION_SECS,
            withdrawal_period_epochs: WITHDRAWAL_PERIOD_EPOCHS,
            withdrawal_period_time: WITHDRAWAL_PERIOD_SECS,
            base_reward_per_second: U256::from(2_668_658_453_701_531_600u64),
            offline_penalty_threshold_blocks: OFFLINE_PENALTY_THRESHOLD_BLOCKS,
            offline_penalty_threshold_time: OFFLINE_PENALTY_THRESHOLD_SECS,
            treasury: None,
        }
    }
}

impl StakingConfig {
    /// Check parameter consistency
    pub fn validate(&self) -> Result<()> {
        let one = unit();
        for (name, ratio) in [
            ("validator_commission", self.validator_commission),
            ("burnt_fee_share", self.burnt_fee_share),
            ("treasury_fee_share", self.treasury_fee_share),
            ("unlocked_reward_ratio", self.unlocked_reward_ratio),
        ] {
            if ratio > one {
                return Err(ValidationError::InvalidConfig(format!(
                    "{} {} exceeds one",
                    name, ratio
                ))
                .into());
            }
        }

        if self.burnt_fee_share + self.treasury_fee_share > one {
            return Err(ValidationError::InvalidConfig(
                "burnt and treasury fee shares exceed one".to_string(),
            )
            .into());
        }

        if self.max_lockup_duration == 0 || self.min_lockup_duration > self.max_lockup_duration {
            return Err(ValidationError::InvalidConfig(format!(
                "lockup window {}..={} is empty",
                self.min_lockup_duration, self.max_lockup_duration
            ))
            .into());
        }

        if self.min_self_stake.is_zero() {
            return Err(ValidationError::InvalidConfig(
                "min_self_stake must be positive".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StakingConfig = serde_json::from_str(json)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&json)?;

        info!("Loaded staking config from {}", path.display());

        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ValidationError::InvalidConfig(e.to_string()).into())
    }

    /// Override the minimum self-stake with a decimal token string
    pub fn with_min_self_stake(mut self, tokens: &str) -> Result<Self> {
        self.min_self_stake = parse_units(tokens)?;
        Ok(self)
    }

    /// Override the base reward rate
    pub fn with_base_reward_per_second(mut self, rate: Amount) -> Self {
        self.base_reward_per_second = rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StakingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_self_stake, parse_units("0.3175").unwrap());
        assert_eq!(config.max_lockup_duration, 31_536_000);
        assert_eq!(config.min_lockup_duration, 1_209_600);
    }

    #[test]
    fn test_rejects_bad_ratios() {
        let mut config = StakingConfig::default();
        config.unlocked_reward_ratio = unit() + U256::one();
        assert!(config.validate().is_err());

        let mut config = StakingConfig::default();
        config.burnt_fee_share = percent(60);
        config.treasury_fee_share = percent(50);
        assert!(config.validate().is_err());

        let mut config = StakingConfig::default();
        config.min_lockup_duration = config.max_lockup_duration + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = StakingConfig::default()
            .with_min_self_stake("1.5")
            .unwrap()
            .with_base_reward_per_second(U256::one());
        let json = config.to_json_string().unwrap();
        let parsed = StakingConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);

        assert!(StakingConfig::from_json_str("{}").is_err());
    }
}
