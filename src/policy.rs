//! Reward weighting policy
//!
//! Sealing asks a [`RewardPolicy`] how to weigh validators for the base
//! reward and the transaction fee pool, and whether a validator is penalized
//! as offline. [`DefaultRewardPolicy`] implements the network rules.

use crate::config::StakingConfig;
use crate::types::{unit, Amount, ValidatorId};
use std::fmt;

/// Metrics of one validator for the epoch being sealed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEpochMetrics {
    /// Validator id
    pub validator_id: ValidatorId,

    /// Stake the validator ran the epoch with
    pub received_stake: Amount,

    /// Uptime in seconds, at most the epoch duration
    pub uptime: u64,

    /// Fees of transactions originated during the epoch
    pub originated_fee: Amount,

    /// Reported offline time
    pub offline_time: u64,

    /// Reported offline blocks
    pub offline_blocks: u64,
}

/// Weighting functions applied at epoch seal
pub trait RewardPolicy: fmt::Debug + Send + Sync {
    /// Validator is penalized as offline for the epoch
    fn is_offline(&self, config: &StakingConfig, metrics: &ValidatorEpochMetrics) -> bool;

    /// Weight in the base reward split
    fn base_reward_weight(&self, metrics: &ValidatorEpochMetrics, epoch_duration: u64) -> Amount;

    /// Weight in the transaction fee split
    fn tx_reward_weight(&self, metrics: &ValidatorEpochMetrics, epoch_duration: u64) -> Amount;

    /// Share of epoch fees paid to validators
    fn validators_fee_share(&self, config: &StakingConfig) -> Amount {
        unit()
            .saturating_sub(config.burnt_fee_share)
            .saturating_sub(config.treasury_fee_share)
    }
}

/// Network reward rules
///
/// - Offline when missed blocks exceed the block threshold and offline time
///   reaches the time threshold
/// - Base weight `stake * (uptime / duration)^2`
/// - Fee weight `fee * uptime / duration`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRewardPolicy;

impl RewardPolicy for DefaultRewardPolicy {
    fn is_offline(&self, config: &StakingConfig, metrics: &ValidatorEpochMetrics) -> bool {
        metrics.offline_blocks > config.offline_penalty_threshold_blocks
            && metrics.offline_time >= config.offline_penalty_threshold_time
    }

    fn base_reward_weight(&self, metrics: &ValidatorEpochMetrics, epoch_duration: u64) -> Amount {
        let duration = Amount::from(epoch_duration.max(1));
        let uptime = Amount::from(metrics.uptime);
        metrics.received_stake.saturating_mul(uptime) / duration * uptime / duration
    }

    fn tx_reward_weight(&self, metrics: &ValidatorEpochMetrics, epoch_duration: u64) -> Amount {
        let duration = Amount::from(epoch_duration.max(1));
        metrics.originated_fee.saturating_mul(Amount::from(metrics.uptime)) / duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::percent;
    use primitive_types::U256;

    fn metrics(uptime: u64, offline_time: u64, offline_blocks: u64) -> ValidatorEpochMetrics {
        ValidatorEpochMetrics {
            validator_id: 1,
            received_stake: U256::from(1_000u64),
            uptime,
            originated_fee: U256::from(500u64),
            offline_time,
            offline_blocks,
        }
    }

    #[test]
    fn test_offline_threshold() {
        let config = StakingConfig::default();
        let policy = DefaultRewardPolicy;
        let days = 24 * 60 * 60;

        assert!(!policy.is_offline(&config, &metrics(0, 5 * days, 1_000)));
        assert!(!policy.is_offline(&config, &metrics(0, 5 * days - 1, 1_001)));
        assert!(policy.is_offline(&config, &metrics(0, 5 * days, 1_001)));
    }

    #[test]
    fn test_weights_scale_with_uptime() {
        let policy = DefaultRewardPolicy;
        assert_eq!(policy.base_reward_weight(&metrics(100, 0, 0), 100), U256::from(1_000u64));
        assert_eq!(policy.base_reward_weight(&metrics(50, 0, 0), 100), U256::from(250u64));
        assert_eq!(policy.tx_reward_weight(&metrics(50, 0, 0), 100), U256::from(250u64));
        assert_eq!(policy.tx_reward_weight(&metrics(0, 0, 0), 100), U256::zero());
    }

    #[test]
    fn test_fee_share() {
        let config = StakingConfig::default();
        assert_eq!(DefaultRewardPolicy.validators_fee_share(&config), percent(70));
    }
}
