//! Stake lockups
//!
//! A delegator can lock part of its stake for a bounded duration. Locked
//! stake earns the lockup multiplier instead of the unlocked reward ratio.
//! Unlocking before the end forfeits part of the rewards earned under the
//! lock; the forfeited amount is removed from the stake and burnt.

use crate::config::StakingConfig;
use crate::error::{Result, StateError, ValidationError};
use crate::staking::StakingLedger;
use crate::types::{unit, Address, Amount, CallContext, Rewards, ValidatorId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Lock commitment on a delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDelegation {
    /// Locked part of the stake
    pub locked_amount: Amount,

    /// First epoch earning the lockup bonus
    pub from_epoch: u64,

    /// Unix time the lock ends
    pub end_time: u64,

    /// Lock duration in seconds
    pub duration: u64,
}

impl LockedDelegation {
    /// Lock still holds stake at `now`; the end second is included
    pub fn is_active(&self, now: u64) -> bool {
        self.end_time != 0 && !self.locked_amount.is_zero() && now <= self.end_time
    }
}

/// Reward multiplier of stake locked for `lock_secs`
///
/// `unlocked_reward_ratio + (1 - unlocked_reward_ratio) * lock_secs / max_lockup_duration`
pub fn lockup_multiplier(config: &StakingConfig, lock_secs: u64) -> Amount {
    let lock_secs = lock_secs.min(config.max_lockup_duration);
    let max_extra = unit() - config.unlocked_reward_ratio;
    config.unlocked_reward_ratio
        + max_extra * Amount::from(lock_secs) / Amount::from(config.max_lockup_duration)
}

/// Split a full reward into base and bonus parts
///
/// With `lock_secs == 0` only the unlocked ratio is paid.
pub fn scale_lockup_reward(config: &StakingConfig, full_reward: Amount, lock_secs: u64) -> Rewards {
    if full_reward.is_zero() {
        return Rewards::default();
    }
    if lock_secs == 0 {
        return Rewards {
            unlocked_reward: full_reward * config.unlocked_reward_ratio / unit(),
            ..Rewards::default()
        };
    }

    let total = full_reward * lockup_multiplier(config, lock_secs) / unit();
    let base = full_reward * config.unlocked_reward_ratio / unit();
    Rewards {
        lockup_extra_reward: total.saturating_sub(base),
        lockup_base_reward: base,
        unlocked_reward: Amount::zero(),
    }
}

/// Share of stashed lockup rewards forfeited by unlocking `amount` of `locked`
///
/// The whole bonus and half of the base part of the unlocked fraction are
/// forfeited. Returns `(penalty, extra_share, base_share)`.
pub fn unlock_penalty(stashed: &Rewards, amount: Amount, locked: Amount) -> (Amount, Amount, Amount) {
    if locked.is_zero() {
        return (Amount::zero(), Amount::zero(), Amount::zero());
    }
    let extra_share = stashed.lockup_extra_reward * amount / locked;
    let base_share = stashed.lockup_base_reward * amount / locked;
    let penalty = (extra_share + base_share / 2).min(amount);
    (penalty, extra_share, base_share)
}

impl StakingLedger {
    /// Lock `amount` of the caller's stake on `validator_id` for `duration` seconds
    ///
    /// Rewards accrued under the previous terms are stashed first. An active
    /// lock can be topped up and extended but never shortened. The bonus
    /// applies from the next open epoch.
    pub fn lock_stake(
        &mut self,
        ctx: &CallContext,
        validator_id: ValidatorId,
        duration: u64,
        amount: Amount,
    ) -> Result<()> {
        self.ensure_not_sealing()?;
        let staker = ctx.caller;

        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount.into());
        }

        if duration < self.config.min_lockup_duration || duration > self.config.max_lockup_duration {
            return Err(ValidationError::IncorrectDuration {
                duration,
                min: self.config.min_lockup_duration,
                max: self.config.max_lockup_duration,
            }
            .into());
        }

        let auth = self.validators.require_active(validator_id)?.auth;
        let end_time = ctx.now.saturating_add(duration);

        if staker != auth {
            let validator_end = self
                .delegations
                .get(&auth, validator_id)
                .and_then(|d| d.lockup)
                .filter(|l| l.is_active(ctx.now))
                .map(|l| l.end_time)
                .unwrap_or(0);
            if end_time > validator_end {
                return Err(ValidationError::ValidatorLockupTooShort(validator_id).into());
            }
        }

        let available = self.unlocked_stake(&staker, validator_id, ctx.now);
        if amount > available {
            return Err(StateError::InsufficientUnlockedStake {
                requested: amount,
                available,
            }
            .into());
        }

        let active_lock = self
            .delegations
            .get(&staker, validator_id)
            .and_then(|d| d.lockup)
            .filter(|l| l.is_active(ctx.now));
        if let Some(lock) = active_lock {
            if duration < lock.duration {
                return Err(StateError::LockupDurationDecrease.into());
            }
        }

        self.stash(&staker, validator_id, ctx.now);

        let from_epoch = self.current_epoch();
        let delegation = self.delegations.require_mut(&staker, validator_id)?;
        let locked_before = delegation
            .lockup
            .map(|l| l.locked_amount)
            .unwrap_or_default();
        delegation.lockup = Some(LockedDelegation {
            locked_amount: locked_before + amount,
            from_epoch,
            end_time,
            duration,
        });

        info!(
            "Locked {} of {} on validator {} for {}s (total locked {}, ends at {})",
            amount,
            staker,
            validator_id,
            duration,
            locked_before + amount,
            end_time
        );

        Ok(())
    }

    /// Unlock `amount` of the caller's locked stake before the lock ends
    ///
    /// A lock reaching its end at `now` can no longer be unlocked. Returns
    /// the penalty removed from the stake.
    pub fn unlock_stake(
        &mut self,
        ctx: &CallContext,
        validator_id: ValidatorId,
        amount: Amount,
    ) -> Result<Amount> {
        self.ensure_not_sealing()?;
        let staker = ctx.caller;

        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount.into());
        }
        self.validators.require(validator_id)?;

        let delegation = self
            .delegations
            .get(&staker, validator_id)
            .ok_or(StateError::NotLockedUp)?;
        let lock = delegation
            .lockup
            .filter(|l| l.is_active(ctx.now) && ctx.now < l.end_time)
            .ok_or(StateError::NotLockedUp)?;

        if amount > lock.locked_amount {
            return Err(StateError::InsufficientLockedStake {
                requested: amount,
                locked: lock.locked_amount,
            }
            .into());
        }

        let stashed = delegation.stashed_lockup_rewards + self.new_rewards(delegation);
        let (penalty, extra_share, base_share) = unlock_penalty(&stashed, amount, lock.locked_amount);
        self.check_stake_removal(&staker, validator_id, penalty, false)?;

        self.stash(&staker, validator_id, ctx.now);

        let delegation = self.delegations.require_mut(&staker, validator_id)?;
        let stashed = &mut delegation.stashed_lockup_rewards;
        stashed.lockup_extra_reward = stashed.lockup_extra_reward.saturating_sub(extra_share);
        stashed.lockup_base_reward = stashed.lockup_base_reward.saturating_sub(base_share);
        if let Some(lock) = delegation.lockup.as_mut() {
            lock.locked_amount = lock.locked_amount.saturating_sub(amount);
        }

        if !penalty.is_zero() {
            self.raw_undelegate(&staker, validator_id, penalty, ctx.now, true)?;
            self.total_burned_penalties += penalty;
            warn!(
                "Early unlock of {} by {} on validator {}: {} burnt",
                amount, staker, validator_id, penalty
            );
        } else {
            info!("Unlocked {} of {} on validator {}", amount, staker, validator_id);
        }

        Ok(penalty)
    }

    /// Locked stake of a position at `now`; zero once the lock ended
    pub fn locked_stake(&self, staker: &Address, validator_id: ValidatorId, now: u64) -> Amount {
        self.delegations
            .get(staker, validator_id)
            .and_then(|d| d.lockup)
            .filter(|l| l.is_active(now))
            .map(|l| l.locked_amount)
            .unwrap_or_default()
    }

    /// Stake free to undelegate or lock at `now`
    pub fn unlocked_stake(&self, staker: &Address, validator_id: ValidatorId, now: u64) -> Amount {
        let stake = self.stake_of(staker, validator_id);
        stake.saturating_sub(self.locked_stake(staker, validator_id, now))
    }

    /// Position holds a running lock with a non-zero amount
    pub fn is_locked_up(&self, staker: &Address, validator_id: ValidatorId, now: u64) -> bool {
        !self.locked_stake(staker, validator_id, now).is_zero()
    }

    /// Raw lock record, possibly ended but not yet settled
    pub fn lockup_info(&self, staker: &Address, validator_id: ValidatorId) -> Option<LockedDelegation> {
        self.delegations.get(staker, validator_id).and_then(|d| d.lockup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_LOCKUP_DURATION_SECS;
    use crate::types::percent;
    use primitive_types::U256;

    #[test]
    fn test_lockup_multiplier_bounds() {
        let config = StakingConfig::default();
        assert_eq!(lockup_multiplier(&config, 0), percent(30));
        assert_eq!(lockup_multiplier(&config, MAX_LOCKUP_DURATION_SECS), unit());
        assert_eq!(lockup_multiplier(&config, MAX_LOCKUP_DURATION_SECS * 2), unit());
    }

    #[test]
    fn test_scale_lockup_reward() {
        let config = StakingConfig::default();
        let full = U256::from(1_000_000u64);

        let unlocked = scale_lockup_reward(&config, full, 0);
        assert_eq!(unlocked.unlocked_reward, U256::from(300_000u64));
        assert_eq!(unlocked.lockup_total(), U256::zero());

        let max = scale_lockup_reward(&config, full, MAX_LOCKUP_DURATION_SECS);
        assert_eq!(max.lockup_base_reward, U256::from(300_000u64));
        assert_eq!(max.lockup_extra_reward, U256::from(700_000u64));
        assert_eq!(max.total(), full);

        let half = scale_lockup_reward(&config, full, MAX_LOCKUP_DURATION_SECS / 2);
        assert_eq!(half.total(), U256::from(650_000u64));
    }

    #[test]
    fn test_lock_activity() {
        let mut lock = LockedDelegation {
            locked_amount: U256::one(),
            from_epoch: 2,
            end_time: 1_000,
            duration: 400,
        };
        assert!(lock.is_active(1_000));
        assert!(!lock.is_active(1_001));

        // Fully unlocked before the end
        lock.locked_amount = U256::zero();
        assert!(!lock.is_active(900));
    }

    #[test]
    fn test_unlock_penalty() {
        let stashed = Rewards {
            lockup_extra_reward: U256::from(1_000u64),
            lockup_base_reward: U256::from(400u64),
            unlocked_reward: U256::from(50u64),
        };
        let (penalty, extra, base) =
            unlock_penalty(&stashed, U256::from(50u64), U256::from(100u64));
        assert_eq!(extra, U256::from(500u64));
        assert_eq!(base, U256::from(200u64));
        assert_eq!(penalty, U256::from(50u64));

        let (penalty, _, _) = unlock_penalty(&stashed, U256::from(10_000u64), U256::from(10_000u64));
        assert_eq!(penalty, U256::from(1_200u64));
    }
}
