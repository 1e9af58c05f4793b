//! Reward accrual
//!
//! This module handles:
//! - Replaying epoch accumulators against a stake position
//! - Splitting rewards between lockup epochs and unlocked epochs
//! - Stashing settled rewards without transferring them
//! - Claiming rewards out and restaking them into the position
//!
//! Rewards of a position over epochs `(a, b]` are
//! `(acc[b] - acc[a]) * stake / unit()`, where `acc` is the validator's
//! accumulated reward per token. Positions are settled lazily, so sealing
//! never iterates over stakers.

use crate::delegation::Delegation;
use crate::error::{Result, StateError};
use crate::lockup::scale_lockup_reward;
use crate::staking::StakingLedger;
use crate::types::{unit, Address, Amount, CallContext, Rewards, Transfer, TransferKind, ValidatorId};
use tracing::{debug, info};

impl StakingLedger {
    /// Last epoch a validator's stakers can be paid for
    ///
    /// Rewards stop at the deactivation epoch.
    pub fn highest_payable_epoch(&self, validator_id: ValidatorId) -> u64 {
        let sealed = self.current_sealed_epoch();
        match self.validators.get(validator_id) {
            Some(v) if v.deactivated_epoch != 0 => sealed.min(v.deactivated_epoch),
            _ => sealed,
        }
    }

    /// Last sealed epoch fully covered by the position's lock, zero if none
    pub fn highest_lockup_epoch(&self, staker: &Address, validator_id: ValidatorId) -> u64 {
        let lock = match self.delegations.get(staker, validator_id).and_then(|d| d.lockup) {
            Some(lock) => lock,
            None => return 0,
        };
        let locked_at = |epoch: u64| {
            lock.from_epoch <= epoch && self.snapshots.end_time(epoch) <= lock.end_time
        };

        let mut left = lock.from_epoch;
        let mut right = self.current_sealed_epoch();
        if locked_at(right) {
            return right;
        }
        if left > right || !locked_at(left) {
            return 0;
        }
        while left < right {
            let mid = left + (right - left) / 2;
            if locked_at(mid) {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        right.saturating_sub(1)
    }

    /// Full reward of `stake` on a validator over epochs `(from, to]`
    fn reward_of(&self, stake: Amount, validator_id: ValidatorId, from: u64, to: u64) -> Amount {
        if from >= to || stake.is_zero() {
            return Amount::zero();
        }
        let start = self.snapshots.accumulated_reward_per_token(from, validator_id);
        let end = self.snapshots.accumulated_reward_per_token(to, validator_id);
        end.saturating_sub(start) * stake / unit()
    }

    /// Rewards accrued since the position was last settled
    pub(crate) fn new_rewards(&self, delegation: &Delegation) -> Rewards {
        let validator_id = delegation.validator_id;
        let stashed_until = delegation.paid_until_epoch;
        let payable_until = self.highest_payable_epoch(validator_id);
        let locked_until = self
            .highest_lockup_epoch(&delegation.staker, validator_id)
            .min(payable_until)
            .max(stashed_until);

        let (locked, lock_secs) = delegation
            .lockup
            .map(|l| (l.locked_amount, l.duration))
            .unwrap_or_default();
        let unlocked = delegation.stake.saturating_sub(locked);

        let locked_reward = scale_lockup_reward(
            &self.config,
            self.reward_of(locked, validator_id, stashed_until, locked_until),
            lock_secs,
        );
        let unlocked_reward = scale_lockup_reward(
            &self.config,
            self.reward_of(unlocked, validator_id, stashed_until, locked_until),
            0,
        );
        let after_lock_reward = scale_lockup_reward(
            &self.config,
            self.reward_of(delegation.stake, validator_id, locked_until, payable_until),
            0,
        );

        locked_reward + unlocked_reward + after_lock_reward
    }

    /// Move accrued rewards into the stash and advance the paid pointer
    ///
    /// A lock that ended by `now` is dropped together with its stashed
    /// lockup rewards. Returns the newly stashed rewards.
    pub(crate) fn stash(&mut self, staker: &Address, validator_id: ValidatorId, now: u64) -> Rewards {
        let new = match self.delegations.get(staker, validator_id) {
            Some(delegation) => self.new_rewards(delegation),
            None => return Rewards::default(),
        };
        let payable_until = self.highest_payable_epoch(validator_id);

        if let Some(delegation) = self.delegations.get_mut(staker, validator_id) {
            delegation.reward_stash += new;
            delegation.stashed_lockup_rewards += new;
            delegation.paid_until_epoch = payable_until;
            if !delegation.lockup.map(|l| l.is_active(now)).unwrap_or(false) {
                delegation.lockup = None;
                delegation.stashed_lockup_rewards = Rewards::default();
            }
        }

        if !new.is_zero() {
            debug!(
                "Stashed {} for {} on validator {} up to epoch {}",
                new.total(),
                staker,
                validator_id,
                payable_until
            );
        }
        new
    }

    /// Stash plus accrued rewards, by origin
    pub fn pending_rewards_detail(&self, staker: &Address, validator_id: ValidatorId) -> Rewards {
        self.delegations
            .get(staker, validator_id)
            .map(|d| d.reward_stash + self.new_rewards(d))
            .unwrap_or_default()
    }

    /// Total rewards a claim would pay now
    pub fn pending_rewards(&self, staker: &Address, validator_id: ValidatorId) -> Amount {
        self.pending_rewards_detail(staker, validator_id).total()
    }

    /// Settled but unclaimed rewards
    pub fn rewards_stash(&self, staker: &Address, validator_id: ValidatorId) -> Amount {
        self.delegations
            .get(staker, validator_id)
            .map(|d| d.reward_stash.total())
            .unwrap_or_default()
    }

    /// Epoch the position's rewards are settled up to
    pub fn stashed_rewards_until_epoch(&self, staker: &Address, validator_id: ValidatorId) -> u64 {
        self.delegations
            .get(staker, validator_id)
            .map(|d| d.paid_until_epoch)
            .unwrap_or_default()
    }

    /// Settle accrued rewards of any position into its stash
    pub fn stash_rewards(&mut self, ctx: &CallContext, staker: &Address, validator_id: ValidatorId) -> Result<()> {
        self.validators.require(validator_id)?;
        let new = self
            .delegations
            .get(staker, validator_id)
            .map(|d| self.new_rewards(d))
            .unwrap_or_default();
        if new.is_zero() {
            return Err(StateError::NothingToStash.into());
        }

        self.stash(staker, validator_id, ctx.now);
        Ok(())
    }

    /// Settle and empty the caller's stash
    fn take_rewards(&mut self, staker: &Address, validator_id: ValidatorId, now: u64) -> Result<Rewards> {
        self.validators.require(validator_id)?;
        if self.pending_rewards(staker, validator_id).is_zero() {
            return Err(StateError::ZeroRewards.into());
        }

        self.stash(staker, validator_id, now);
        let delegation = self.delegations.require_mut(staker, validator_id)?;
        Ok(std::mem::take(&mut delegation.reward_stash))
    }

    /// Claim the caller's rewards on `validator_id`
    ///
    /// The stash is emptied before the transfer is returned.
    pub fn claim_rewards(&mut self, ctx: &CallContext, validator_id: ValidatorId) -> Result<Transfer> {
        let staker = ctx.caller;
        let rewards = self.take_rewards(&staker, validator_id, ctx.now)?;

        info!(
            "{} claimed {} from validator {} (lockup extra {}, lockup base {}, unlocked {})",
            staker,
            rewards.total(),
            validator_id,
            rewards.lockup_extra_reward,
            rewards.lockup_base_reward,
            rewards.unlocked_reward
        );

        Ok(Transfer {
            recipient: staker,
            amount: rewards.total(),
            kind: TransferKind::RewardClaim,
        })
    }

    /// Delegate the caller's rewards back into the position
    ///
    /// The part earned under a running lock is added to the locked amount.
    /// Returns the restaked amount.
    pub fn restake_rewards(&mut self, ctx: &CallContext, validator_id: ValidatorId) -> Result<Amount> {
        self.ensure_not_sealing()?;
        let staker = ctx.caller;

        let validator = self.validators.require_active(validator_id)?;
        let total = self.pending_rewards(&staker, validator_id);
        if total.is_zero() {
            return Err(StateError::ZeroRewards.into());
        }
        let self_after = if staker == validator.auth {
            self.self_stake(validator_id) + total
        } else {
            self.self_stake(validator_id)
        };
        self.ensure_delegation_cap(validator_id, self_after, validator.received_stake + total)?;

        let rewards = self.take_rewards(&staker, validator_id, ctx.now)?;
        let amount = rewards.total();
        self.raw_delegate(&staker, validator_id, amount)?;

        let delegation = self.delegations.require_mut(&staker, validator_id)?;
        if let Some(lock) = delegation.lockup.as_mut() {
            lock.locked_amount += rewards.lockup_total();
        }

        info!(
            "{} restaked {} on validator {} ({} locked)",
            staker,
            amount,
            validator_id,
            rewards.lockup_total()
        );

        Ok(amount)
    }
}
