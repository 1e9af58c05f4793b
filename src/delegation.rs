//! Delegated staking
//!
//! This module implements stake positions keyed by (staker, validator).
//! A validator's own position is its self-stake.
//!
//! Features:
//! - Delegation cap relative to the validator's self-stake
//! - Minimum self-stake, a validator whose self-stake reaches zero is withdrawn
//! - Undelegation through timed withdrawal requests
//! - Prevention of delegation to withdrawn, offline or double-signed validators

use crate::error::{Result, StateError, ValidationError};
use crate::lockup::LockedDelegation;
use crate::staking::StakingLedger;
use crate::types::{unit, Address, Amount, CallContext, Rewards, ValidatorId};
use crate::validator::ValidatorStatus;
use crate::withdrawal::WithdrawalRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Stake position of one staker on one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Staker address
    pub staker: Address,

    /// Validator id
    pub validator_id: ValidatorId,

    /// Live stake
    pub stake: Amount,

    /// Lock commitment, if any
    pub lockup: Option<LockedDelegation>,

    /// Last epoch whose rewards are accounted for
    pub paid_until_epoch: u64,

    /// Settled rewards not yet claimed
    pub reward_stash: Rewards,

    /// Rewards earned under the current lock, basis of the unlock penalty
    pub stashed_lockup_rewards: Rewards,
}

impl Delegation {
    /// Create an empty position
    pub fn new(staker: Address, validator_id: ValidatorId, paid_until_epoch: u64) -> Self {
        Self {
            staker,
            validator_id,
            stake: Amount::zero(),
            lockup: None,
            paid_until_epoch,
            reward_stash: Rewards::default(),
            stashed_lockup_rewards: Rewards::default(),
        }
    }

    /// Locked amount recorded on the position, ignoring lock expiry
    pub fn recorded_locked_amount(&self) -> Amount {
        self.lockup.map(|l| l.locked_amount).unwrap_or_default()
    }
}

/// Table of all stake positions
#[derive(Debug, Clone, Default)]
pub struct DelegationLedger {
    /// Positions keyed by (staker, validator)
    entries: BTreeMap<(Address, ValidatorId), Delegation>,
}

impl DelegationLedger {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a position
    pub fn get(&self, staker: &Address, validator_id: ValidatorId) -> Option<&Delegation> {
        self.entries.get(&(*staker, validator_id))
    }

    pub(crate) fn get_mut(&mut self, staker: &Address, validator_id: ValidatorId) -> Option<&mut Delegation> {
        self.entries.get_mut(&(*staker, validator_id))
    }

    pub(crate) fn require_mut(
        &mut self,
        staker: &Address,
        validator_id: ValidatorId,
    ) -> Result<&mut Delegation> {
        self.entries.get_mut(&(*staker, validator_id)).ok_or_else(|| {
            StateError::Inconsistent(format!(
                "no delegation of {} to validator {}",
                staker, validator_id
            ))
            .into()
        })
    }

    /// Get a position, creating an empty one paid until `paid_until_epoch`
    pub(crate) fn entry(
        &mut self,
        staker: &Address,
        validator_id: ValidatorId,
        paid_until_epoch: u64,
    ) -> &mut Delegation {
        self.entries
            .entry((*staker, validator_id))
            .or_insert_with(|| Delegation::new(*staker, validator_id, paid_until_epoch))
    }

    pub(crate) fn insert(&mut self, delegation: Delegation) {
        self.entries
            .insert((delegation.staker, delegation.validator_id), delegation);
    }

    /// All positions in key order
    pub fn iter(&self) -> impl Iterator<Item = &Delegation> {
        self.entries.values()
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No position recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StakingLedger {
    /// Delegate `amount` from the caller to `validator_id`
    ///
    /// Pending rewards are stashed before the stake changes.
    pub fn delegate(&mut self, ctx: &CallContext, validator_id: ValidatorId, amount: Amount) -> Result<()> {
        self.ensure_not_sealing()?;
        let staker = ctx.caller;

        let validator = self.validators.require_active(validator_id)?;
        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount.into());
        }

        let self_stake = self.self_stake(validator_id);
        let self_after = if staker == validator.auth {
            self_stake + amount
        } else {
            self_stake
        };
        self.ensure_delegation_cap(validator_id, self_after, validator.received_stake + amount)?;

        self.stash(&staker, validator_id, ctx.now);
        self.raw_delegate(&staker, validator_id, amount)?;

        info!(
            "{} delegated {} to validator {} (position {})",
            staker,
            amount,
            validator_id,
            self.stake_of(&staker, validator_id)
        );

        Ok(())
    }

    /// Undelegate `amount` of unlocked stake into withdrawal request `request_id`
    ///
    /// The stake stops earning immediately; the payout waits in the
    /// withdrawal queue.
    pub fn undelegate(
        &mut self,
        ctx: &CallContext,
        validator_id: ValidatorId,
        request_id: u64,
        amount: Amount,
    ) -> Result<()> {
        self.ensure_not_sealing()?;
        let staker = ctx.caller;

        self.validators.require(validator_id)?;
        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount.into());
        }

        let available = self.unlocked_stake(&staker, validator_id, ctx.now);
        if amount > available {
            return Err(StateError::InsufficientUnlockedStake {
                requested: amount,
                available,
            }
            .into());
        }

        if self.withdrawals.contains(&staker, validator_id, request_id) {
            return Err(ValidationError::RequestAlreadyExists { request_id }.into());
        }

        self.check_stake_removal(&staker, validator_id, amount, true)?;

        self.stash(&staker, validator_id, ctx.now);
        self.raw_undelegate(&staker, validator_id, amount, ctx.now, false)?;

        let request = WithdrawalRequest {
            id: request_id,
            staker,
            validator_id,
            amount,
            request_epoch: self.current_epoch(),
            request_time: ctx.now,
        };
        self.withdrawals.insert(request);

        info!(
            "{} undelegated {} from validator {} (request {}, epoch {})",
            staker,
            amount,
            validator_id,
            request_id,
            self.current_epoch()
        );

        Ok(())
    }

    /// Self-stake of a validator
    pub fn self_stake(&self, validator_id: ValidatorId) -> Amount {
        self.validators
            .get(validator_id)
            .map(|v| self.stake_of(&v.auth, validator_id))
            .unwrap_or_default()
    }

    /// Stake of a position
    pub fn stake_of(&self, staker: &Address, validator_id: ValidatorId) -> Amount {
        self.delegations
            .get(staker, validator_id)
            .map(|d| d.stake)
            .unwrap_or_default()
    }

    /// Fail when delegated stake would exceed `max_delegated_ratio` of self-stake
    pub(crate) fn ensure_delegation_cap(
        &self,
        validator_id: ValidatorId,
        self_stake: Amount,
        received_stake: Amount,
    ) -> Result<()> {
        let delegated = received_stake.saturating_sub(self_stake);
        let cap = self_stake * self.config.max_delegated_ratio / unit();
        if delegated > cap {
            debug!(
                "Validator {} cap check failed: delegated {} > cap {}",
                validator_id, delegated, cap
            );
            return Err(ValidationError::DelegationCapExceeded(validator_id).into());
        }
        Ok(())
    }

    /// Check that removing `amount` from a position keeps the validator valid
    ///
    /// Only the validator's own position matters. With `strict`, a non-zero
    /// self-stake below the minimum is rejected; otherwise the validator is
    /// retired by `raw_undelegate`.
    pub(crate) fn check_stake_removal(
        &self,
        staker: &Address,
        validator_id: ValidatorId,
        amount: Amount,
        strict: bool,
    ) -> Result<()> {
        let validator = self.validators.require(validator_id)?;
        if *staker != validator.auth || !validator.is_active() || amount.is_zero() {
            return Ok(());
        }

        let self_after = self.self_stake(validator_id).saturating_sub(amount);
        if self_after.is_zero() {
            return Ok(());
        }
        if self_after < self.config.min_self_stake {
            if strict {
                return Err(ValidationError::InsufficientSelfStake {
                    required: self.config.min_self_stake,
                    provided: self_after,
                }
                .into());
            }
            return Ok(());
        }

        self.ensure_delegation_cap(
            validator_id,
            self_after,
            validator.received_stake.saturating_sub(amount),
        )
    }

    /// Add stake to a position and its validator
    pub(crate) fn raw_delegate(&mut self, staker: &Address, validator_id: ValidatorId, amount: Amount) -> Result<()> {
        let paid_until = self.highest_payable_epoch(validator_id);
        self.validators.add_stake(validator_id, amount)?;
        self.delegations.entry(staker, validator_id, paid_until).stake += amount;
        Ok(())
    }

    /// Remove stake from a position and its validator
    ///
    /// A validator left without self-stake is withdrawn, and with
    /// `retire_below_min` so is one left below the minimum self-stake.
    pub(crate) fn raw_undelegate(
        &mut self,
        staker: &Address,
        validator_id: ValidatorId,
        amount: Amount,
        now: u64,
        retire_below_min: bool,
    ) -> Result<()> {
        let delegation = self.delegations.require_mut(staker, validator_id)?;
        delegation.stake = delegation.stake.checked_sub(amount).ok_or_else(|| {
            StateError::Inconsistent(format!(
                "undelegating {} exceeds stake of {} on validator {}",
                amount, staker, validator_id
            ))
        })?;
        self.validators.sub_stake(validator_id, amount)?;

        let validator = self.validators.require(validator_id)?;
        if *staker != validator.auth || validator.status.withdrawn {
            return Ok(());
        }

        let self_after = self.self_stake(validator_id);
        let below_min = retire_below_min && self_after < self.config.min_self_stake;
        if self_after.is_zero() || below_min {
            let epoch = self.current_epoch();
            self.validators
                .deactivate(validator_id, ValidatorStatus::WITHDRAWN_BIT, epoch, now)?;
            warn!(
                "Validator {} withdrawn, self-stake now {}",
                validator_id, self_after
            );
        }

        Ok(())
    }
}
