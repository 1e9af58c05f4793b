//! Withdrawal requests
//!
//! Undelegated stake waits here until both the withdrawal period and the
//! withdrawal epoch count have passed. Stake on a double-signing validator is
//! slashed on withdrawal except for the validator's refund ratio.

use crate::error::{Result, StateError, TemporalError, ValidationError};
use crate::staking::StakingLedger;
use crate::types::{unit, Address, Amount, CallContext, Transfer, TransferKind, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Pending payout of undelegated stake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Caller-chosen request id, unique per (staker, validator)
    pub id: u64,

    /// Staker address
    pub staker: Address,

    /// Validator id
    pub validator_id: ValidatorId,

    /// Undelegated amount
    pub amount: Amount,

    /// Open epoch at request time
    pub request_epoch: u64,

    /// Request time
    pub request_time: u64,
}

/// Result of honoring a withdrawal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    /// Honored request
    pub request: WithdrawalRequest,

    /// Slashed part of the request
    pub penalty: Amount,

    /// Payout, `None` when the request was fully slashed
    pub transfer: Option<Transfer>,
}

/// Table of pending withdrawal requests
#[derive(Debug, Clone, Default)]
pub struct WithdrawalQueue {
    /// Requests keyed by (staker, validator, request id)
    requests: BTreeMap<(Address, ValidatorId, u64), WithdrawalRequest>,
}

impl WithdrawalQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// A request with this key exists
    pub fn contains(&self, staker: &Address, validator_id: ValidatorId, request_id: u64) -> bool {
        self.requests.contains_key(&(*staker, validator_id, request_id))
    }

    /// Get a request
    pub fn get(&self, staker: &Address, validator_id: ValidatorId, request_id: u64) -> Option<&WithdrawalRequest> {
        self.requests.get(&(*staker, validator_id, request_id))
    }

    pub(crate) fn insert(&mut self, request: WithdrawalRequest) {
        self.requests
            .insert((request.staker, request.validator_id, request.id), request);
    }

    pub(crate) fn remove(
        &mut self,
        staker: &Address,
        validator_id: ValidatorId,
        request_id: u64,
    ) -> Option<WithdrawalRequest> {
        self.requests.remove(&(*staker, validator_id, request_id))
    }

    /// All requests in key order
    pub fn iter(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.requests.values()
    }

    /// Sum of pending amounts of a position
    pub fn pending_amount(&self, staker: &Address, validator_id: ValidatorId) -> Amount {
        self.requests
            .values()
            .filter(|r| r.staker == *staker && r.validator_id == validator_id)
            .fold(Amount::zero(), |acc, r| acc + r.amount)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// No pending request
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Slashed part of a withdrawal from a double-signing validator
///
/// Rounded up so dust withdrawals cannot dodge the penalty.
pub fn slashing_penalty(amount: Amount, is_cheater: bool, refund_ratio: Amount) -> Amount {
    if !is_cheater || refund_ratio >= unit() {
        return Amount::zero();
    }
    let penalty = amount * (unit() - refund_ratio) / unit() + Amount::one();
    penalty.min(amount)
}

impl StakingLedger {
    /// Withdraw a matured request of the caller
    ///
    /// The request is deleted before the transfer is produced. A fully
    /// slashed request is forfeited and yields no transfer.
    pub fn withdraw(&mut self, ctx: &CallContext, validator_id: ValidatorId, request_id: u64) -> Result<WithdrawalReceipt> {
        let staker = ctx.caller;
        let request = self
            .withdrawals
            .get(&staker, validator_id, request_id)
            .cloned()
            .ok_or(TemporalError::RequestNotFound { request_id })?;
        let validator = self.validators.require(validator_id)?;

        let (mut request_time, mut request_epoch) = (request.request_time, request.request_epoch);
        if validator.deactivated_time != 0 && validator.deactivated_time < request_time {
            request_time = validator.deactivated_time;
            request_epoch = validator.deactivated_epoch;
        }

        let ready_at = request_time.saturating_add(self.config.withdrawal_period_time);
        let ready_epoch = request_epoch.saturating_add(self.config.withdrawal_period_epochs);
        if ctx.now < ready_at || self.current_sealed_epoch() < ready_epoch {
            return Err(TemporalError::LockPeriodNotElapsed {
                ready_at,
                ready_epoch,
            }
            .into());
        }

        let penalty = slashing_penalty(request.amount, validator.is_slashed(), validator.slashing_refund_ratio);

        self.withdrawals.remove(&staker, validator_id, request_id);
        self.total_slashed_stake += penalty;

        let payout = request.amount - penalty;
        let transfer = if payout.is_zero() {
            warn!(
                "Withdrawal {} of {} on validator {} fully slashed ({})",
                request_id, staker, validator_id, request.amount
            );
            None
        } else {
            info!(
                "{} withdrew {} from validator {} (request {}, slashed {})",
                staker, payout, validator_id, request_id, penalty
            );
            Some(Transfer {
                recipient: staker,
                amount: payout,
                kind: TransferKind::Withdrawal,
            })
        };

        Ok(WithdrawalReceipt {
            request,
            penalty,
            transfer,
        })
    }

    /// Set the refund ratio of a double-signing validator
    pub fn update_slashing_refund_ratio(
        &mut self,
        ctx: &CallContext,
        validator_id: ValidatorId,
        refund_ratio: Amount,
    ) -> Result<()> {
        self.ensure_authority(&ctx.caller)?;
        if !self.validators.require(validator_id)?.is_slashed() {
            return Err(StateError::NotSlashed(validator_id).into());
        }
        if refund_ratio > unit() {
            return Err(ValidationError::RatioTooLarge(refund_ratio).into());
        }

        if let Some(validator) = self.validators.get_mut(validator_id) {
            validator.slashing_refund_ratio = refund_ratio;
        }
        info!(
            "Validator {} slashing refund ratio set to {}",
            validator_id, refund_ratio
        );
        Ok(())
    }

    /// Pending withdrawal request
    pub fn withdrawal_request(
        &self,
        staker: &Address,
        validator_id: ValidatorId,
        request_id: u64,
    ) -> Option<&WithdrawalRequest> {
        self.withdrawals.get(staker, validator_id, request_id)
    }

    /// Undelegated stake of a position still waiting to be withdrawn
    pub fn pending_withdrawals(&self, staker: &Address, validator_id: ValidatorId) -> Amount {
        self.withdrawals.pending_amount(staker, validator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::percent;
    use primitive_types::U256;

    #[test]
    fn test_slashing_penalty() {
        let amount = U256::from(1_000u64);
        assert_eq!(slashing_penalty(amount, false, U256::zero()), U256::zero());
        assert_eq!(slashing_penalty(amount, true, unit()), U256::zero());
        assert_eq!(slashing_penalty(amount, true, U256::zero()), amount);
        assert_eq!(slashing_penalty(amount, true, percent(50)), U256::from(501u64));
    }

    #[test]
    fn test_queue_keys() {
        let mut queue = WithdrawalQueue::new();
        let staker = Address::repeat_byte(1);
        for id in 0..3 {
            queue.insert(WithdrawalRequest {
                id,
                staker,
                validator_id: 1,
                amount: U256::from(10u64),
                request_epoch: 1,
                request_time: 0,
            });
        }
        assert!(queue.contains(&staker, 1, 2));
        assert!(!queue.contains(&staker, 2, 2));
        assert_eq!(queue.pending_amount(&staker, 1), U256::from(30u64));
        assert!(queue.remove(&staker, 1, 0).is_some());
        assert_eq!(queue.len(), 2);
    }
}
