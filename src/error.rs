//! Error taxonomy for ledger operations
//!
//! Every failing call aborts with no state change. Errors fall into four
//! kinds that tell the caller what to do next:
//! - [`AuthorizationError`]: wrong caller role
//! - [`ValidationError`]: malformed or out-of-range input
//! - [`StateError`]: operation inconsistent with the current ledger state
//! - [`TemporalError`]: time or epoch gate not yet reached, retry later

use crate::types::{Address, Amount, ValidatorId};
use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, StakingError>;

/// Top-level ledger error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    /// Caller lacks the required role
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Input rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger state does not allow the operation
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Time or epoch precondition not met yet
    #[error("temporal error: {0}")]
    Temporal(#[from] TemporalError),
}

/// Caller role errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Only the sealing authority may call this entry point
    #[error("caller {caller} is not the sealing authority")]
    NotSealingAuthority {
        /// Rejected caller
        caller: Address,
    },
}

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Validator pubkey must not be empty
    #[error("empty validator pubkey")]
    EmptyPubkey,

    /// Self-stake is below the configured minimum
    #[error("insufficient self-stake: {provided} < {required}")]
    InsufficientSelfStake {
        /// Configured minimum
        required: Amount,
        /// Amount that would remain or was offered
        provided: Amount,
    },

    /// Caller already owns a validator
    #[error("validator already exists for {0}")]
    AlreadyExists(Address),

    /// Validator id is unknown or withdrawn
    #[error("validator {0} doesn't exist")]
    NoSuchValidator(ValidatorId),

    /// Zero amounts are not accepted
    #[error("zero amount")]
    ZeroAmount,

    /// Delegated stake would exceed the ratio allowed by self-stake
    #[error("delegation cap exceeded for validator {0}")]
    DelegationCapExceeded(ValidatorId),

    /// Lockup duration outside the allowed window
    #[error("incorrect lockup duration {duration}s (allowed {min}s..={max}s)")]
    IncorrectDuration {
        /// Requested duration
        duration: u64,
        /// Minimum allowed
        min: u64,
        /// Maximum allowed
        max: u64,
    },

    /// Delegator lock would outlive the validator's own lock
    #[error("validator {0} lockup period will end earlier")]
    ValidatorLockupTooShort(ValidatorId),

    /// A withdrawal request with this id is already pending
    #[error("withdrawal request {request_id} already exists")]
    RequestAlreadyExists {
        /// Conflicting request id
        request_id: u64,
    },

    /// Seal metrics do not line up with the epoch roster
    #[error("seal metrics length mismatch: expected {expected}, got {got}")]
    MetricsLengthMismatch {
        /// Roster size
        expected: usize,
        /// Offending array length
        got: usize,
    },

    /// Validator listed twice in a roster
    #[error("validator {0} listed more than once")]
    DuplicateValidator(ValidatorId),

    /// A ratio larger than one
    #[error("ratio {0} exceeds one")]
    RatioTooLarge(Amount),

    /// Reported metrics push an epoch reward past 256 bits
    #[error("epoch reward arithmetic overflows")]
    RewardOverflow,

    /// Genesis data that cannot be imported
    #[error("invalid genesis record: {0}")]
    InvalidGenesis(String),

    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Ledger state errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Status bits are empty, unknown, or add nothing new
    #[error("wrong validator status")]
    WrongStatus,

    /// Not enough stake outside the lock
    #[error("insufficient unlocked stake: requested {requested}, available {available}")]
    InsufficientUnlockedStake {
        /// Requested amount
        requested: Amount,
        /// Unlocked stake
        available: Amount,
    },

    /// No active lock on the position
    #[error("not locked up")]
    NotLockedUp,

    /// Unlock amount larger than the lock
    #[error("insufficient locked stake: requested {requested}, locked {locked}")]
    InsufficientLockedStake {
        /// Requested amount
        requested: Amount,
        /// Locked amount
        locked: Amount,
    },

    /// Nothing to claim or restake
    #[error("zero rewards")]
    ZeroRewards,

    /// Nothing new to stash
    #[error("nothing to stash")]
    NothingToStash,

    /// Validator is offline or double-signed
    #[error("validator {0} is not active")]
    ValidatorInactive(ValidatorId),

    /// A re-lock may not shorten an active lock
    #[error("lockup duration cannot decrease")]
    LockupDurationDecrease,

    /// Validator has not been slashed
    #[error("validator {0} isn't slashed")]
    NotSlashed(ValidatorId),

    /// An epoch seal is in progress
    #[error("epoch seal in progress")]
    SealInProgress,

    /// `seal_epoch_validators` called without a preceding `seal_epoch`
    #[error("no epoch seal in progress")]
    NotSealing,

    /// Stored or restored state breaks a ledger invariant
    #[error("inconsistent ledger state: {0}")]
    Inconsistent(String),
}

/// Time-gated errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalError {
    /// No such withdrawal request
    #[error("withdrawal request {request_id} doesn't exist")]
    RequestNotFound {
        /// Requested id
        request_id: u64,
    },

    /// Withdrawal period has not elapsed in time or epochs
    #[error("not enough time passed: ready at {ready_at} and epoch {ready_epoch}")]
    LockPeriodNotElapsed {
        /// Earliest unix time the request can be honored
        ready_at: u64,
        /// Earliest sealed epoch the request can be honored at
        ready_epoch: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_convert() {
        let err: StakingError = ValidationError::ZeroAmount.into();
        assert!(matches!(err, StakingError::Validation(ValidationError::ZeroAmount)));

        let err: StakingError = TemporalError::RequestNotFound { request_id: 7 }.into();
        assert_eq!(err.to_string(), "temporal error: withdrawal request 7 doesn't exist");
    }
}
