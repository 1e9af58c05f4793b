//! # SilverBitcoin Staking
//!
//! Proof-of-stake staking ledger with epoch sealing and lockup-boosted
//! reward accrual.
//!
//! This crate implements:
//! - Validator registry with status flags and deactivation
//! - Delegations with a self-stake based delegation cap
//! - Stake lockups with duration-scaled reward multipliers and early
//!   unlock penalties
//! - Two-step epoch sealing driven by the sealing authority
//! - Lazy reward accrual from per-epoch accumulators
//! - Withdrawal requests with slashing refunds
//! - JSON persistence of the whole ledger

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;
pub mod delegation;
pub mod error;
pub mod lockup;
pub mod persistence;
pub mod policy;
pub mod rewards;
pub mod sealing;
pub mod shared;
pub mod snapshot;
pub mod staking;
pub mod types;
pub mod validator;
pub mod withdrawal;

pub use config::StakingConfig;
pub use delegation::Delegation;
pub use error::{AuthorizationError, Result, StakingError, StateError, TemporalError, ValidationError};
pub use lockup::LockedDelegation;
pub use persistence::LedgerImage;
pub use policy::{DefaultRewardPolicy, RewardPolicy, ValidatorEpochMetrics};
pub use sealing::{EpochSealReport, SealPhase, ValidatorWeightUpdate};
pub use shared::SharedStakingLedger;
pub use snapshot::EpochSnapshot;
pub use staking::{GenesisDelegation, GenesisValidator, StakingLedger};
pub use types::{parse_units, percent, unit, Address, Amount, CallContext, Rewards, Transfer, TransferKind, ValidatorId};
pub use validator::{Validator, ValidatorStatus};
pub use withdrawal::{WithdrawalReceipt, WithdrawalRequest};
