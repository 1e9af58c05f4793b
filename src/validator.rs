//! Validator registry
//!
//! This module manages validator records, including:
//! - Sequential id assignment and the auth-address index
//! - Independent status flags (withdrawn, offline, double-signed)
//! - Deactivation stamps on the first status change
//! - Aggregate received stake per validator

use crate::error::{Result, StateError, ValidationError};
use crate::types::{Address, Amount, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Validator status flags
///
/// Flags are independent and only ever added. The wire encoding is a bit
/// mask: withdrawn `1`, offline `1 << 3`, double-signed `1 << 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValidatorStatus {
    /// Self-stake fully withdrawn; terminal
    pub withdrawn: bool,

    /// Penalized for being offline
    pub offline: bool,

    /// Caught double-signing
    pub double_signed: bool,
}

impl ValidatorStatus {
    /// Withdrawn bit
    pub const WITHDRAWN_BIT: u64 = 1;

    /// Offline bit
    pub const OFFLINE_BIT: u64 = 1 << 3;

    /// Double-sign bit
    pub const DOUBLESIGN_BIT: u64 = 1 << 7;

    const KNOWN_BITS: u64 = Self::WITHDRAWN_BIT | Self::OFFLINE_BIT | Self::DOUBLESIGN_BIT;

    /// Status with no flags set
    pub fn active() -> Self {
        Self::default()
    }

    /// Decode a bit mask; `None` if it has unknown bits
    pub fn from_bits(bits: u64) -> Option<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return None;
        }
        Some(Self {
            withdrawn: bits & Self::WITHDRAWN_BIT != 0,
            offline: bits & Self::OFFLINE_BIT != 0,
            double_signed: bits & Self::DOUBLESIGN_BIT != 0,
        })
    }

    /// Encode as a bit mask
    pub fn bits(&self) -> u64 {
        let mut bits = 0;
        if self.withdrawn {
            bits |= Self::WITHDRAWN_BIT;
        }
        if self.offline {
            bits |= Self::OFFLINE_BIT;
        }
        if self.double_signed {
            bits |= Self::DOUBLESIGN_BIT;
        }
        bits
    }

    /// No flag set
    pub fn is_active(&self) -> bool {
        self.bits() == 0
    }

    /// Union of both flag sets
    pub fn union(&self, other: ValidatorStatus) -> ValidatorStatus {
        ValidatorStatus {
            withdrawn: self.withdrawn || other.withdrawn,
            offline: self.offline || other.offline,
            double_signed: self.double_signed || other.double_signed,
        }
    }
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_active() {
            return write!(f, "active");
        }
        let mut flags = Vec::new();
        if self.withdrawn {
            flags.push("withdrawn");
        }
        if self.offline {
            flags.push("offline");
        }
        if self.double_signed {
            flags.push("double-signed");
        }
        write!(f, "{}", flags.join("|"))
    }
}

/// Validator record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Validator id
    pub id: ValidatorId,

    /// Owner address, also the self-delegation staker
    pub auth: Address,

    /// Consensus public key
    pub pubkey: Vec<u8>,

    /// Status flags
    pub status: ValidatorStatus,

    /// Epoch the validator was created in
    pub created_epoch: u64,

    /// Creation time
    pub created_time: u64,

    /// Epoch of the first deactivation, zero while active
    pub deactivated_epoch: u64,

    /// Time of the first deactivation, zero while active
    pub deactivated_time: u64,

    /// Sum of live delegations, self-stake included
    pub received_stake: Amount,

    /// Share of a withdrawal refunded after double-signing
    pub slashing_refund_ratio: Amount,
}

impl Validator {
    /// Create an active validator
    pub fn new(id: ValidatorId, auth: Address, pubkey: Vec<u8>, epoch: u64, time: u64) -> Self {
        Self {
            id,
            auth,
            pubkey,
            status: ValidatorStatus::active(),
            created_epoch: epoch,
            created_time: time,
            deactivated_epoch: 0,
            deactivated_time: 0,
            received_stake: Amount::zero(),
            slashing_refund_ratio: Amount::zero(),
        }
    }

    /// No status flag set
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Validator has been caught double-signing
    pub fn is_slashed(&self) -> bool {
        self.status.double_signed
    }

    /// Validator has been deactivated at some point
    pub fn is_deactivated(&self) -> bool {
        self.deactivated_time != 0 || !self.status.is_active()
    }
}

/// Registry of all validators ever created
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    /// Validators indexed by id
    validators: BTreeMap<ValidatorId, Validator>,

    /// Validator id by owner address
    by_auth: BTreeMap<Address, ValidatorId>,

    /// Highest id in use
    last_validator_id: ValidatorId,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a new validator registration
    pub fn check_registration(
        &self,
        auth: &Address,
        pubkey: &[u8],
        self_stake: Amount,
        min_self_stake: Amount,
    ) -> Result<()> {
        if pubkey.is_empty() {
            return Err(ValidationError::EmptyPubkey.into());
        }

        if self_stake < min_self_stake {
            return Err(ValidationError::InsufficientSelfStake {
                required: min_self_stake,
                provided: self_stake,
            }
            .into());
        }

        if self.by_auth.contains_key(auth) {
            return Err(ValidationError::AlreadyExists(*auth).into());
        }

        Ok(())
    }

    /// Next sequential id
    pub fn next_id(&self) -> ValidatorId {
        self.last_validator_id + 1
    }

    /// Insert a validator record
    ///
    /// The id and owner must be unused.
    pub fn insert(&mut self, validator: Validator) -> Result<()> {
        if validator.id == 0 || self.validators.contains_key(&validator.id) {
            return Err(ValidationError::InvalidGenesis(format!(
                "validator id {} is taken or invalid",
                validator.id
            ))
            .into());
        }
        if self.by_auth.contains_key(&validator.auth) {
            return Err(ValidationError::AlreadyExists(validator.auth).into());
        }

        info!(
            "Registered validator {} owned by {} (epoch {}, status {})",
            validator.id, validator.auth, validator.created_epoch, validator.status
        );

        self.last_validator_id = self.last_validator_id.max(validator.id);
        self.by_auth.insert(validator.auth, validator.id);
        self.validators.insert(validator.id, validator);
        Ok(())
    }

    /// Get validator by id
    pub fn get(&self, validator_id: ValidatorId) -> Option<&Validator> {
        self.validators.get(&validator_id)
    }

    pub(crate) fn get_mut(&mut self, validator_id: ValidatorId) -> Option<&mut Validator> {
        self.validators.get_mut(&validator_id)
    }

    /// Get a validator, failing with `NoSuchValidator` when absent
    pub fn require(&self, validator_id: ValidatorId) -> Result<&Validator> {
        self.validators
            .get(&validator_id)
            .ok_or_else(|| ValidationError::NoSuchValidator(validator_id).into())
    }

    /// Get a validator that can still accept stake
    ///
    /// Withdrawn validators count as absent; offline or double-signed ones
    /// fail with `ValidatorInactive`.
    pub fn require_active(&self, validator_id: ValidatorId) -> Result<&Validator> {
        let validator = self.require(validator_id)?;
        if validator.status.withdrawn {
            return Err(ValidationError::NoSuchValidator(validator_id).into());
        }
        if !validator.is_active() {
            return Err(StateError::ValidatorInactive(validator_id).into());
        }
        Ok(validator)
    }

    /// Validator id owned by `auth`
    pub fn id_of(&self, auth: &Address) -> Option<ValidatorId> {
        self.by_auth.get(auth).copied()
    }

    /// Highest id in use
    pub fn last_validator_id(&self) -> ValidatorId {
        self.last_validator_id
    }

    /// Validate a status change without applying it
    pub fn check_deactivation(&self, validator_id: ValidatorId, bits: u64) -> Result<ValidatorStatus> {
        let validator = self.require(validator_id)?;
        let added = ValidatorStatus::from_bits(bits).ok_or(StateError::WrongStatus)?;
        if added.is_active() {
            return Err(StateError::WrongStatus.into());
        }
        let merged = validator.status.union(added);
        if merged == validator.status {
            return Err(StateError::WrongStatus.into());
        }
        Ok(merged)
    }

    /// Add status flags, stamping the first deactivation
    pub fn deactivate(
        &mut self,
        validator_id: ValidatorId,
        bits: u64,
        epoch: u64,
        time: u64,
    ) -> Result<ValidatorStatus> {
        let merged = self.check_deactivation(validator_id, bits)?;
        let validator = self
            .validators
            .get_mut(&validator_id)
            .ok_or(ValidationError::NoSuchValidator(validator_id))?;

        if validator.deactivated_time == 0 {
            validator.deactivated_epoch = epoch;
            validator.deactivated_time = time;
        }
        validator.status = merged;

        warn!(
            "Validator {} deactivated: status {} at epoch {}",
            validator_id, merged, validator.deactivated_epoch
        );

        Ok(merged)
    }

    /// Increase received stake
    pub(crate) fn add_stake(&mut self, validator_id: ValidatorId, amount: Amount) -> Result<()> {
        let validator = self
            .validators
            .get_mut(&validator_id)
            .ok_or(ValidationError::NoSuchValidator(validator_id))?;
        validator.received_stake += amount;
        Ok(())
    }

    /// Decrease received stake
    pub(crate) fn sub_stake(&mut self, validator_id: ValidatorId, amount: Amount) -> Result<()> {
        let validator = self
            .validators
            .get_mut(&validator_id)
            .ok_or(ValidationError::NoSuchValidator(validator_id))?;
        validator.received_stake = validator
            .received_stake
            .checked_sub(amount)
            .ok_or_else(|| StateError::Inconsistent(format!(
                "validator {} received stake below zero",
                validator_id
            )))?;
        Ok(())
    }

    /// All validators in id order
    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// No validator registered
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Sum of received stake over all validators
    pub fn total_stake(&self) -> Amount {
        self.validators
            .values()
            .fold(Amount::zero(), |acc, v| acc + v.received_stake)
    }

    /// Sum of received stake over active validators
    pub fn total_active_stake(&self) -> Amount {
        self.validators
            .values()
            .filter(|v| v.is_active())
            .fold(Amount::zero(), |acc, v| acc + v.received_stake)
    }
}
