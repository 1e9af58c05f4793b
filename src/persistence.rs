//! Ledger persistence
//!
//! This module handles:
//! - Exporting the whole ledger as a serializable image
//! - JSON encoding of images for hosts that store them as documents
//! - Restoring a ledger from an image, verified against the ledger
//!   invariants before it is handed out
//!
//! The image mirrors the persisted tables: validators by id, delegations by
//! (staker, validator), snapshots by epoch and withdrawal requests by
//! (staker, validator, request id).

use crate::config::StakingConfig;
use crate::delegation::{Delegation, DelegationLedger};
use crate::error::{Result, StateError};
use crate::policy::DefaultRewardPolicy;
use crate::sealing::SealingState;
use crate::snapshot::{EpochSnapshot, EpochSnapshotStore};
use crate::staking::StakingLedger;
use crate::types::{Address, Amount};
use crate::validator::{Validator, ValidatorRegistry};
use crate::withdrawal::{WithdrawalQueue, WithdrawalRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Current image layout
pub const LEDGER_IMAGE_VERSION: u32 = 1;

/// Serializable copy of a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerImage {
    /// Layout version
    pub version: u32,

    /// Ledger configuration
    pub config: StakingConfig,

    /// Sealing authority
    pub authority: Address,

    /// Validators in id order
    pub validators: Vec<Validator>,

    /// Delegations in (staker, validator) order
    pub delegations: Vec<Delegation>,

    /// Snapshots from genesis on
    pub snapshots: Vec<EpochSnapshot>,

    /// Pending withdrawal requests
    pub withdrawals: Vec<WithdrawalRequest>,

    /// Sealing phase, roster and weight outbox
    pub sealing: SealingState,

    /// Stake removed by slashing
    pub total_slashed_stake: Amount,

    /// Stake burnt by early unlocks
    pub total_burned_penalties: Amount,
}

impl StakingLedger {
    /// Export the full state
    pub fn export_image(&self) -> LedgerImage {
        LedgerImage {
            version: LEDGER_IMAGE_VERSION,
            config: self.config.clone(),
            authority: self.authority,
            validators: self.validators.iter().cloned().collect(),
            delegations: self.delegations.iter().cloned().collect(),
            snapshots: self.snapshots.iter().cloned().collect(),
            withdrawals: self.withdrawals.iter().cloned().collect(),
            sealing: self.sealing.clone(),
            total_slashed_stake: self.total_slashed_stake,
            total_burned_penalties: self.total_burned_penalties,
        }
    }

    /// Export the full state as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.export_image())
            .map_err(|e| StateError::Inconsistent(format!("cannot encode ledger image: {}", e)).into())
    }

    /// Rebuild a ledger from an image and verify it at `now`
    ///
    /// The restored ledger uses the default reward policy.
    pub fn from_image(image: LedgerImage, now: u64) -> Result<Self> {
        if image.version != LEDGER_IMAGE_VERSION {
            return Err(StateError::Inconsistent(format!(
                "unsupported ledger image version {}",
                image.version
            ))
            .into());
        }
        image.config.validate()?;

        let mut validators = ValidatorRegistry::new();
        for validator in image.validators {
            validators.insert(validator)?;
        }

        let mut delegations = DelegationLedger::new();
        for delegation in image.delegations {
            delegations.insert(delegation);
        }

        let mut withdrawals = WithdrawalQueue::new();
        for request in image.withdrawals {
            withdrawals.insert(request);
        }

        for validator_id in &image.sealing.roster.validator_ids {
            if validators.get(*validator_id).is_none() {
                return Err(StateError::Inconsistent(format!(
                    "roster names unknown validator {}",
                    validator_id
                ))
                .into());
            }
        }

        let ledger = Self {
            config: image.config,
            authority: image.authority,
            policy: Arc::new(DefaultRewardPolicy),
            validators,
            delegations,
            snapshots: EpochSnapshotStore::from_snapshots(image.snapshots)?,
            withdrawals,
            sealing: image.sealing,
            total_slashed_stake: image.total_slashed_stake,
            total_burned_penalties: image.total_burned_penalties,
        };

        if let Err(e) = ledger.check_invariants(now) {
            error!("Rejected ledger image: {}", e);
            return Err(e);
        }

        info!(
            "Restored staking ledger at epoch {} ({} validators, {} delegations, {} withdrawals)",
            ledger.current_sealed_epoch(),
            ledger.validators.len(),
            ledger.delegations.len(),
            ledger.withdrawals.len()
        );
        Ok(ledger)
    }

    /// Rebuild a ledger from JSON produced by [`StakingLedger::to_json`]
    pub fn from_json(json: &str, now: u64) -> Result<Self> {
        let image: LedgerImage = serde_json::from_str(json)
            .map_err(|e| StateError::Inconsistent(format!("cannot decode ledger image: {}", e)))?;
        Self::from_image(image, now)
    }
}
