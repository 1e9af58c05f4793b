//! Staking ledger
//!
//! This module handles:
//! - The ledger object owning validators, delegations, snapshots and
//!   withdrawal requests
//! - Validator registration and deactivation
//! - Genesis import of validators and delegations
//! - Read access to validators and sealed epoch data
//! - Cross-table consistency checks
//!
//! Delegation, lockup, reward, withdrawal and sealing operations live in
//! their own modules as further `impl StakingLedger` blocks.

use crate::config::StakingConfig;
use crate::delegation::{Delegation, DelegationLedger};
use crate::error::{Result, StateError, ValidationError};
use crate::lockup::LockedDelegation;
use crate::policy::{DefaultRewardPolicy, RewardPolicy};
use crate::sealing::SealingState;
use crate::snapshot::{EpochSnapshot, EpochSnapshotStore, ValidatorEpochRecord};
use crate::types::{Address, Amount, CallContext, ValidatorId};
use crate::validator::{Validator, ValidatorRegistry, ValidatorStatus};
use crate::withdrawal::WithdrawalQueue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Validator imported at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Validator id, must be above every id already issued
    pub id: ValidatorId,

    /// Validator authority address
    pub auth: Address,

    /// Consensus public key
    pub pubkey: Vec<u8>,

    /// Raw status bits
    pub status: u64,

    /// Creation epoch
    pub created_epoch: u64,

    /// Creation time
    pub created_time: u64,

    /// Deactivation epoch, 0 if active
    pub deactivated_epoch: u64,

    /// Deactivation time, 0 if active
    pub deactivated_time: u64,
}

/// Delegation imported at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDelegation {
    /// Staker address
    pub staker: Address,

    /// Validator id
    pub validator_id: ValidatorId,

    /// Delegated stake
    pub stake: Amount,

    /// Locked part of the stake
    pub locked_stake: Amount,

    /// First epoch of the lock bonus
    pub lockup_from_epoch: u64,

    /// Lock end time
    pub lockup_end_time: u64,

    /// Lock duration in seconds
    pub lockup_duration: u64,

    /// Bonus forfeited on early unlock
    pub early_unlock_penalty: Amount,

    /// Unclaimed rewards carried over
    pub rewards: Amount,
}

/// Proof-of-stake staking ledger
#[derive(Debug, Clone)]
pub struct StakingLedger {
    pub(crate) config: StakingConfig,
    pub(crate) authority: Address,
    pub(crate) policy: Arc<dyn RewardPolicy>,
    pub(crate) validators: ValidatorRegistry,
    pub(crate) delegations: DelegationLedger,
    pub(crate) snapshots: EpochSnapshotStore,
    pub(crate) withdrawals: WithdrawalQueue,
    pub(crate) sealing: SealingState,
    pub(crate) total_slashed_stake: Amount,
    pub(crate) total_burned_penalties: Amount,
}

impl StakingLedger {
    /// Create an empty ledger with epoch 0 sealed at `genesis_time`
    pub fn new(config: StakingConfig, authority: Address, genesis_time: u64) -> Result<Self> {
        config.validate()?;
        info!(
            "Staking ledger created: authority {}, genesis time {}",
            authority, genesis_time
        );
        Ok(Self {
            config,
            authority,
            policy: Arc::new(DefaultRewardPolicy),
            validators: ValidatorRegistry::new(),
            delegations: DelegationLedger::new(),
            snapshots: EpochSnapshotStore::new(genesis_time),
            withdrawals: WithdrawalQueue::new(),
            sealing: SealingState::default(),
            total_slashed_stake: Amount::zero(),
            total_burned_penalties: Amount::zero(),
        })
    }

    /// Replace the reward policy used by future seals
    pub fn with_policy(mut self, policy: Arc<dyn RewardPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Sealing authority address
    pub fn authority(&self) -> Address {
        self.authority
    }

    /// Latest sealed epoch
    pub fn current_sealed_epoch(&self) -> u64 {
        self.snapshots.latest_epoch()
    }

    /// Open epoch, the one the next seal closes
    pub fn current_epoch(&self) -> u64 {
        self.current_sealed_epoch() + 1
    }

    /// Register the caller as a validator with `self_stake`
    pub fn create_validator(&mut self, ctx: &CallContext, pubkey: Vec<u8>, self_stake: Amount) -> Result<ValidatorId> {
        self.ensure_not_sealing()?;
        let auth = ctx.caller;
        self.validators
            .check_registration(&auth, &pubkey, self_stake, self.config.min_self_stake)?;

        let validator_id = self.validators.next_id();
        let validator = Validator::new(validator_id, auth, pubkey, self.current_epoch(), ctx.now);
        self.validators.insert(validator)?;
        self.raw_delegate(&auth, validator_id, self_stake)?;

        info!(
            "Validator {} created by {} with self-stake {}",
            validator_id, auth, self_stake
        );
        Ok(validator_id)
    }

    /// Add status bits to a validator
    pub fn deactivate_validator(&mut self, ctx: &CallContext, validator_id: ValidatorId, status: u64) -> Result<ValidatorStatus> {
        self.ensure_authority(&ctx.caller)?;
        let epoch = self.current_epoch();
        self.validators.deactivate(validator_id, status, epoch, ctx.now)
    }

    /// Import a validator
    pub fn set_genesis_validator(&mut self, ctx: &CallContext, genesis: GenesisValidator) -> Result<()> {
        self.ensure_authority(&ctx.caller)?;
        self.ensure_not_sealing()?;
        if genesis.pubkey.is_empty() {
            return Err(ValidationError::EmptyPubkey.into());
        }
        if genesis.id <= self.validators.last_validator_id() {
            return Err(ValidationError::InvalidGenesis(format!(
                "validator id {} is not above {}",
                genesis.id,
                self.validators.last_validator_id()
            ))
            .into());
        }
        let status = ValidatorStatus::from_bits(genesis.status).ok_or_else(|| {
            ValidationError::InvalidGenesis(format!("unknown status bits {:#x}", genesis.status))
        })?;
        if !status.is_active() && genesis.deactivated_time == 0 {
            return Err(ValidationError::InvalidGenesis(format!(
                "validator {} is inactive without deactivation time",
                genesis.id
            ))
            .into());
        }

        let mut validator = Validator::new(
            genesis.id,
            genesis.auth,
            genesis.pubkey,
            genesis.created_epoch,
            genesis.created_time,
        );
        validator.status = status;
        validator.deactivated_epoch = genesis.deactivated_epoch;
        validator.deactivated_time = genesis.deactivated_time;
        self.validators.insert(validator)?;

        debug!("Genesis validator {} imported ({})", genesis.id, status);
        Ok(())
    }

    /// Import a delegation, optionally locked, with carried-over rewards
    pub fn set_genesis_delegation(&mut self, ctx: &CallContext, genesis: GenesisDelegation) -> Result<()> {
        self.ensure_authority(&ctx.caller)?;
        self.ensure_not_sealing()?;
        let staker = genesis.staker;
        let validator_id = genesis.validator_id;
        let validator = self.validators.require_active(validator_id)?;
        let (auth, received_stake) = (validator.auth, validator.received_stake);
        if genesis.stake.is_zero() {
            return Err(ValidationError::ZeroAmount.into());
        }
        if genesis.locked_stake > genesis.stake {
            return Err(ValidationError::InvalidGenesis(format!(
                "locked {} exceeds stake {}",
                genesis.locked_stake, genesis.stake
            ))
            .into());
        }

        let self_after = if staker == auth {
            self.self_stake(validator_id) + genesis.stake
        } else {
            self.self_stake(validator_id)
        };
        self.ensure_delegation_cap(validator_id, self_after, received_stake + genesis.stake)?;

        if !genesis.locked_stake.is_zero() {
            let duration = genesis.lockup_duration;
            if duration < self.config.min_lockup_duration || duration > self.config.max_lockup_duration {
                return Err(ValidationError::IncorrectDuration {
                    duration,
                    min: self.config.min_lockup_duration,
                    max: self.config.max_lockup_duration,
                }
                .into());
            }
            if staker != auth {
                let validator_end = self
                    .lockup_info(&auth, validator_id)
                    .filter(|l| l.is_active(ctx.now))
                    .map(|l| l.end_time)
                    .unwrap_or_default();
                if genesis.lockup_end_time > validator_end {
                    return Err(ValidationError::ValidatorLockupTooShort(validator_id).into());
                }
            }
        }

        self.stash(&staker, validator_id, ctx.now);
        self.raw_delegate(&staker, validator_id, genesis.stake)?;

        let delegation = self.delegations.require_mut(&staker, validator_id)?;
        delegation.reward_stash.unlocked_reward += genesis.rewards;
        if !genesis.locked_stake.is_zero() {
            delegation.lockup = Some(LockedDelegation {
                locked_amount: delegation.recorded_locked_amount() + genesis.locked_stake,
                from_epoch: genesis.lockup_from_epoch,
                end_time: genesis.lockup_end_time,
                duration: genesis.lockup_duration,
            });
            delegation.stashed_lockup_rewards.lockup_extra_reward += genesis.early_unlock_penalty;
        }

        debug!(
            "Genesis delegation {} -> {}: stake {}, locked {}",
            staker, validator_id, genesis.stake, genesis.locked_stake
        );
        Ok(())
    }

    /// Validator by id
    pub fn validator(&self, validator_id: ValidatorId) -> Option<&Validator> {
        self.validators.get(validator_id)
    }

    /// All validators in id order
    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Validator registered by `auth`
    pub fn validator_id_of(&self, auth: &Address) -> Option<ValidatorId> {
        self.validators.id_of(auth)
    }

    /// Consensus public key of a validator
    pub fn validator_pubkey(&self, validator_id: ValidatorId) -> Option<&[u8]> {
        self.validators.get(validator_id).map(|v| v.pubkey.as_slice())
    }

    /// Highest validator id issued
    pub fn last_validator_id(&self) -> ValidatorId {
        self.validators.last_validator_id()
    }

    /// Validator was caught double signing
    pub fn is_slashed(&self, validator_id: ValidatorId) -> bool {
        self.validators
            .get(validator_id)
            .map(|v| v.is_slashed())
            .unwrap_or(false)
    }

    /// Stake position of `staker` on `validator_id`
    pub fn delegation(&self, staker: &Address, validator_id: ValidatorId) -> Option<&Delegation> {
        self.delegations.get(staker, validator_id)
    }

    /// Stake delegated to all validators
    pub fn total_stake(&self) -> Amount {
        self.validators.total_stake()
    }

    /// Stake delegated to active validators
    pub fn total_active_stake(&self) -> Amount {
        self.validators.total_active_stake()
    }

    /// Stake removed by double-sign slashing
    pub fn total_slashed_stake(&self) -> Amount {
        self.total_slashed_stake
    }

    /// Stake burnt as early unlock penalty
    pub fn total_burned_penalties(&self) -> Amount {
        self.total_burned_penalties
    }

    /// Sealed epoch snapshot
    pub fn epoch_snapshot(&self, epoch: u64) -> Option<&EpochSnapshot> {
        self.snapshots.get(epoch)
    }

    /// Validators of an epoch; for the open epoch, its fixed roster
    pub fn epoch_validator_ids(&self, epoch: u64) -> Vec<ValidatorId> {
        if epoch == self.current_epoch() {
            return self.sealing.roster.validator_ids.clone();
        }
        self.snapshots
            .get(epoch)
            .map(|s| s.validator_ids.clone())
            .unwrap_or_default()
    }

    fn epoch_record(&self, epoch: u64, validator_id: ValidatorId) -> Option<&ValidatorEpochRecord> {
        self.snapshots.get(epoch).and_then(|s| s.validator(validator_id))
    }

    /// Stake a validator was sealed with in an epoch
    pub fn epoch_received_stake(&self, epoch: u64, validator_id: ValidatorId) -> Amount {
        self.epoch_record(epoch, validator_id)
            .map(|r| r.received_stake)
            .unwrap_or_default()
    }

    /// Accumulated reward per token of a validator at an epoch
    pub fn epoch_accumulated_reward_per_token(&self, epoch: u64, validator_id: ValidatorId) -> Amount {
        self.snapshots.accumulated_reward_per_token(epoch, validator_id)
    }

    /// Accumulated uptime of a validator at an epoch
    pub fn epoch_accumulated_uptime(&self, epoch: u64, validator_id: ValidatorId) -> u64 {
        self.epoch_record(epoch, validator_id)
            .map(|r| r.accumulated_uptime)
            .unwrap_or_default()
    }

    /// Accumulated originated fee of a validator at an epoch
    pub fn epoch_accumulated_originated_txs_fee(&self, epoch: u64, validator_id: ValidatorId) -> Amount {
        self.epoch_record(epoch, validator_id)
            .map(|r| r.accumulated_originated_txs_fee)
            .unwrap_or_default()
    }

    /// Offline time reported for a validator in an epoch
    pub fn epoch_offline_time(&self, epoch: u64, validator_id: ValidatorId) -> u64 {
        self.epoch_record(epoch, validator_id)
            .map(|r| r.offline_time)
            .unwrap_or_default()
    }

    /// Offline blocks reported for a validator in an epoch
    pub fn epoch_offline_blocks(&self, epoch: u64, validator_id: ValidatorId) -> u64 {
        self.epoch_record(epoch, validator_id)
            .map(|r| r.offline_blocks)
            .unwrap_or_default()
    }

    /// Verify cross-table consistency at `now`
    pub fn check_invariants(&self, now: u64) -> Result<()> {
        let sealed = self.current_sealed_epoch();

        let mut received: BTreeMap<ValidatorId, Amount> = BTreeMap::new();
        for delegation in self.delegations.iter() {
            let validator = self.validators.get(delegation.validator_id).ok_or_else(|| {
                StateError::Inconsistent(format!(
                    "delegation of {} on unknown validator {}",
                    delegation.staker, delegation.validator_id
                ))
            })?;
            *received.entry(delegation.validator_id).or_default() += delegation.stake;

            if delegation.paid_until_epoch > sealed {
                return Err(StateError::Inconsistent(format!(
                    "{} paid until epoch {} past sealed epoch {}",
                    delegation.staker, delegation.paid_until_epoch, sealed
                ))
                .into());
            }

            let Some(lockup) = delegation.lockup else {
                continue;
            };
            if lockup.is_active(now) && lockup.locked_amount > delegation.stake {
                return Err(StateError::Inconsistent(format!(
                    "{} locked {} above stake {} on validator {}",
                    delegation.staker, lockup.locked_amount, delegation.stake, delegation.validator_id
                ))
                .into());
            }
            if delegation.staker != validator.auth && lockup.is_active(now) {
                let validator_end = self
                    .lockup_info(&validator.auth, validator.id)
                    .filter(|l| l.is_active(now))
                    .map(|l| l.end_time)
                    .unwrap_or_default();
                if lockup.end_time > validator_end {
                    return Err(StateError::Inconsistent(format!(
                        "{} locked until {} past validator {} lock end {}",
                        delegation.staker, lockup.end_time, validator.id, validator_end
                    ))
                    .into());
                }
            }
        }

        for validator in self.validators.iter() {
            let sum = received.get(&validator.id).copied().unwrap_or_default();
            if sum != validator.received_stake {
                return Err(StateError::Inconsistent(format!(
                    "validator {} received {} but delegations sum to {}",
                    validator.id, validator.received_stake, sum
                ))
                .into());
            }
        }

        for request in self.withdrawals.iter() {
            if self.validators.get(request.validator_id).is_none() || request.amount.is_zero() {
                return Err(StateError::Inconsistent(format!(
                    "withdrawal request {} of {} is invalid",
                    request.id, request.staker
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StakingError;
    use crate::types::parse_units;

    fn create_test_address(id: u8) -> Address {
        Address::repeat_byte(id)
    }

    const DAY: u64 = 24 * 60 * 60;

    fn tokens(value: &str) -> Amount {
        parse_units(value).unwrap()
    }

    fn create_test_ledger() -> StakingLedger {
        let config = StakingConfig::default().with_base_reward_per_second(Amount::one());
        StakingLedger::new(config, create_test_address(0xff), 0).unwrap()
    }

    #[test]
    fn test_create_validators() {
        let mut ledger = create_test_ledger();
        let first = CallContext::new(create_test_address(1), 10);
        let second = CallContext::new(create_test_address(2), 20);

        let a = ledger.create_validator(&first, vec![1], tokens("0.3175")).unwrap();
        let b = ledger.create_validator(&second, vec![2], tokens("0.5")).unwrap();

        assert_eq!((a, b), (1, 2));
        assert_eq!(ledger.last_validator_id(), 2);
        assert_eq!(ledger.total_stake(), tokens("0.8175"));
        assert_eq!(ledger.validator(b).unwrap().created_epoch, 1);
        assert_eq!(ledger.validator(b).unwrap().created_time, 20);
        assert_eq!(ledger.validator_id_of(&create_test_address(2)), Some(b));
        assert_eq!(ledger.validator_pubkey(a), Some(&[1u8][..]));
        assert_eq!(ledger.self_stake(a), tokens("0.3175"));
        ledger.check_invariants(20).unwrap();
    }

    #[test]
    fn test_create_validator_errors() {
        let mut ledger = create_test_ledger();
        let ctx = CallContext::new(create_test_address(1), 0);

        assert_eq!(
            ledger.create_validator(&ctx, vec![], tokens("1")).unwrap_err(),
            ValidationError::EmptyPubkey.into()
        );
        assert!(matches!(
            ledger.create_validator(&ctx, vec![1], tokens("0.3")).unwrap_err(),
            StakingError::Validation(ValidationError::InsufficientSelfStake { .. })
        ));
        ledger.create_validator(&ctx, vec![1], tokens("1")).unwrap();
        assert_eq!(
            ledger.create_validator(&ctx, vec![1], tokens("1")).unwrap_err(),
            ValidationError::AlreadyExists(create_test_address(1)).into()
        );
    }

    #[test]
    fn test_deactivate_validator() {
        let mut ledger = create_test_ledger();
        let ctx = CallContext::new(create_test_address(1), 0);
        let id = ledger.create_validator(&ctx, vec![1], tokens("1")).unwrap();

        assert!(ledger.deactivate_validator(&ctx, id, ValidatorStatus::DOUBLESIGN_BIT).is_err());

        let authority = CallContext::new(create_test_address(0xff), 50);
        ledger
            .deactivate_validator(&authority, id, ValidatorStatus::DOUBLESIGN_BIT)
            .unwrap();
        assert!(ledger.is_slashed(id));
        assert_eq!(ledger.total_active_stake(), Amount::zero());
        assert_eq!(ledger.validator(id).unwrap().deactivated_time, 50);
        assert_eq!(
            ledger
                .deactivate_validator(&authority, id, ValidatorStatus::DOUBLESIGN_BIT)
                .unwrap_err(),
            StateError::WrongStatus.into()
        );
    }

    #[test]
    fn test_genesis_import() {
        let mut ledger = create_test_ledger();
        let authority = CallContext::new(create_test_address(0xff), 0);
        let auth = create_test_address(1);
        let staker = create_test_address(2);

        ledger
            .set_genesis_validator(
                &authority,
                GenesisValidator {
                    id: 5,
                    auth,
                    pubkey: vec![5],
                    status: 0,
                    created_epoch: 0,
                    created_time: 0,
                    deactivated_epoch: 0,
                    deactivated_time: 0,
                },
            )
            .unwrap();
        assert_eq!(ledger.last_validator_id(), 5);

        let base = GenesisDelegation {
            staker: auth,
            validator_id: 5,
            stake: tokens("2"),
            locked_stake: tokens("1"),
            lockup_from_epoch: 1,
            lockup_end_time: 100 * DAY,
            lockup_duration: 100 * DAY,
            early_unlock_penalty: Amount::zero(),
            rewards: Amount::zero(),
        };
        ledger.set_genesis_delegation(&authority, base.clone()).unwrap();
        ledger
            .set_genesis_delegation(
                &authority,
                GenesisDelegation {
                    staker,
                    stake: tokens("1"),
                    locked_stake: tokens("0.5"),
                    lockup_end_time: 30 * DAY,
                    lockup_duration: 30 * DAY,
                    early_unlock_penalty: tokens("0.01"),
                    rewards: tokens("0.2"),
                    ..base.clone()
                },
            )
            .unwrap();

        assert_eq!(ledger.total_stake(), tokens("3"));
        assert_eq!(ledger.locked_stake(&staker, 5, 10), tokens("0.5"));
        assert_eq!(
            ledger.delegation(&staker, 5).unwrap().reward_stash.unlocked_reward,
            tokens("0.2")
        );
        assert_eq!(ledger.rewards_stash(&staker, 5), tokens("0.2"));
        ledger.check_invariants(10).unwrap();

        assert!(matches!(
            ledger
                .set_genesis_delegation(
                    &authority,
                    GenesisDelegation {
                        locked_stake: tokens("3"),
                        ..base.clone()
                    }
                )
                .unwrap_err(),
            StakingError::Validation(ValidationError::InvalidGenesis(_))
        ));
        let stranger = CallContext::new(staker, 0);
        assert!(ledger.set_genesis_delegation(&stranger, base).is_err());
    }

    #[test]
    fn test_genesis_import_keeps_stake_rules() {
        let mut ledger = create_test_ledger();
        let authority = CallContext::new(create_test_address(0xff), 0);
        let auth = create_test_address(1);
        let staker = create_test_address(2);

        ledger
            .set_genesis_validator(
                &authority,
                GenesisValidator {
                    id: 1,
                    auth,
                    pubkey: vec![1],
                    status: 0,
                    created_epoch: 0,
                    created_time: 0,
                    deactivated_epoch: 0,
                    deactivated_time: 0,
                },
            )
            .unwrap();
        let own = GenesisDelegation {
            staker: auth,
            validator_id: 1,
            stake: tokens("1"),
            locked_stake: tokens("1"),
            lockup_from_epoch: 1,
            lockup_end_time: 20 * DAY,
            lockup_duration: 20 * DAY,
            early_unlock_penalty: Amount::zero(),
            rewards: Amount::zero(),
        };
        ledger.set_genesis_delegation(&authority, own.clone()).unwrap();
        let image = ledger.export_image();

        let delegated = GenesisDelegation {
            staker,
            stake: tokens("2"),
            locked_stake: tokens("1"),
            lockup_end_time: 30 * DAY,
            lockup_duration: 30 * DAY,
            ..own.clone()
        };
        assert_eq!(
            ledger
                .set_genesis_delegation(&authority, delegated.clone())
                .unwrap_err(),
            ValidationError::ValidatorLockupTooShort(1).into()
        );
        assert_eq!(
            ledger
                .set_genesis_delegation(
                    &authority,
                    GenesisDelegation {
                        stake: tokens("100"),
                        locked_stake: Amount::zero(),
                        ..delegated.clone()
                    }
                )
                .unwrap_err(),
            ValidationError::DelegationCapExceeded(1).into()
        );
        assert!(matches!(
            ledger
                .set_genesis_delegation(
                    &authority,
                    GenesisDelegation {
                        lockup_end_time: 10 * DAY,
                        lockup_duration: 10 * DAY,
                        ..delegated.clone()
                    }
                )
                .unwrap_err(),
            StakingError::Validation(ValidationError::IncorrectDuration { .. })
        ));
        assert_eq!(ledger.export_image(), image);

        ledger
            .set_genesis_delegation(
                &authority,
                GenesisDelegation {
                    lockup_end_time: 20 * DAY,
                    lockup_duration: 20 * DAY,
                    ..delegated
                },
            )
            .unwrap();
        ledger.check_invariants(0).unwrap();
    }

    #[test]
    fn test_epoch_validator_ids_of_open_epoch() {
        let mut ledger = create_test_ledger();
        let authority = CallContext::new(create_test_address(0xff), 0);
        let id = ledger
            .create_validator(&CallContext::new(create_test_address(1), 0), vec![1], tokens("1"))
            .unwrap();

        assert!(ledger.epoch_validator_ids(1).is_empty());
        ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&authority, &[id]).unwrap();
        assert_eq!(ledger.epoch_validator_ids(2), vec![id]);
        assert!(ledger.epoch_validator_ids(1).is_empty());
        assert_eq!(ledger.epoch_snapshot(1).unwrap().total_stake, tokens("1"));
    }

    #[test]
    fn test_invariants_catch_drift() {
        let mut ledger = create_test_ledger();
        let ctx = CallContext::new(create_test_address(1), 0);
        let id = ledger.create_validator(&ctx, vec![1], tokens("1")).unwrap();
        ledger.check_invariants(0).unwrap();

        if let Some(validator) = ledger.validators.get_mut(id) {
            validator.received_stake += Amount::one();
        }
        assert!(matches!(
            ledger.check_invariants(0).unwrap_err(),
            StakingError::State(StateError::Inconsistent(_))
        ));
    }
}
