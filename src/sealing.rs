//! Epoch sealing protocol
//!
//! The sealing authority closes every epoch in two steps:
//! 1. `seal_epoch` computes rewards from the reported metrics and writes the
//!    epoch snapshot
//! 2. `seal_epoch_validators` fixes the roster of the next epoch and reports
//!    validator weight changes to consensus
//!
//! Between the two steps the ledger is `Sealing` and rejects stake changes.
//! Each step validates everything before the first write.

use crate::error::{AuthorizationError, Result, StateError, ValidationError};
use crate::lockup::scale_lockup_reward;
use crate::policy::ValidatorEpochMetrics;
use crate::snapshot::{EpochSnapshot, ValidatorEpochRecord};
use crate::staking::StakingLedger;
use crate::types::{unit, Address, Amount, CallContext, Rewards, Transfer, TransferKind, ValidatorId};
use crate::validator::ValidatorStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Position in the sealing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SealPhase {
    /// Latest epoch sealed, roster of the open epoch fixed
    #[default]
    Sealed,

    /// Epoch snapshot written, next roster pending
    Sealing,
}

/// Validators an open epoch will be sealed against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRoster {
    /// Validators in roster order
    pub validator_ids: Vec<ValidatorId>,

    /// Stake of each validator when the roster was fixed
    pub received_stake: BTreeMap<ValidatorId, Amount>,
}

/// Weight change reported to consensus; zero removes the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorWeightUpdate {
    /// Validator id
    pub validator_id: ValidatorId,

    /// New weight
    pub weight: Amount,
}

/// Sealing state machine data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealingState {
    /// Current phase
    pub phase: SealPhase,

    /// Roster of the open epoch
    pub roster: EpochRoster,

    /// Last weight reported per validator, zero weights omitted
    pub reported_weights: BTreeMap<ValidatorId, Amount>,

    /// Weight updates not yet drained by the consensus bridge
    pub outbox: Vec<ValidatorWeightUpdate>,
}

/// Summary of a sealed epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSealReport {
    /// Sealed epoch
    pub epoch: u64,

    /// Seconds rewarded
    pub duration: u64,

    /// Base and fee rewards distributed
    pub total_reward: Amount,

    /// Validators deactivated as offline
    pub offline: Vec<ValidatorId>,

    /// Treasury share of the epoch fees
    pub treasury_transfer: Option<Transfer>,
}

/// Per-validator outcome computed before anything is written
struct ValidatorSeal {
    validator_id: ValidatorId,
    auth: Address,
    commission: Rewards,
    record: ValidatorEpochRecord,
    raw_reward: Amount,
}

fn checked_mul(a: Amount, b: Amount) -> Result<Amount> {
    Ok(a.checked_mul(b).ok_or(ValidationError::RewardOverflow)?)
}

fn checked_sum(values: impl Iterator<Item = Amount>) -> Result<Amount> {
    let mut sum = Amount::zero();
    for value in values {
        sum = sum.checked_add(value).ok_or(ValidationError::RewardOverflow)?;
    }
    Ok(sum)
}

impl StakingLedger {
    /// Caller is the sealing authority
    pub fn is_sealing_authority(&self, caller: &Address) -> bool {
        *caller == self.authority
    }

    pub(crate) fn ensure_authority(&self, caller: &Address) -> Result<()> {
        if !self.is_sealing_authority(caller) {
            return Err(AuthorizationError::NotSealingAuthority { caller: *caller }.into());
        }
        Ok(())
    }

    pub(crate) fn ensure_not_sealing(&self) -> Result<()> {
        if self.sealing.phase == SealPhase::Sealing {
            return Err(StateError::SealInProgress.into());
        }
        Ok(())
    }

    /// Current sealing phase
    pub fn seal_phase(&self) -> SealPhase {
        self.sealing.phase
    }

    /// Seal the open epoch
    ///
    /// The metric arrays follow the order of the epoch roster. Originated
    /// fees are cumulative per validator; the epoch fee is their growth.
    pub fn seal_epoch(
        &mut self,
        ctx: &CallContext,
        offline_times: &[u64],
        offline_blocks: &[u64],
        uptimes: &[u64],
        originated_txs_fees: &[Amount],
    ) -> Result<EpochSealReport> {
        self.ensure_authority(&ctx.caller)?;
        self.ensure_not_sealing()?;

        let roster = &self.sealing.roster;
        let expected = roster.validator_ids.len();
        for got in [
            offline_times.len(),
            offline_blocks.len(),
            uptimes.len(),
            originated_txs_fees.len(),
        ] {
            if got != expected {
                return Err(ValidationError::MetricsLengthMismatch { expected, got }.into());
            }
        }

        let prev = self.snapshots.latest();
        let epoch = prev.epoch + 1;
        let duration = if ctx.now > prev.end_time {
            ctx.now - prev.end_time
        } else {
            1
        };

        let mut metrics = Vec::with_capacity(expected);
        for (i, &validator_id) in roster.validator_ids.iter().enumerate() {
            let prev_fee = prev
                .validator(validator_id)
                .map(|r| r.accumulated_originated_txs_fee)
                .unwrap_or_default();
            metrics.push(ValidatorEpochMetrics {
                validator_id,
                received_stake: roster
                    .received_stake
                    .get(&validator_id)
                    .copied()
                    .unwrap_or_default(),
                uptime: uptimes[i].min(duration),
                originated_fee: originated_txs_fees[i].saturating_sub(prev_fee),
                offline_time: offline_times[i],
                offline_blocks: offline_blocks[i],
            });
        }

        let offline: Vec<bool> = metrics
            .iter()
            .map(|m| self.policy.is_offline(&self.config, m))
            .collect();
        let base_weights: Vec<Amount> = metrics
            .iter()
            .zip(&offline)
            .map(|(m, &off)| {
                if off {
                    Amount::zero()
                } else {
                    self.policy.base_reward_weight(m, duration)
                }
            })
            .collect();
        let tx_weights: Vec<Amount> = metrics
            .iter()
            .map(|m| self.policy.tx_reward_weight(m, duration))
            .collect();

        let total_base_weight = checked_sum(base_weights.iter().copied())?;
        let total_tx_weight = checked_sum(tx_weights.iter().copied())?;
        let epoch_fee = checked_sum(metrics.iter().map(|m| m.originated_fee))?;
        let base_pool = checked_mul(self.config.base_reward_per_second, Amount::from(duration))?;
        let fee_share = self.policy.validators_fee_share(&self.config);

        let mut seals = Vec::with_capacity(expected);
        for (i, m) in metrics.iter().enumerate() {
            let validator = self.validators.require(m.validator_id)?;

            let base_reward = if base_weights[i].is_zero() {
                Amount::zero()
            } else {
                checked_mul(base_pool, base_weights[i])? / total_base_weight
            };
            let tx_reward = if tx_weights[i].is_zero() {
                Amount::zero()
            } else {
                checked_mul(checked_mul(epoch_fee, tx_weights[i])? / total_tx_weight, fee_share)? / unit()
            };
            let raw_reward = base_reward
                .checked_add(tx_reward)
                .ok_or(ValidationError::RewardOverflow)?;

            let commission_full = checked_mul(raw_reward, self.config.validator_commission)? / unit();
            let self_stake = self.self_stake(m.validator_id);
            let commission = if self_stake.is_zero() {
                Rewards::default()
            } else {
                let locked = self.locked_stake(&validator.auth, m.validator_id, ctx.now);
                let lock_secs = self
                    .lockup_info(&validator.auth, m.validator_id)
                    .map(|l| l.duration)
                    .unwrap_or_default();
                let locked_commission = checked_mul(commission_full, locked)? / self_stake;
                scale_lockup_reward(&self.config, locked_commission, lock_secs)
                    + scale_lockup_reward(&self.config, commission_full - locked_commission, 0)
            };

            let delegators_reward = raw_reward - commission_full;
            let reward_per_token = if validator.received_stake.is_zero() {
                Amount::zero()
            } else {
                checked_mul(delegators_reward, unit())? / validator.received_stake
            };

            let previous = prev.validator(m.validator_id).cloned().unwrap_or_default();
            let record = ValidatorEpochRecord {
                received_stake: m.received_stake,
                accumulated_reward_per_token: previous
                    .accumulated_reward_per_token
                    .checked_add(reward_per_token)
                    .ok_or(ValidationError::RewardOverflow)?,
                accumulated_uptime: previous.accumulated_uptime + m.uptime,
                accumulated_originated_txs_fee: previous
                    .accumulated_originated_txs_fee
                    .max(originated_txs_fees[i]),
                offline_time: m.offline_time,
                offline_blocks: m.offline_blocks,
            };

            debug!(
                "Epoch {} validator {}: raw reward {}, commission {}, reward per token {}",
                epoch, m.validator_id, raw_reward, commission_full, reward_per_token
            );

            seals.push(ValidatorSeal {
                validator_id: m.validator_id,
                auth: validator.auth,
                commission,
                record,
                raw_reward,
            });
        }

        // Validators outside the roster keep their accumulators
        let mut records: BTreeMap<ValidatorId, ValidatorEpochRecord> = self
            .validators
            .iter()
            .filter_map(|v| {
                prev.validator(v.id).map(|r| {
                    (
                        v.id,
                        ValidatorEpochRecord {
                            received_stake: Amount::zero(),
                            offline_time: 0,
                            offline_blocks: 0,
                            ..r.clone()
                        },
                    )
                })
            })
            .collect();
        for seal in &seals {
            records.insert(seal.validator_id, seal.record.clone());
        }

        let treasury_transfer = match self.config.treasury {
            Some(treasury) if !self.config.treasury_fee_share.is_zero() => {
                let amount = checked_mul(epoch_fee, self.config.treasury_fee_share)? / unit();
                (!amount.is_zero()).then(|| Transfer {
                    recipient: treasury,
                    amount,
                    kind: TransferKind::TreasuryFee,
                })
            }
            _ => None,
        };

        let newly_offline: Vec<ValidatorId> = metrics
            .iter()
            .zip(&offline)
            .filter(|(m, off)| {
                **off && self
                    .validators
                    .get(m.validator_id)
                    .map(|v| !v.status.offline)
                    .unwrap_or(false)
            })
            .map(|(m, _)| m.validator_id)
            .collect();

        let total_reward = seals.iter().fold(Amount::zero(), |a, s| a + s.raw_reward);
        let snapshot = EpochSnapshot {
            epoch,
            start_time: prev.end_time,
            end_time: ctx.now.max(prev.end_time),
            duration,
            epoch_fee,
            total_base_reward_weight: total_base_weight,
            total_tx_reward_weight: total_tx_weight,
            base_reward_per_second: self.config.base_reward_per_second,
            total_stake: self.validators.total_stake(),
            validator_ids: roster.validator_ids.clone(),
            validators: records,
        };

        // Commit
        self.snapshots.append(snapshot)?;
        for seal in seals {
            if seal.commission.is_zero() {
                continue;
            }
            if let Some(delegation) = self.delegations.get_mut(&seal.auth, seal.validator_id) {
                delegation.reward_stash += seal.commission;
                delegation.stashed_lockup_rewards += seal.commission;
            }
        }
        for &validator_id in &newly_offline {
            self.validators
                .deactivate(validator_id, ValidatorStatus::OFFLINE_BIT, epoch, ctx.now)?;
            warn!("Validator {} penalized as offline in epoch {}", validator_id, epoch);
        }
        self.sealing.phase = SealPhase::Sealing;

        info!(
            "Sealed epoch {} ({}s, {} validators, reward {}, fee {})",
            epoch, duration, expected, total_reward, epoch_fee
        );

        Ok(EpochSealReport {
            epoch,
            duration,
            total_reward,
            offline: newly_offline,
            treasury_transfer,
        })
    }

    /// Fix the roster of the open epoch and report weight changes
    ///
    /// A validator's weight is its received stake when it is listed and
    /// active, zero otherwise. Only changed weights are reported.
    pub fn seal_epoch_validators(
        &mut self,
        ctx: &CallContext,
        next_validator_ids: &[ValidatorId],
    ) -> Result<Vec<ValidatorWeightUpdate>> {
        self.ensure_authority(&ctx.caller)?;
        if self.sealing.phase != SealPhase::Sealing {
            return Err(StateError::NotSealing.into());
        }

        let mut listed = BTreeSet::new();
        let mut received_stake = BTreeMap::new();
        for &validator_id in next_validator_ids {
            let validator = self.validators.require(validator_id)?;
            if !listed.insert(validator_id) {
                return Err(ValidationError::DuplicateValidator(validator_id).into());
            }
            received_stake.insert(validator_id, validator.received_stake);
        }

        let mut updates = Vec::new();
        let mut reported = BTreeMap::new();
        for validator in self.validators.iter() {
            let weight = if listed.contains(&validator.id) && validator.is_active() {
                validator.received_stake
            } else {
                Amount::zero()
            };
            let previous = self
                .sealing
                .reported_weights
                .get(&validator.id)
                .copied()
                .unwrap_or_default();
            if weight != previous {
                updates.push(ValidatorWeightUpdate {
                    validator_id: validator.id,
                    weight,
                });
            }
            if !weight.is_zero() {
                reported.insert(validator.id, weight);
            }
        }

        self.sealing.roster = EpochRoster {
            validator_ids: next_validator_ids.to_vec(),
            received_stake,
        };
        self.sealing.reported_weights = reported;
        self.sealing.outbox.extend(updates.iter().copied());
        self.sealing.phase = SealPhase::Sealed;

        info!(
            "Epoch {} roster fixed with {} validators ({} weight updates)",
            self.current_epoch(),
            next_validator_ids.len(),
            updates.len()
        );

        Ok(updates)
    }

    /// Take the weight updates not yet consumed by consensus
    pub fn drain_weight_updates(&mut self) -> Vec<ValidatorWeightUpdate> {
        std::mem::take(&mut self.sealing.outbox)
    }

    /// Change the base reward rate from the next seal on
    pub fn update_base_reward_per_second(&mut self, ctx: &CallContext, rate: Amount) -> Result<()> {
        self.ensure_authority(&ctx.caller)?;
        self.config.base_reward_per_second = rate;
        info!("Base reward per second set to {}", rate);
        Ok(())
    }

    /// Change the offline penalty thresholds from the next seal on
    pub fn update_offline_penalty_threshold(
        &mut self,
        ctx: &CallContext,
        blocks: u64,
        time: u64,
    ) -> Result<()> {
        self.ensure_authority(&ctx.caller)?;
        self.config.offline_penalty_threshold_blocks = blocks;
        self.config.offline_penalty_threshold_time = time;
        info!("Offline penalty threshold set to {} blocks / {}s", blocks, time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StakingConfig;
    use crate::error::StakingError;
    use crate::types::parse_units;

    const DAY: u64 = 24 * 60 * 60;

    fn create_test_address(id: u8) -> Address {
        Address::repeat_byte(id)
    }

    fn tokens(value: &str) -> Amount {
        parse_units(value).unwrap()
    }

    fn setup() -> (StakingLedger, CallContext) {
        let config = StakingConfig::default().with_base_reward_per_second(Amount::one());
        let authority = create_test_address(0xff);
        let ledger = StakingLedger::new(config, authority, 0).unwrap();
        (ledger, CallContext::new(authority, 0))
    }

    #[test]
    fn test_only_authority_seals() {
        let (mut ledger, _) = setup();
        let intruder = CallContext::new(create_test_address(1), 10);
        assert!(matches!(
            ledger.seal_epoch(&intruder, &[], &[], &[], &[]).unwrap_err(),
            StakingError::Authorization(_)
        ));
        assert!(matches!(
            ledger.seal_epoch_validators(&intruder, &[]).unwrap_err(),
            StakingError::Authorization(_)
        ));
    }

    #[test]
    fn test_phases_alternate() {
        let (mut ledger, authority) = setup();
        assert_eq!(
            ledger.seal_epoch_validators(&authority, &[]).unwrap_err(),
            StateError::NotSealing.into()
        );

        let report = ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap();
        assert_eq!(report.epoch, 1);
        assert_eq!(report.duration, 1);
        assert_eq!(ledger.current_sealed_epoch(), 1);
        assert_eq!(ledger.seal_phase(), SealPhase::Sealing);

        assert_eq!(
            ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap_err(),
            StateError::SealInProgress.into()
        );
        let user = CallContext::new(create_test_address(1), 0);
        assert_eq!(
            ledger.create_validator(&user, vec![1], tokens("1")).unwrap_err(),
            StateError::SealInProgress.into()
        );

        ledger.seal_epoch_validators(&authority, &[]).unwrap();
        assert_eq!(ledger.seal_phase(), SealPhase::Sealed);
        assert_eq!(ledger.current_epoch(), 2);
    }

    #[test]
    fn test_metrics_must_match_roster() {
        let (mut ledger, authority) = setup();
        let user = CallContext::new(create_test_address(1), 0);
        let id = ledger.create_validator(&user, vec![1], tokens("1")).unwrap();
        ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&authority, &[id]).unwrap();

        let err = ledger
            .seal_epoch(&authority, &[0], &[0, 0], &[0], &[Amount::zero()])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MetricsLengthMismatch { expected: 1, got: 2 }.into()
        );
        // Nothing written
        assert_eq!(ledger.current_sealed_epoch(), 1);
        assert_eq!(ledger.seal_phase(), SealPhase::Sealed);
    }

    #[test]
    fn test_weight_updates_only_on_change() {
        let (mut ledger, authority) = setup();
        let a = ledger
            .create_validator(&CallContext::new(create_test_address(1), 0), vec![1], tokens("1"))
            .unwrap();
        let b = ledger
            .create_validator(&CallContext::new(create_test_address(2), 0), vec![2], tokens("2"))
            .unwrap();

        ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap();
        let updates = ledger.seal_epoch_validators(&authority, &[a, b]).unwrap();
        assert_eq!(
            updates,
            vec![
                ValidatorWeightUpdate { validator_id: a, weight: tokens("1") },
                ValidatorWeightUpdate { validator_id: b, weight: tokens("2") },
            ]
        );

        let at = CallContext::new(authority.caller, 10);
        ledger.seal_epoch(&at, &[0, 0], &[0, 0], &[10, 10], &[Amount::zero(), Amount::zero()]).unwrap();
        assert!(ledger.seal_epoch_validators(&at, &[a, b]).unwrap().is_empty());

        ledger.seal_epoch(&at, &[0, 0], &[0, 0], &[0, 0], &[Amount::zero(), Amount::zero()]).unwrap();
        let updates = ledger.seal_epoch_validators(&at, &[a]).unwrap();
        assert_eq!(
            updates,
            vec![ValidatorWeightUpdate { validator_id: b, weight: Amount::zero() }]
        );
        assert_eq!(ledger.drain_weight_updates().len(), 3);
        assert!(ledger.drain_weight_updates().is_empty());

        ledger.seal_epoch(&at, &[0], &[0], &[0], &[Amount::zero()]).unwrap();
        assert_eq!(
            ledger.seal_epoch_validators(&at, &[a, a]).unwrap_err(),
            ValidationError::DuplicateValidator(a).into()
        );
        assert_eq!(
            ledger.seal_epoch_validators(&at, &[9]).unwrap_err(),
            ValidationError::NoSuchValidator(9).into()
        );
    }

    #[test]
    fn test_offline_validator_gets_no_base_reward() {
        let (mut ledger, authority) = setup();
        let a = ledger
            .create_validator(&CallContext::new(create_test_address(1), 0), vec![1], tokens("1"))
            .unwrap();
        let b = ledger
            .create_validator(&CallContext::new(create_test_address(2), 0), vec![2], tokens("1"))
            .unwrap();
        ledger.seal_epoch(&authority, &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&authority, &[a, b]).unwrap();

        let at = CallContext::new(authority.caller, 6 * DAY);
        let report = ledger
            .seal_epoch(
                &at,
                &[0, 5 * DAY],
                &[0, 1_001],
                &[6 * DAY, 6 * DAY],
                &[Amount::zero(), Amount::zero()],
            )
            .unwrap();
        assert_eq!(report.offline, vec![b]);

        let validator = ledger.validator(b).unwrap();
        assert!(validator.status.offline);
        assert_eq!(validator.deactivated_epoch, 2);
        assert_eq!(ledger.epoch_accumulated_reward_per_token(2, b), Amount::zero());
        assert!(!ledger.epoch_accumulated_reward_per_token(2, a).is_zero());
        assert_eq!(ledger.epoch_offline_blocks(2, b), 1_001);

        // Offline validators report zero weight
        let updates = ledger.seal_epoch_validators(&at, &[a, b]).unwrap();
        assert_eq!(
            updates,
            vec![ValidatorWeightUpdate { validator_id: b, weight: Amount::zero() }]
        );
    }

    #[test]
    fn test_fee_rewards_and_treasury() {
        let config = StakingConfig {
            treasury: Some(create_test_address(0xee)),
            base_reward_per_second: Amount::zero(),
            ..StakingConfig::default()
        };
        let authority = create_test_address(0xff);
        let mut ledger = StakingLedger::new(config, authority, 0).unwrap();
        let a = ledger
            .create_validator(&CallContext::new(create_test_address(1), 0), vec![1], tokens("1"))
            .unwrap();
        let at = CallContext::new(authority, 0);
        ledger.seal_epoch(&at, &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&at, &[a]).unwrap();

        let at = CallContext::new(authority, 100);
        let fee = Amount::from(1_000_000u64);
        let report = ledger.seal_epoch(&at, &[0], &[0], &[100], &[fee]).unwrap();
        assert_eq!(report.total_reward, Amount::from(700_000u64));
        let treasury = report.treasury_transfer.unwrap();
        assert_eq!(treasury.amount, Amount::from(100_000u64));
        assert_eq!(treasury.kind, TransferKind::TreasuryFee);
        assert_eq!(ledger.epoch_accumulated_originated_txs_fee(2, a), fee);
        ledger.seal_epoch_validators(&at, &[a]).unwrap();

        // Same cumulative fee means no new fee in the next epoch
        let at = CallContext::new(authority, 200);
        let report = ledger.seal_epoch(&at, &[0], &[0], &[100], &[fee]).unwrap();
        assert_eq!(report.total_reward, Amount::zero());
        assert!(report.treasury_transfer.is_none());
    }

    #[test]
    fn test_oversized_fee_is_rejected() {
        let config = StakingConfig {
            base_reward_per_second: Amount::zero(),
            ..StakingConfig::default()
        };
        let authority = create_test_address(0xff);
        let mut ledger = StakingLedger::new(config, authority, 0).unwrap();
        let a = ledger
            .create_validator(&CallContext::new(create_test_address(1), 0), vec![1], tokens("1"))
            .unwrap();
        let at = CallContext::new(authority, 0);
        ledger.seal_epoch(&at, &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&at, &[a]).unwrap();
        let image = ledger.export_image();

        let at = CallContext::new(authority, 100);
        assert_eq!(
            ledger
                .seal_epoch(&at, &[0], &[0], &[100], &[Amount::exp10(60)])
                .unwrap_err(),
            ValidationError::RewardOverflow.into()
        );
        assert_eq!(ledger.export_image(), image);
        assert_eq!(ledger.seal_phase(), SealPhase::Sealed);

        let report = ledger
            .seal_epoch(&at, &[0], &[0], &[100], &[Amount::exp10(6)])
            .unwrap();
        assert_eq!(report.epoch, 2);
    }

    #[test]
    fn test_epoch_end_never_moves_back() {
        let (mut ledger, _) = setup();
        let authority = |now| CallContext::new(create_test_address(0xff), now);

        ledger.seal_epoch(&authority(100), &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&authority(100), &[]).unwrap();

        let report = ledger.seal_epoch(&authority(50), &[], &[], &[], &[]).unwrap();
        ledger.seal_epoch_validators(&authority(50), &[]).unwrap();
        assert_eq!(report.duration, 1);
        assert_eq!(ledger.epoch_snapshot(2).unwrap().end_time, 100);

        let report = ledger.seal_epoch(&authority(150), &[], &[], &[], &[]).unwrap();
        assert_eq!(report.duration, 50);
        assert_eq!(ledger.epoch_snapshot(3).unwrap().start_time, 100);
    }

    #[test]
    fn test_parameter_updates_need_authority() {
        let (mut ledger, authority) = setup();
        let user = CallContext::new(create_test_address(1), 0);
        assert!(ledger.update_base_reward_per_second(&user, Amount::from(5u64)).is_err());
        ledger
            .update_base_reward_per_second(&authority, Amount::from(5u64))
            .unwrap();
        assert_eq!(ledger.config().base_reward_per_second, Amount::from(5u64));

        ledger.update_offline_penalty_threshold(&authority, 10, 20).unwrap();
        assert_eq!(ledger.config().offline_penalty_threshold_blocks, 10);
        assert_eq!(ledger.config().offline_penalty_threshold_time, 20);
    }
}
