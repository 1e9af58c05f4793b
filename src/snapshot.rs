//! Epoch snapshot store
//!
//! Append-only history of sealed epochs. Each snapshot carries the
//! per-validator accumulators (reward per token, uptime, originated fees)
//! so rewards between any two epochs are a single subtraction.

use crate::error::{Result, StateError};
use crate::types::{Amount, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Per-validator values of one sealed epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEpochRecord {
    /// Stake the validator ran the epoch with
    pub received_stake: Amount,

    /// Cumulative reward per staked token, scaled by `unit()`
    pub accumulated_reward_per_token: Amount,

    /// Cumulative uptime in seconds
    pub accumulated_uptime: u64,

    /// Cumulative fees of transactions the validator originated
    pub accumulated_originated_txs_fee: Amount,

    /// Offline time reported for the epoch
    pub offline_time: u64,

    /// Offline blocks reported for the epoch
    pub offline_blocks: u64,
}

/// Immutable record of one sealed epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    /// Epoch number
    pub epoch: u64,

    /// Seal time of the previous epoch
    pub start_time: u64,

    /// Seal time of this epoch
    pub end_time: u64,

    /// Seconds the rewards were computed over (at least 1)
    pub duration: u64,

    /// Fees originated during the epoch
    pub epoch_fee: Amount,

    /// Sum of base reward weights
    pub total_base_reward_weight: Amount,

    /// Sum of transaction reward weights
    pub total_tx_reward_weight: Amount,

    /// Base reward rate in effect
    pub base_reward_per_second: Amount,

    /// Total stake at seal time
    pub total_stake: Amount,

    /// Validators the epoch was sealed against
    pub validator_ids: Vec<ValidatorId>,

    /// Accumulators of every known validator
    pub validators: BTreeMap<ValidatorId, ValidatorEpochRecord>,
}

impl EpochSnapshot {
    /// Genesis snapshot anchoring epoch 0 at `time`
    pub fn genesis(time: u64) -> Self {
        Self {
            epoch: 0,
            start_time: time,
            end_time: time,
            ..Self::default()
        }
    }

    /// Record of a validator, if present
    pub fn validator(&self, validator_id: ValidatorId) -> Option<&ValidatorEpochRecord> {
        self.validators.get(&validator_id)
    }

    /// Accumulated reward per token of a validator, zero when absent
    pub fn accumulated_reward_per_token(&self, validator_id: ValidatorId) -> Amount {
        self.validators
            .get(&validator_id)
            .map(|r| r.accumulated_reward_per_token)
            .unwrap_or_default()
    }
}

/// Append-only snapshot store indexed by epoch
#[derive(Debug, Clone)]
pub struct EpochSnapshotStore {
    /// Snapshots, position equals epoch number
    snapshots: Vec<EpochSnapshot>,
}

impl EpochSnapshotStore {
    /// Create a store holding the genesis snapshot
    pub fn new(genesis_time: u64) -> Self {
        Self {
            snapshots: vec![EpochSnapshot::genesis(genesis_time)],
        }
    }

    /// Rebuild from persisted snapshots, checking numbering
    pub fn from_snapshots(snapshots: Vec<EpochSnapshot>) -> Result<Self> {
        if snapshots.first().map(|s| s.epoch) != Some(0) {
            return Err(StateError::Inconsistent("missing genesis snapshot".to_string()).into());
        }
        let mut store = Self {
            snapshots: Vec::with_capacity(snapshots.len()),
        };
        for snapshot in snapshots {
            if snapshot.epoch == 0 && store.snapshots.is_empty() {
                store.snapshots.push(snapshot);
            } else {
                store.append(snapshot)?;
            }
        }
        Ok(store)
    }

    /// Append the next sealed epoch
    ///
    /// Fails unless `snapshot.epoch` is exactly one past the latest epoch
    /// and its end time does not precede the latest end time.
    pub fn append(&mut self, snapshot: EpochSnapshot) -> Result<()> {
        let expected = self.latest_epoch() + 1;
        if self.snapshots.is_empty() || snapshot.epoch != expected {
            return Err(StateError::Inconsistent(format!(
                "snapshot for epoch {} appended, expected {}",
                snapshot.epoch, expected
            ))
            .into());
        }
        let latest_end = self.latest().end_time;
        if snapshot.end_time < latest_end {
            return Err(StateError::Inconsistent(format!(
                "epoch {} ends at {} before previous end {}",
                snapshot.epoch, snapshot.end_time, latest_end
            ))
            .into());
        }

        info!(
            "Stored epoch {} snapshot ({} validators, duration {}s)",
            snapshot.epoch,
            snapshot.validator_ids.len(),
            snapshot.duration
        );

        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Latest sealed epoch
    pub fn latest_epoch(&self) -> u64 {
        self.snapshots.len().saturating_sub(1) as u64
    }

    /// Latest snapshot
    pub fn latest(&self) -> &EpochSnapshot {
        // Never empty: constructors always store the genesis snapshot.
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Snapshot of `epoch`
    pub fn get(&self, epoch: u64) -> Option<&EpochSnapshot> {
        usize::try_from(epoch).ok().and_then(|i| self.snapshots.get(i))
    }

    /// Seal time of `epoch`, zero when not sealed yet
    pub fn end_time(&self, epoch: u64) -> u64 {
        self.get(epoch).map(|s| s.end_time).unwrap_or_default()
    }

    /// Accumulated reward per token of a validator at `epoch`
    pub fn accumulated_reward_per_token(&self, epoch: u64, validator_id: ValidatorId) -> Amount {
        self.get(epoch)
            .map(|s| s.accumulated_reward_per_token(validator_id))
            .unwrap_or_default()
    }

    /// All snapshots in epoch order
    pub fn iter(&self) -> impl Iterator<Item = &EpochSnapshot> {
        self.snapshots.iter()
    }

    /// Number of stored snapshots, genesis included
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false; the genesis snapshot is always present
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn snapshot_with_rate(epoch: u64, end_time: u64, rate: u64) -> EpochSnapshot {
        let mut validators = BTreeMap::new();
        validators.insert(
            1,
            ValidatorEpochRecord {
                accumulated_reward_per_token: U256::from(rate),
                ..ValidatorEpochRecord::default()
            },
        );
        EpochSnapshot {
            epoch,
            end_time,
            validator_ids: vec![1],
            validators,
            ..EpochSnapshot::default()
        }
    }

    #[test]
    fn test_genesis_store() {
        let store = EpochSnapshotStore::new(1_000);
        assert_eq!(store.latest_epoch(), 0);
        assert_eq!(store.end_time(0), 1_000);
        assert_eq!(store.end_time(1), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_requires_next_epoch() {
        let mut store = EpochSnapshotStore::new(0);
        assert!(store.append(snapshot_with_rate(2, 10, 5)).is_err());
        store.append(snapshot_with_rate(1, 10, 5)).unwrap();
        assert!(store.append(snapshot_with_rate(1, 20, 7)).is_err());
        assert!(store.append(snapshot_with_rate(2, 9, 7)).is_err());
        store.append(snapshot_with_rate(2, 20, 7)).unwrap();

        assert_eq!(store.latest_epoch(), 2);
        assert_eq!(store.accumulated_reward_per_token(1, 1), U256::from(5u64));
        assert_eq!(store.accumulated_reward_per_token(2, 1), U256::from(7u64));
        assert_eq!(store.accumulated_reward_per_token(2, 9), U256::zero());
    }

    #[test]
    fn test_from_snapshots() {
        let restored = EpochSnapshotStore::from_snapshots(vec![
            EpochSnapshot::genesis(0),
            snapshot_with_rate(1, 10, 5),
        ])
        .unwrap();
        assert_eq!(restored.latest_epoch(), 1);

        assert!(EpochSnapshotStore::from_snapshots(vec![]).is_err());
        assert!(EpochSnapshotStore::from_snapshots(vec![
            EpochSnapshot::genesis(0),
            snapshot_with_rate(3, 10, 5),
        ])
        .is_err());
    }
}
