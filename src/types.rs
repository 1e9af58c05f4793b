//! Core value types shared by every ledger component

use crate::error::{Result, ValidationError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Token amounts and fixed-point ratios
pub type Amount = U256;

/// Sequential validator identifier, starting at 1
pub type ValidatorId = u64;

/// Number of decimals of the fixed-point representation
pub const DECIMALS: usize = 18;

/// `1.0` in fixed-point representation
pub fn unit() -> Amount {
    U256::exp10(DECIMALS)
}

/// Fixed-point ratio from a percentage
pub fn percent(value: u64) -> Amount {
    unit() * U256::from(value) / U256::from(100u64)
}

/// Parse a decimal token string such as `"0.3175"` into base units
pub fn parse_units(value: &str) -> Result<Amount> {
    let invalid = || ValidationError::InvalidConfig(format!("invalid decimal amount {:?}", value));
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid().into());
    }
    if frac.len() > DECIMALS || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid().into());
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| invalid())?
    };
    let mut padded = frac.to_string();
    padded.extend(std::iter::repeat('0').take(DECIMALS - frac.len()));
    let frac = U256::from_dec_str(&padded).map_err(|_| invalid())?;

    Ok(whole * unit() + frac)
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create from raw bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address with every byte set to `byte`
    pub fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    /// Parse a hex address, with or without `0x` prefix
    pub fn from_hex(value: &str) -> Result<Self> {
        let raw = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(raw)
            .map_err(|e| ValidationError::InvalidConfig(format!("invalid address {}: {}", value, e)))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| {
            ValidationError::InvalidConfig(format!("address {} must be 20 bytes", value))
        })?;
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Reward split by origin
///
/// The lockup parts are what a position earned while locked: `lockup_base_reward`
/// is the share any unlocked stake would have earned, `lockup_extra_reward` is
/// the bonus on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rewards {
    /// Lockup bonus above the base rate
    pub lockup_extra_reward: Amount,

    /// Base-rate part earned by locked stake
    pub lockup_base_reward: Amount,

    /// Reward earned by unlocked stake
    pub unlocked_reward: Amount,
}

impl Rewards {
    /// Sum of all parts
    pub fn total(&self) -> Amount {
        self.lockup_extra_reward + self.lockup_base_reward + self.unlocked_reward
    }

    /// Part earned under a lockup
    pub fn lockup_total(&self) -> Amount {
        self.lockup_extra_reward + self.lockup_base_reward
    }

    /// True when every part is zero
    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }
}

impl Add for Rewards {
    type Output = Rewards;

    fn add(self, rhs: Rewards) -> Rewards {
        Rewards {
            lockup_extra_reward: self.lockup_extra_reward + rhs.lockup_extra_reward,
            lockup_base_reward: self.lockup_base_reward + rhs.lockup_base_reward,
            unlocked_reward: self.unlocked_reward + rhs.unlocked_reward,
        }
    }
}

impl AddAssign for Rewards {
    fn add_assign(&mut self, rhs: Rewards) {
        *self = *self + rhs;
    }
}

/// Caller identity and block time for one ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Transaction sender
    pub caller: Address,

    /// Block time in unix seconds
    pub now: u64,
}

impl CallContext {
    /// Create a call context
    pub fn new(caller: Address, now: u64) -> Self {
        Self { caller, now }
    }
}

/// Why value leaves the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Claimed staking rewards
    RewardClaim,

    /// Honored withdrawal request
    Withdrawal,

    /// Treasury share of epoch fees
    TreasuryFee,
}

/// Outbound value transfer the host must execute after the call commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Receiving account
    pub recipient: Address,

    /// Amount in base units
    pub amount: Amount,

    /// Origin of the transfer
    pub kind: TransferKind,
}
