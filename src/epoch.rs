use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Index of a fixed-length span of block heights.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn new(epoch: u64) -> Self {
        Self(epoch)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// First block height that belongs to this epoch.
    pub fn first_block(self, epoch_length: u64) -> Result<u64> {
        self.0
            .checked_mul(epoch_length)
            .ok_or(Error::Overflow {
                what: "first block",
                epoch: self,
            })
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Epoch {
    fn from(epoch: u64) -> Self {
        Self(epoch)
    }
}

impl TryFrom<i64> for Epoch {
    type Error = Error;

    fn try_from(epoch: i64) -> Result<Self> {
        u64::try_from(epoch)
            .map(Self)
            .map_err(|_| Error::invalid_input(format!("epoch {} is negative", epoch)))
    }
}

impl FromStr for Epoch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let v: i64 = s.trim().parse().map_err(|_| {
            Error::invalid_input(format!("provided argument '{}' is not an integer", s))
        })?;
        Self::try_from(v)
    }
}

/// Port: the chain's current height.
pub trait HeightSource: Send + Sync {
    /// Height of the chain tip. Failures are reported as
    /// [`Error::UpstreamUnavailable`].
    fn current_height(&self) -> Result<u64>;
}

/// Maps block heights onto epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochCalculator {
    epoch_length: u64,
}

impl Default for EpochCalculator {
    fn default() -> Self {
        Self {
            epoch_length: crate::EPOCH_LENGTH,
        }
    }
}

impl EpochCalculator {
    pub fn new(epoch_length: u64) -> Result<Self> {
        if epoch_length == 0 {
            return Err(Error::InvalidConfig("epoch length must be positive".into()));
        }
        Ok(Self { epoch_length })
    }

    /// `floor(height / epoch_length)`. Negative heights are rejected.
    pub fn epoch_of<H>(&self, height: H) -> Result<Epoch>
    where
        H: TryInto<u64> + Copy + fmt::Display,
    {
        let h: u64 = height.try_into().map_err(|_| {
            Error::invalid_input(format!("height {} is not a valid block number", height))
        })?;
        Ok(Epoch(h / self.epoch_length))
    }

    pub fn current_epoch(&self, heights: &dyn HeightSource) -> Result<Epoch> {
        let height = heights.current_height()?;
        self.epoch_of(height)
    }
}
