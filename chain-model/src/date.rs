//! Protocol time: slots grouped into epochs of a constant size.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Epoch number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Epoch(pub u32);

/// Number of slots in every epoch. Fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsPerEpoch(pub u32);

/// A slot position: an epoch and the slot offset within it.
///
/// The derived order is lexicographic on `(epoch, slot)`, which agrees
/// with the flattened slot index for any epoch size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SlotId {
    pub epoch: Epoch,
    pub slot: u32,
}

impl SlotId {
    pub fn new(epoch: u32, slot: u32) -> Self {
        SlotId {
            epoch: Epoch(epoch),
            slot,
        }
    }

    /// Slot index counted from slot 0 of epoch 0.
    pub fn flatten(self, spe: SlotsPerEpoch) -> FlatSlot {
        FlatSlot(self.epoch.0 as u64 * spe.0 as u64 + self.slot as u64)
    }

    /// The slot following this one.
    pub fn next(self, spe: SlotsPerEpoch) -> SlotId {
        debug_assert!(self.slot < spe.0);
        if self.slot + 1 == spe.0 {
            SlotId {
                epoch: Epoch(self.epoch.0 + 1),
                slot: 0,
            }
        } else {
            SlotId {
                epoch: self.epoch,
                slot: self.slot + 1,
            }
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.epoch.0, self.slot)
    }
}

/// Slot index flattened over the whole timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlatSlot(pub u64);

/// A point on the chain timeline: either the boundary block opening an
/// epoch, or a regular slot within one.
///
/// The order is total: the boundary of an epoch sorts before slot 0 of the
/// same epoch. `flatten` maps a boundary and slot 0 of its epoch to the
/// same index, so the order is compatible with the flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainDate {
    Boundary(Epoch),
    Slot(SlotId),
}

impl ChainDate {
    pub fn epoch(&self) -> Epoch {
        match self {
            ChainDate::Boundary(epoch) => *epoch,
            ChainDate::Slot(slot) => slot.epoch,
        }
    }

    pub fn flatten(&self, spe: SlotsPerEpoch) -> FlatSlot {
        match self {
            ChainDate::Boundary(epoch) => FlatSlot(epoch.0 as u64 * spe.0 as u64),
            ChainDate::Slot(slot) => slot.flatten(spe),
        }
    }

    fn rank(&self) -> (u32, u64) {
        match self {
            ChainDate::Boundary(epoch) => (epoch.0, 0),
            ChainDate::Slot(slot) => (slot.epoch.0, slot.slot as u64 + 1),
        }
    }
}

impl Ord for ChainDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for ChainDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<SlotId> for ChainDate {
    fn from(slot: SlotId) -> Self {
        ChainDate::Slot(slot)
    }
}

impl fmt::Display for ChainDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainDate::Boundary(epoch) => write!(f, "{}.boundary", epoch.0),
            ChainDate::Slot(slot) => slot.fmt(f),
        }
    }
}
