//! Block headers.
//!
//! A chain alternates two header shapes: the boundary header opening every
//! epoch (derivable locally, carries no payload proof) and the main header
//! minted by a slot leader.

use crate::date::{ChainDate, Epoch, SlotId};
use crate::hash::HeaderHash;
use std::fmt;

/// Cumulative number of main blocks up to and including a header.
/// Boundary blocks do not contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainDifficulty(pub u64);

impl ChainDifficulty {
    pub fn advance(self, delta: u64) -> Self {
        ChainDifficulty(self.0 + delta)
    }
}

impl fmt::Display for ChainDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Consensus proof carried by a main header.
///
/// Stands in for the slot leader's signature: a commitment over the slot
/// and the parent hash, checked when a header is verified with consensus
/// enforcement enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsensusSeal(HeaderHash);

impl ConsensusSeal {
    pub fn seal(slot: SlotId, parent: &HeaderHash) -> Self {
        ConsensusSeal(HeaderHash::digest(&[
            b"seal",
            &slot.epoch.0.to_be_bytes(),
            &slot.slot.to_be_bytes(),
            parent.as_bytes(),
        ]))
    }

    pub fn verify(&self, slot: SlotId, parent: &HeaderHash) -> bool {
        *self == Self::seal(slot, parent)
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Header of the boundary block opening an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryHeader {
    pub epoch: Epoch,
    pub parent: HeaderHash,
    pub difficulty: ChainDifficulty,
}

/// Header of a block minted by a slot leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainHeader {
    pub slot: SlotId,
    pub parent: HeaderHash,
    pub difficulty: ChainDifficulty,
    pub seal: ConsensusSeal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockHeader {
    Boundary(BoundaryHeader),
    Main(MainHeader),
}

impl BlockHeader {
    pub fn hash(&self) -> HeaderHash {
        match self {
            BlockHeader::Boundary(header) => HeaderHash::digest(&[
                b"boundary",
                &header.epoch.0.to_be_bytes(),
                header.parent.as_bytes(),
                &header.difficulty.0.to_be_bytes(),
            ]),
            BlockHeader::Main(header) => HeaderHash::digest(&[
                b"main",
                &header.slot.epoch.0.to_be_bytes(),
                &header.slot.slot.to_be_bytes(),
                header.parent.as_bytes(),
                &header.difficulty.0.to_be_bytes(),
                header.seal.as_bytes(),
            ]),
        }
    }

    pub fn parent(&self) -> HeaderHash {
        match self {
            BlockHeader::Boundary(header) => header.parent,
            BlockHeader::Main(header) => header.parent,
        }
    }

    pub fn date(&self) -> ChainDate {
        match self {
            BlockHeader::Boundary(header) => ChainDate::Boundary(header.epoch),
            BlockHeader::Main(header) => ChainDate::Slot(header.slot),
        }
    }

    pub fn difficulty(&self) -> ChainDifficulty {
        match self {
            BlockHeader::Boundary(header) => header.difficulty,
            BlockHeader::Main(header) => header.difficulty,
        }
    }

    /// Difficulty contribution of this header over its parent.
    pub fn difficulty_delta(&self) -> u64 {
        match self {
            BlockHeader::Boundary(_) => 0,
            BlockHeader::Main(_) => 1,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, BlockHeader::Boundary(_))
    }

    /// Short log-friendly description.
    pub fn description(&self) -> String {
        format!("{} @ {}", self.hash(), self.date())
    }
}
