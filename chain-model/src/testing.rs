//! Deterministic chain builders for tests.

use crate::block::{Block, BlockBody, BlockUndo, SscPayload, TxPayload, TxUndo};
use crate::date::{Epoch, SlotId, SlotsPerEpoch};
use crate::hash::HeaderHash;
use crate::header::{
    BlockHeader, BoundaryHeader, ChainDifficulty, ConsensusSeal, MainHeader,
};

/// Deterministic payload derived from a seed.
pub fn body(seed: u64) -> BlockBody {
    BlockBody {
        tx: TxPayload(seed.to_be_bytes().to_vec()),
        ssc: SscPayload(seed.to_le_bytes().to_vec()),
    }
}

/// The boundary block opening epoch 0, parent of everything.
pub fn genesis() -> Block {
    boundary(Epoch(0), HeaderHash::zero(), ChainDifficulty(0))
}

pub fn boundary(epoch: Epoch, parent: HeaderHash, difficulty: ChainDifficulty) -> Block {
    let header = BlockHeader::Boundary(BoundaryHeader {
        epoch,
        parent,
        difficulty,
    });
    Block::new(header, BlockBody::default())
}

/// A main block extending `parent` at `slot`, correctly sealed.
pub fn main_child(parent: &BlockHeader, slot: SlotId) -> Block {
    let parent_hash = parent.hash();
    let header = BlockHeader::Main(MainHeader {
        slot,
        parent: parent_hash,
        difficulty: parent.difficulty().advance(1),
        seal: ConsensusSeal::seal(slot, &parent_hash),
    });
    let seed = ((slot.epoch.0 as u64) << 32) | slot.slot as u64;
    Block::new(header, body(seed))
}

/// The boundary block opening the epoch after `parent`.
pub fn boundary_child(parent: &BlockHeader, epoch: Epoch) -> Block {
    boundary(epoch, parent.hash(), parent.difficulty())
}

/// Genesis plus `main_blocks` main blocks in consecutive slots from (0, 0).
pub fn chain(spe: SlotsPerEpoch, main_blocks: u32) -> Vec<Block> {
    let mut blocks = vec![genesis()];
    let mut slot = SlotId::new(0, 0);
    for _ in 0..main_blocks {
        let next = main_child(blocks.last().unwrap().header(), slot);
        blocks.push(next);
        slot = slot.next(spe);
    }
    blocks
}

/// The trivial undo record tests pair with generated blocks.
pub fn undo_for(block: &Block) -> BlockUndo {
    BlockUndo {
        tx: TxUndo(block.body().tx.0.clone()),
    }
}
