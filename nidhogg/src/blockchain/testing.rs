//! Shared test fixtures: mock subsystems, a fixed clock and a populated
//! chain harness.

use crate::blockchain::{Blockchain, Storage};
use crate::services::{SlotClock, SscError, SscLedger, TxError, TxLedger};
use crate::settings::ProtocolSettings;
use chain_model::testing;
use chain_model::{Block, BlockUndo, HeaderHash, SlotId, SlotsPerEpoch, TxUndo};
use chain_store::{BlockDb, MemoryBlockDb};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub const SPE: SlotsPerEpoch = SlotsPerEpoch(100);

pub struct FixedClock {
    slot: Mutex<SlotId>,
}

impl FixedClock {
    pub fn at(slot: SlotId) -> Arc<Self> {
        Arc::new(FixedClock {
            slot: Mutex::new(slot),
        })
    }

    pub fn set(&self, slot: SlotId) {
        *self.slot.lock() = slot;
    }
}

impl SlotClock for FixedClock {
    fn current_slot(&self) -> SlotId {
        *self.slot.lock()
    }
}

/// Transaction subsystem double: undo of a block is its tx payload, the
/// folded state is the stack of applied block hashes.
#[derive(Default)]
pub struct MockTxLedger {
    pub applied: Mutex<Vec<HeaderHash>>,
    pub verified_calls: AtomicU32,
    pub reject: AtomicBool,
}

impl TxLedger for MockTxLedger {
    fn verify_blocks(&self, blocks: &[Block]) -> Result<Vec<TxUndo>, TxError> {
        self.verified_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(TxError("transactions refused".into()));
        }
        Ok(blocks
            .iter()
            .map(|block| TxUndo(block.body().tx.0.clone()))
            .collect())
    }

    fn apply_blocks(&self, blocks: &[Block]) -> Result<(), TxError> {
        let mut applied = self.applied.lock();
        applied.extend(blocks.iter().map(|block| block.hash()));
        Ok(())
    }

    fn rollback_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<(), TxError> {
        let mut applied = self.applied.lock();
        for (block, _) in segment {
            let top = applied.pop();
            assert_eq!(top, Some(block.hash()), "rollback out of order");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSscLedger {
    pub applied: Mutex<Vec<HeaderHash>>,
    pub reject: AtomicBool,
}

impl SscLedger for MockSscLedger {
    fn verify_blocks(&self, _blocks: &[Block]) -> Result<(), SscError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SscError("secret sharing data refused".into()));
        }
        Ok(())
    }

    fn apply_blocks(&self, blocks: &[Block]) -> Result<(), SscError> {
        let mut applied = self.applied.lock();
        applied.extend(blocks.iter().map(|block| block.hash()));
        Ok(())
    }

    fn rollback_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<(), SscError> {
        let mut applied = self.applied.lock();
        for (block, _) in segment {
            let top = applied.pop();
            assert_eq!(top, Some(block.hash()), "rollback out of order");
        }
        Ok(())
    }
}

/// A store pre-loaded with genesis plus `main_blocks` main blocks, all on
/// the main chain, tip on the newest.
pub fn populated_db(main_blocks: u32) -> (Arc<MemoryBlockDb>, Vec<Block>) {
    let blocks = testing::chain(SPE, main_blocks);
    let db = Arc::new(MemoryBlockDb::bootstrap(blocks[0].clone()));
    for block in &blocks[1..] {
        db.put_block(&testing::undo_for(block), true, block).unwrap();
    }
    db.set_tip(&blocks.last().unwrap().hash()).unwrap();
    (db, blocks)
}

pub fn populated_storage(main_blocks: u32) -> (Storage, Vec<Block>) {
    let (db, blocks) = populated_db(main_blocks);
    (Storage::new(db), blocks)
}

pub struct Harness {
    pub chain: Blockchain,
    pub db: Arc<MemoryBlockDb>,
    pub clock: Arc<FixedClock>,
    pub tx: Arc<MockTxLedger>,
    pub ssc: Arc<MockSscLedger>,
    pub blocks: Vec<Block>,
}

/// A [`Blockchain`] over a populated store; the clock starts at the slot
/// of the tip block.
pub fn harness(k: u32, main_blocks: u32) -> Harness {
    let (db, blocks) = populated_db(main_blocks);
    let tip_slot = if main_blocks == 0 {
        SlotId::new(0, 0)
    } else {
        match blocks.last().unwrap().header().date() {
            chain_model::ChainDate::Slot(slot) => slot,
            chain_model::ChainDate::Boundary(_) => SlotId::new(0, 0),
        }
    };
    let clock = FixedClock::at(tip_slot);
    let tx = Arc::new(MockTxLedger::default());
    let ssc = Arc::new(MockSscLedger::default());
    let chain = Blockchain::new(
        db.clone() as Arc<dyn BlockDb>,
        tx.clone() as Arc<dyn TxLedger>,
        ssc.clone() as Arc<dyn SscLedger>,
        clock.clone() as Arc<dyn SlotClock>,
        ProtocolSettings {
            k,
            slots_per_epoch: SPE,
        },
    )
    .unwrap();
    Harness {
        chain,
        db,
        clock,
        tx,
        ssc,
        blocks,
    }
}

/// Verified extension of the harness tip: `count` new blocks in the slots
/// following `from_slot`, paired with their undos.
pub fn extension(
    harness: &Harness,
    from_slot: SlotId,
    count: u32,
) -> Vec<(Block, BlockUndo)> {
    let mut parent = harness.blocks.last().unwrap().header().clone();
    let mut slot = from_slot;
    let mut segment = Vec::new();
    for _ in 0..count {
        let block = testing::main_child(&parent, slot);
        parent = block.header().clone();
        slot = slot.next(SPE);
        let undo = testing::undo_for(&block);
        segment.push((block, undo));
    }
    segment
}
