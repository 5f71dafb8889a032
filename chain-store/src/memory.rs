//! In-memory reference implementation of [`BlockDb`].

use crate::error::Error;
use crate::store::{BlockDb, SegmentIntent};
use chain_model::{Block, BlockHeader, BlockUndo, HeaderHash};
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredBlock {
    block: Block,
    undo: BlockUndo,
    in_main: bool,
}

struct StoreData {
    blocks: HashMap<HeaderHash, StoredBlock>,
    tip: HeaderHash,
    intent: Option<SegmentIntent>,
}

/// Hash-map-backed store. All operations take one lock, which also gives
/// the apply/rollback engine the per-call transactional boundary it
/// expects from a persistent backend.
pub struct MemoryBlockDb {
    inner: RwLock<StoreData>,
}

impl MemoryBlockDb {
    /// Create a store holding only `block0`, marked on the main chain,
    /// with the tip pointing at it.
    pub fn bootstrap(block0: Block) -> Self {
        let hash = block0.hash();
        let mut blocks = HashMap::new();
        blocks.insert(
            hash,
            StoredBlock {
                block: block0,
                undo: BlockUndo::default(),
                in_main: true,
            },
        );
        MemoryBlockDb {
            inner: RwLock::new(StoreData {
                blocks,
                tip: hash,
                intent: None,
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreData> {
        self.inner.read().expect("block store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreData> {
        self.inner.write().expect("block store lock poisoned")
    }
}

impl BlockDb for MemoryBlockDb {
    fn tip(&self) -> Result<HeaderHash, Error> {
        Ok(self.read().tip)
    }

    fn set_tip(&self, tip: &HeaderHash) -> Result<(), Error> {
        let mut data = self.write();
        if !data.blocks.contains_key(tip) {
            return Err(Error::BlockNotFound(*tip));
        }
        data.tip = *tip;
        Ok(())
    }

    fn block_header(&self, hash: &HeaderHash) -> Result<Option<BlockHeader>, Error> {
        Ok(self
            .read()
            .blocks
            .get(hash)
            .map(|stored| stored.block.header().clone()))
    }

    fn block(&self, hash: &HeaderHash) -> Result<Option<Block>, Error> {
        Ok(self.read().blocks.get(hash).map(|stored| stored.block.clone()))
    }

    fn block_undo(&self, hash: &HeaderHash) -> Result<Option<BlockUndo>, Error> {
        Ok(self.read().blocks.get(hash).map(|stored| stored.undo.clone()))
    }

    fn is_in_main_chain(&self, hash: &HeaderHash) -> Result<bool, Error> {
        Ok(self
            .read()
            .blocks
            .get(hash)
            .map(|stored| stored.in_main)
            .unwrap_or(false))
    }

    fn set_in_main_chain(&self, hash: &HeaderHash, in_main: bool) -> Result<(), Error> {
        let mut data = self.write();
        match data.blocks.get_mut(hash) {
            Some(stored) => {
                stored.in_main = in_main;
                Ok(())
            }
            None => Err(Error::BlockNotFound(*hash)),
        }
    }

    fn put_block(&self, undo: &BlockUndo, in_main: bool, block: &Block) -> Result<(), Error> {
        let mut data = self.write();
        let parent = block.header().parent();
        if parent != HeaderHash::zero() && !data.blocks.contains_key(&parent) {
            return Err(Error::MissingParent(parent));
        }
        data.blocks.insert(
            block.hash(),
            StoredBlock {
                block: block.clone(),
                undo: undo.clone(),
                in_main,
            },
        );
        Ok(())
    }

    fn put_intent(&self, intent: &SegmentIntent) -> Result<(), Error> {
        self.write().intent = Some(intent.clone());
        Ok(())
    }

    fn take_intent(&self) -> Result<Option<SegmentIntent>, Error> {
        Ok(self.write().intent.take())
    }
}
