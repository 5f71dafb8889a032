//! The store interface the chain logic consumes.

use crate::error::Error;
use chain_model::{Block, BlockHeader, BlockUndo, HeaderHash};

/// What an in-flight chain mutation was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOp {
    Apply,
    Rollback,
}

/// Durable record of an apply/rollback in flight.
///
/// Written before the segment mutations touch the store, cleared once the
/// whole segment is through. A record that survives a restart identifies
/// an interrupted operation to recover from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentIntent {
    pub op: SegmentOp,
    /// Oldest-first hashes of the blocks in the segment.
    pub hashes: Vec<HeaderHash>,
    /// The persisted tip when the operation started.
    pub previous_tip: HeaderHash,
    /// The tip the operation was moving to.
    pub target_tip: HeaderHash,
}

/// Persistent block store.
///
/// Reads are safe to issue concurrently; the writes used by the
/// apply/rollback engine are serialized by the caller (the tip is only
/// ever mutated while the tip semaphore is held).
pub trait BlockDb: Send + Sync {
    /// Hash of the newest block on the main chain.
    fn tip(&self) -> Result<HeaderHash, Error>;

    /// Move the persisted tip. Callers must hold the tip semaphore.
    fn set_tip(&self, tip: &HeaderHash) -> Result<(), Error>;

    fn block_header(&self, hash: &HeaderHash) -> Result<Option<BlockHeader>, Error>;

    fn block(&self, hash: &HeaderHash) -> Result<Option<Block>, Error>;

    fn block_undo(&self, hash: &HeaderHash) -> Result<Option<BlockUndo>, Error>;

    fn is_in_main_chain(&self, hash: &HeaderHash) -> Result<bool, Error>;

    fn set_in_main_chain(&self, hash: &HeaderHash, in_main: bool) -> Result<(), Error>;

    /// Persist a block with its undo record. The parent must already be
    /// present (or be the zero hash). Re-writing a known block refreshes
    /// its undo and main-chain flag.
    fn put_block(&self, undo: &BlockUndo, in_main: bool, block: &Block) -> Result<(), Error>;

    fn put_intent(&self, intent: &SegmentIntent) -> Result<(), Error>;

    /// Remove and return the pending intent record, if any.
    fn take_intent(&self) -> Result<Option<SegmentIntent>, Error>;

    /// The newest block on the main chain.
    fn tip_block(&self) -> Result<Block, Error> {
        let tip = self.tip()?;
        self.block(&tip)?.ok_or(Error::BlockNotFound(tip))
    }

    /// Walk parent links from `start`, newest-first, pushing every
    /// visited header. The walk halts after `stop` returns `true` for a
    /// header (which is still included) or when a parent is unknown.
    /// `depth` counts from zero at `start`.
    fn load_headers_until(
        &self,
        start: HeaderHash,
        stop: &mut dyn FnMut(&BlockHeader, u32) -> bool,
    ) -> Result<Vec<BlockHeader>, Error> {
        let mut headers = Vec::new();
        let mut cursor = start;
        let mut depth = 0u32;
        while let Some(header) = self.block_header(&cursor)? {
            let parent = header.parent();
            let halt = stop(&header, depth);
            headers.push(header);
            if halt {
                break;
            }
            cursor = parent;
            depth += 1;
        }
        Ok(headers)
    }
}
