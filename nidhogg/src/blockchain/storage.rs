//! Read-side chain queries over the block store: main-chain ancestor
//! search, checkpoint-bounded header ranges, the exponential locator and
//! block ranges between two headers.

use chain_model::{Block, BlockHeader, ChainDate, HeaderHash};
use chain_store::{BlockDb, Error};
use std::sync::Arc;

/// Shared view of the block store.
#[derive(Clone)]
pub struct Storage {
    db: Arc<dyn BlockDb>,
}

impl Storage {
    pub fn new(db: Arc<dyn BlockDb>) -> Self {
        Storage { db }
    }

    pub fn db(&self) -> &Arc<dyn BlockDb> {
        &self.db
    }

    pub fn tip(&self) -> Result<HeaderHash, Error> {
        self.db.tip()
    }

    pub fn tip_block(&self) -> Result<Block, Error> {
        self.db.tip_block()
    }

    pub fn block_header(&self, hash: &HeaderHash) -> Result<Option<BlockHeader>, Error> {
        self.db.block_header(hash)
    }

    pub fn block(&self, hash: &HeaderHash) -> Result<Option<Block>, Error> {
        self.db.block(hash)
    }

    pub fn is_in_main_chain(&self, hash: &HeaderHash) -> Result<bool, Error> {
        self.db.is_in_main_chain(hash)
    }

    /// Hash of the newest element of `newest_first` that is on the main
    /// chain, falling back to the parent of the oldest element so a fully
    /// off-chain sequence still resolves to its fork point.
    pub fn find_main_chain_ancestor(
        &self,
        newest_first: &[BlockHeader],
    ) -> Result<Option<HeaderHash>, Error> {
        let oldest = match newest_first.last() {
            Some(header) => header,
            None => return Ok(None),
        };
        let probes = newest_first
            .iter()
            .map(|header| header.hash())
            .chain(std::iter::once(oldest.parent()));
        for hash in probes {
            if self.db.is_in_main_chain(&hash)? {
                return Ok(Some(hash));
            }
        }
        Ok(None)
    }

    /// Headers from just above the newest locally-known checkpoint up to
    /// `start` (the tip when `None`), oldest-first. Checkpoint matching is
    /// by chain date, not hash, so a sibling at the checkpoint's height
    /// ends the walk too. Without a reachable checkpoint the range runs
    /// back to the first block.
    pub fn headers_from_checkpoints(
        &self,
        checkpoints: &[HeaderHash],
        start: Option<HeaderHash>,
    ) -> Result<Vec<BlockHeader>, Error> {
        let mut checkpoint_dates: Vec<ChainDate> = Vec::new();
        for checkpoint in checkpoints {
            if let Some(header) = self.db.block_header(checkpoint)? {
                checkpoint_dates.push(header.date());
            }
        }
        let start = match start {
            Some(hash) => hash,
            None => self.db.tip()?,
        };

        let mut headers = self
            .db
            .load_headers_until(start, &mut |header, _| {
                checkpoint_dates.contains(&header.date())
            })?;
        let (last_date, last_parent) = match headers.last() {
            Some(header) => (header.date(), header.parent()),
            None => return Ok(headers),
        };
        // When the walk ended on a checkpoint date, also load the header
        // below it so the range overlaps the checkpoint block itself.
        if checkpoint_dates.contains(&last_date) {
            if let Some(parent) = self.db.block_header(&last_parent)? {
                headers.push(parent);
            }
        }
        headers.reverse();
        Ok(headers)
    }

    /// Main-chain hashes at depths `{0, 1, 2, 4, …, 2ⁿ < k} ∪ {k}` below
    /// `upto` (the tip when `None`), newest-first: dense near the tip,
    /// sparse toward the origin. Used to bootstrap synchronization with a
    /// peer.
    pub fn block_locator(
        &self,
        upto: Option<HeaderHash>,
        k: u32,
    ) -> Result<Vec<HeaderHash>, Error> {
        let start = match upto {
            Some(hash) => hash,
            None => self.db.tip()?,
        };
        let hashes: Vec<HeaderHash> = self
            .db
            .load_headers_until(start, &mut |_, depth| depth >= k)?
            .iter()
            .map(|header| header.hash())
            .collect();
        let locator = locator_depths(k)
            .into_iter()
            .filter_map(|depth| hashes.get(depth as usize).copied())
            .collect();
        Ok(locator)
    }

    /// The blocks `[newer, …, older]`, newest-first, when `newer` descends
    /// from `older`; `None` when either endpoint is unknown, a link is
    /// missing, or the dates do not descend strictly toward `older`.
    pub fn blocks_between(
        &self,
        older: &HeaderHash,
        newer: &HeaderHash,
    ) -> Result<Option<Vec<Block>>, Error> {
        let newer_header = match self.db.block_header(newer)? {
            Some(header) => header,
            None => return Ok(None),
        };
        let older_header = match self.db.block_header(older)? {
            Some(header) => header,
            None => return Ok(None),
        };
        if newer_header.date() < older_header.date() {
            return Ok(None);
        }

        let floor = older_header.date();
        let mut blocks = Vec::new();
        let mut cursor = *newer;
        loop {
            let block = match self.db.block(&cursor)? {
                Some(block) => block,
                None => return Ok(None),
            };
            let date = block.header().date();
            let parent = block.header().parent();
            blocks.push(block);
            if cursor == *older {
                return Ok(Some(blocks));
            }
            if date <= floor {
                // descended to the older endpoint's height on a sibling
                return Ok(None);
            }
            cursor = parent;
        }
    }
}

/// Ascending depth list `0, 1, 2, 4, …, 2ⁿ < k, k`.
fn locator_depths(k: u32) -> Vec<u32> {
    let mut depths = vec![0];
    let mut power = 1;
    while power < k {
        depths.push(power);
        power *= 2;
    }
    depths.push(k);
    depths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::testing::populated_storage;
    use chain_model::testing;
    use chain_model::SlotId;
    use quickcheck::quickcheck;

    #[test]
    fn locator_depth_list() {
        assert_eq!(locator_depths(10), vec![0, 1, 2, 4, 8, 10]);
        assert_eq!(locator_depths(8), vec![0, 1, 2, 4, 8]);
        assert_eq!(locator_depths(2), vec![0, 1, 2]);
        assert_eq!(locator_depths(1), vec![0, 1]);
    }

    #[test]
    fn locator_of_long_chain() {
        let (storage, blocks) = populated_storage(100);
        let locator = storage.block_locator(None, 10).unwrap();
        let expected: Vec<HeaderHash> = [0usize, 1, 2, 4, 8, 10]
            .iter()
            .map(|depth| blocks[blocks.len() - 1 - depth].hash())
            .collect();
        assert_eq!(locator, expected);
    }

    #[test]
    fn locator_of_short_chain_is_clamped() {
        // genesis + 3 main blocks: only depths 0..=3 exist
        let (storage, blocks) = populated_storage(3);
        let locator = storage.block_locator(None, 10).unwrap();
        let expected: Vec<HeaderHash> = [0usize, 1, 2]
            .iter()
            .map(|depth| blocks[blocks.len() - 1 - depth].hash())
            .collect();
        assert_eq!(locator, expected);
    }

    quickcheck! {
        fn locator_depths_are_exponential(len: u8, k_seed: u8) -> bool {
            let k = 1 + (k_seed % 31) as u32;
            let (storage, blocks) = populated_storage(len as u32);
            let locator = storage.block_locator(None, k).unwrap();

            if locator.len() > k as usize + 2 {
                return false;
            }
            let allowed = locator_depths(k);
            locator.iter().enumerate().all(|(position, hash)| {
                let depth = allowed[position] as usize;
                depth < blocks.len() && blocks[blocks.len() - 1 - depth].hash() == *hash
            })
        }
    }

    #[test]
    fn ancestor_of_partially_known_sequence() {
        let (storage, blocks) = populated_storage(5);
        // fork off the block at slot 2: blocks[3]
        let fork1 = testing::main_child(blocks[3].header(), SlotId::new(0, 7));
        let fork2 = testing::main_child(fork1.header(), SlotId::new(0, 8));
        let newest_first = vec![
            fork2.header().clone(),
            fork1.header().clone(),
            blocks[3].header().clone(),
        ];
        assert_eq!(
            storage.find_main_chain_ancestor(&newest_first).unwrap(),
            Some(blocks[3].hash())
        );
    }

    #[test]
    fn ancestor_of_fully_offchain_sequence_is_the_fork_point() {
        let (storage, blocks) = populated_storage(5);
        let fork1 = testing::main_child(blocks[3].header(), SlotId::new(0, 7));
        let fork2 = testing::main_child(fork1.header(), SlotId::new(0, 8));
        let newest_first = vec![fork2.header().clone(), fork1.header().clone()];
        assert_eq!(
            storage.find_main_chain_ancestor(&newest_first).unwrap(),
            Some(blocks[3].hash())
        );
    }

    #[test]
    fn ancestor_of_unrelated_sequence_is_none() {
        let (storage, _) = populated_storage(5);
        let strange_genesis = testing::boundary(
            chain_model::Epoch(7),
            HeaderHash::digest(&[b"elsewhere"]),
            chain_model::ChainDifficulty(0),
        );
        let stranger = testing::main_child(strange_genesis.header(), SlotId::new(7, 0));
        let newest_first = vec![
            stranger.header().clone(),
            strange_genesis.header().clone(),
        ];
        assert_eq!(storage.find_main_chain_ancestor(&newest_first).unwrap(), None);
    }

    #[test]
    fn headers_from_checkpoint_include_the_checkpoint() {
        let (storage, blocks) = populated_storage(5);
        let range = storage
            .headers_from_checkpoints(&[blocks[2].hash()], None)
            .unwrap();
        // oldest-first, from the block below the checkpoint to the tip
        let expected: Vec<HeaderHash> = blocks[1..].iter().map(|b| b.hash()).collect();
        let got: Vec<HeaderHash> = range.iter().map(|h| h.hash()).collect();
        assert_eq!(got, expected);
        for header in &range {
            assert!(storage.is_in_main_chain(&header.hash()).unwrap());
        }
    }

    #[test]
    fn headers_without_reachable_checkpoint_run_to_genesis() {
        let (storage, blocks) = populated_storage(4);
        let unknown = HeaderHash::digest(&[b"nowhere"]);
        let range = storage.headers_from_checkpoints(&[unknown], None).unwrap();
        let got: Vec<HeaderHash> = range.iter().map(|h| h.hash()).collect();
        let expected: Vec<HeaderHash> = blocks.iter().map(|b| b.hash()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn headers_from_explicit_start() {
        let (storage, blocks) = populated_storage(6);
        let range = storage
            .headers_from_checkpoints(&[blocks[1].hash()], Some(blocks[4].hash()))
            .unwrap();
        let got: Vec<HeaderHash> = range.iter().map(|h| h.hash()).collect();
        let expected: Vec<HeaderHash> = blocks[..5].iter().map(|b| b.hash()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn blocks_between_endpoints() {
        let (storage, blocks) = populated_storage(5);
        let range = storage
            .blocks_between(&blocks[2].hash(), &blocks[5].hash())
            .unwrap()
            .unwrap();
        let got: Vec<HeaderHash> = range.iter().map(|b| b.hash()).collect();
        let expected: Vec<HeaderHash> =
            blocks[2..=5].iter().rev().map(|b| b.hash()).collect();
        assert_eq!(got, expected);

        // dates descend strictly and the endpoints match
        for window in range.windows(2) {
            assert!(window[0].header().date() > window[1].header().date());
        }
    }

    #[test]
    fn blocks_between_equal_endpoints() {
        let (storage, blocks) = populated_storage(3);
        let range = storage
            .blocks_between(&blocks[2].hash(), &blocks[2].hash())
            .unwrap()
            .unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].hash(), blocks[2].hash());
    }

    #[test]
    fn blocks_between_rejects_reversed_endpoints() {
        let (storage, blocks) = populated_storage(4);
        assert_eq!(
            storage
                .blocks_between(&blocks[4].hash(), &blocks[1].hash())
                .unwrap(),
            None
        );
    }

    #[test]
    fn blocks_between_rejects_siblings() {
        let (storage, blocks) = populated_storage(4);
        // a sibling of blocks[4] at the same slot, not an ancestor of it
        let sibling = testing::main_child(blocks[2].header(), SlotId::new(0, 3));
        storage
            .db()
            .put_block(&testing::undo_for(&sibling), false, &sibling)
            .unwrap();
        assert_eq!(
            storage
                .blocks_between(&sibling.hash(), &blocks[4].hash())
                .unwrap(),
            None
        );
    }

    #[test]
    fn blocks_between_unknown_endpoint() {
        let (storage, blocks) = populated_storage(2);
        let unknown = HeaderHash::digest(&[b"unknown"]);
        assert_eq!(
            storage.blocks_between(&unknown, &blocks[2].hash()).unwrap(),
            None
        );
        assert_eq!(
            storage.blocks_between(&blocks[1].hash(), &unknown).unwrap(),
            None
        );
    }
}
