//! Chain logic: header triage against the local state, end-to-end
//! verification of block sequences, and the atomic apply/rollback of
//! verified segments against the tip.
//!
//! ```text
//!   headers in ----> classify_* ----> fetch blocks (storage) ---+
//!                                                               v
//!   tip <---- apply_blocks / rollback_blocks <---- verify_blocks
//!              (tip semaphore held)
//! ```
//!
//! The surrounding node schedules synchronization rounds and holds the
//! tip semaphore across verify+apply; everything here assumes that
//! discipline and nothing else.

use crate::blockchain::{Storage, TipSemaphore};
use crate::services::{SlotClock, SscLedger, TxLedger};
use crate::settings::ProtocolSettings;
use chain_model::verify::{join_errors, verify_header, verify_header_chain, VerifyHeaderParams};
use chain_model::{Block, BlockHeader, BlockUndo, HeaderHash};
use chain_store::{BlockDb, SegmentIntent, SegmentOp};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] chain_store::Error),

    #[error("invalid chain segment: {reason}")]
    InvalidSegment { reason: String },

    #[error("transaction subsystem failed: {0}")]
    Tx(#[from] crate::services::TxError),

    #[error("shared-secret subsystem failed: {0}")]
    Ssc(#[from] crate::services::SscError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Verdict on a single announced header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderTriage {
    /// Extends the current main-chain tip.
    Continues,
    /// Tip of some fork strictly more difficult than the main chain.
    Alternative,
    /// Nothing wrong with it, but nothing to do about it either.
    NotOfInterest { reason: String },
    Invalid { reason: String },
}

/// Verdict on a newest-first header chain offered by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTriage {
    /// The chain is sound; `attach` is where it meets the local chain:
    /// the tip header when the chain simply extends it, otherwise the
    /// offered header sitting right above the common ancestor.
    Valid { attach: BlockHeader },
    NotOfInterest { reason: String },
    Invalid { reason: String },
}

/// The chain logic core and its collaborators.
///
/// One instance exists per node; it is cheap to clone and safe to share.
#[derive(Clone)]
pub struct Blockchain {
    storage: Storage,
    tx: Arc<dyn TxLedger>,
    ssc: Arc<dyn SscLedger>,
    clock: Arc<dyn SlotClock>,
    settings: ProtocolSettings,
    tip_semaphore: Arc<TipSemaphore>,
}

impl Blockchain {
    pub fn new(
        db: Arc<dyn BlockDb>,
        tx: Arc<dyn TxLedger>,
        ssc: Arc<dyn SscLedger>,
        clock: Arc<dyn SlotClock>,
        settings: ProtocolSettings,
    ) -> Result<Self> {
        let tip = db.tip()?;
        Ok(Blockchain {
            storage: Storage::new(db),
            tx,
            ssc,
            clock,
            settings,
            tip_semaphore: Arc::new(TipSemaphore::new(tip)),
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    pub fn tip_semaphore(&self) -> &TipSemaphore {
        &self.tip_semaphore
    }

    /// Run `action` as the single writer of the tip: it receives the
    /// current tip and returns the new one. On failure or cancellation
    /// the previous tip is restored. See [`TipSemaphore::with_update`].
    pub async fn with_tip_update<F, Fut>(&self, action: F) -> Result<HeaderHash>
    where
        F: FnOnce(HeaderHash) -> Fut,
        Fut: Future<Output = Result<HeaderHash>>,
    {
        self.tip_semaphore.with_update(action).await
    }

    /// Exponentially spaced locator below `upto` (the tip when `None`),
    /// bounded by the security parameter. See [`Storage::block_locator`].
    pub fn block_locator(&self, upto: Option<HeaderHash>) -> Result<Vec<HeaderHash>> {
        Ok(self.storage.block_locator(upto, self.settings.k)?)
    }

    /// Classify one announced header against the local tip.
    pub fn classify_new_header(&self, header: &BlockHeader) -> Result<HeaderTriage> {
        let main = match header {
            BlockHeader::Boundary(_) => {
                // boundary blocks are derivable locally, never news
                return Ok(HeaderTriage::NotOfInterest {
                    reason: "genesis header is useless".into(),
                });
            }
            BlockHeader::Main(main) => main,
        };

        let current_slot = self.clock.current_slot();
        if main.slot != current_slot {
            return Ok(HeaderTriage::NotOfInterest {
                reason: "header is not for current slot".into(),
            });
        }

        let tip = self.storage.tip()?;
        let tip_block = self.storage.tip_block()?;

        let triage = if header.parent() == tip {
            let params = VerifyHeaderParams {
                parent: Some(tip_block.header()),
                current_slot: Some(current_slot),
                check_consensus: true,
            };
            match verify_header(&params, header) {
                Ok(()) => HeaderTriage::Continues,
                Err(errors) => HeaderTriage::Invalid {
                    reason: join_errors(&errors),
                },
            }
        } else if tip_block.header().difficulty() < header.difficulty() {
            HeaderTriage::Alternative
        } else {
            HeaderTriage::NotOfInterest {
                reason: "header doesn't continue main chain and is not more difficult".into(),
            }
        };
        debug!(header = %header.description(), ?triage, "classified announced header");
        Ok(triage)
    }

    /// Classify a newest-first header chain offered by a peer.
    ///
    /// The oldest header must already be known locally (peers overlap
    /// their answer with one of our checkpoints), the chain must be
    /// internally consistent, and the fork it implies must not be deeper
    /// than the security parameter.
    pub fn classify_headers(&self, newest_first: &[BlockHeader]) -> Result<ChainTriage> {
        let oldest = match newest_first.last() {
            Some(header) => header,
            None => {
                return Ok(ChainTriage::Invalid {
                    reason: "Header chain is invalid".into(),
                })
            }
        };

        if self.storage.block_header(&oldest.hash())?.is_none() {
            return Ok(ChainTriage::Invalid {
                reason: "Last block of the passed chain wasn't found locally".into(),
            });
        }

        if verify_header_chain(newest_first, true).is_err() {
            return Ok(ChainTriage::Invalid {
                reason: "Header chain is invalid".into(),
            });
        }

        let lca_hash = self
            .storage
            .find_main_chain_ancestor(newest_first)?
            .expect("a chain whose oldest header is known locally has a main-chain ancestor");
        let lca = self
            .storage
            .block_header(&lca_hash)?
            .expect("main-chain ancestor is present in the store");

        let tip_header = self.storage.tip_block()?.header().clone();
        let spe = self.settings.slots_per_epoch;
        let tip_flat = tip_header.date().flatten(spe);
        let lca_flat = lca.date().flatten(spe);
        assert!(
            lca_flat <= tip_flat,
            "main-chain ancestor {} is newer than the tip {}",
            lca.description(),
            tip_header.description(),
        );

        let depth = tip_flat.0 - lca_flat.0;
        if depth > self.settings.k as u64 {
            return Ok(ChainTriage::NotOfInterest {
                reason: format!(
                    "Slot difference of (tip,lca) is {} which is more than k = {}",
                    depth, self.settings.k
                ),
            });
        }

        if lca_hash == tip_header.hash() {
            // the offered chain extends the current tip
            return Ok(ChainTriage::Valid { attach: tip_header });
        }

        let attach = newest_first
            .iter()
            .find(|header| header.parent() == lca_hash)
            .cloned()
            .expect("the header chain contains the child of its main-chain ancestor");
        Ok(ChainTriage::Valid { attach })
    }

    /// Verify an oldest-first block sequence end to end and produce the
    /// undo records that make it revertible.
    ///
    /// Cheap structural checks run over the whole sequence first, then
    /// the shared-secret layer, then transaction validation, whose cost
    /// dominates and whose byproduct is the undo sequence. The sequence
    /// must be rooted at the current tip.
    pub fn verify_blocks(&self, blocks: &[Block]) -> Result<Vec<BlockUndo>> {
        if blocks.is_empty() {
            return Err(Error::InvalidSegment {
                reason: "empty block sequence".into(),
            });
        }

        let current_slot = self.clock.current_slot();
        let tip_header = self.storage.tip_block()?.header().clone();

        let mut errors = Vec::new();
        let mut parent = &tip_header;
        for block in blocks {
            let params = VerifyHeaderParams {
                parent: Some(parent),
                current_slot: Some(current_slot),
                check_consensus: true,
            };
            if let Err(mut failed) = verify_header(&params, block.header()) {
                errors.append(&mut failed);
            }
            parent = block.header();
        }
        if !errors.is_empty() {
            let reason = join_errors(&errors);
            warn!(blocks = blocks.len(), %reason, "rejecting block segment");
            return Err(Error::InvalidSegment { reason });
        }

        self.ssc
            .verify_blocks(blocks)
            .map_err(|e| Error::InvalidSegment {
                reason: e.to_string(),
            })?;

        let undos = self
            .tx
            .verify_blocks(blocks)
            .map_err(|e| Error::InvalidSegment {
                reason: e.to_string(),
            })?;
        debug_assert_eq!(undos.len(), blocks.len());

        Ok(undos.into_iter().map(|tx| BlockUndo { tx }).collect())
    }

    /// Persist and fold forward a verified oldest-first segment.
    ///
    /// Preconditions (the caller's obligation): the segment verified
    /// against the current tip and the tip semaphore is held. The store
    /// mutations run under a write-ahead intent record so an interruption
    /// is recoverable; see [`Blockchain::recover_interrupted`].
    pub fn apply_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<()> {
        let first = match segment.first() {
            Some((block, _)) => block,
            None => return Ok(()),
        };
        let db = self.storage.db();
        let previous_tip = db.tip()?;
        debug_assert_eq!(first.header().parent(), previous_tip);
        let target_tip = segment.last().map(|(block, _)| block.hash()).unwrap();

        db.put_intent(&SegmentIntent {
            op: SegmentOp::Apply,
            hashes: segment.iter().map(|(block, _)| block.hash()).collect(),
            previous_tip,
            target_tip,
        })?;

        for (block, undo) in segment {
            db.put_block(undo, true, block)?;
        }
        db.set_tip(&target_tip)?;

        let blocks: Vec<Block> = segment.iter().map(|(block, _)| block.clone()).collect();
        self.tx.apply_blocks(&blocks)?;
        self.ssc.apply_blocks(&blocks)?;

        db.take_intent()?;
        info!(blocks = segment.len(), tip = %target_tip, "advanced the main chain");
        Ok(())
    }

    /// Retract a newest-first segment; the head pair corresponds to the
    /// current tip. Preconditions mirror [`Blockchain::apply_blocks`].
    pub fn rollback_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<()> {
        let first = match segment.first() {
            Some((block, _)) => block,
            None => return Ok(()),
        };
        let db = self.storage.db();
        let previous_tip = db.tip()?;
        debug_assert_eq!(first.hash(), previous_tip);
        let target_tip = segment.last().map(|(block, _)| block.header().parent()).unwrap();

        db.put_intent(&SegmentIntent {
            op: SegmentOp::Rollback,
            hashes: segment.iter().rev().map(|(block, _)| block.hash()).collect(),
            previous_tip,
            target_tip,
        })?;

        self.tx.rollback_blocks(segment)?;
        for (block, _) in segment {
            db.set_in_main_chain(&block.hash(), false)?;
        }
        db.set_tip(&target_tip)?;
        self.ssc.rollback_blocks(segment)?;

        db.take_intent()?;
        info!(blocks = segment.len(), tip = %target_tip, "rolled back the main chain");
        Ok(())
    }

    /// Recover from an apply/rollback interrupted by a crash.
    ///
    /// Call once on startup, before the node starts synchronizing. An
    /// interrupted apply is unwound (the segment will be offered again);
    /// an interrupted rollback is completed. Returns the operation that
    /// was pending, if any.
    pub fn recover_interrupted(&self) -> Result<Option<SegmentOp>> {
        let db = self.storage.db();
        let intent = match db.take_intent()? {
            Some(intent) => intent,
            None => return Ok(None),
        };

        match intent.op {
            SegmentOp::Apply => {
                for hash in &intent.hashes {
                    if db.block_header(hash)?.is_some() {
                        db.set_in_main_chain(hash, false)?;
                    }
                }
                db.set_tip(&intent.previous_tip)?;
                info!(tip = %intent.previous_tip, "unwound an interrupted chain advance");
            }
            SegmentOp::Rollback => {
                for hash in &intent.hashes {
                    db.set_in_main_chain(hash, false)?;
                }
                db.set_tip(&intent.target_tip)?;
                info!(tip = %intent.target_tip, "completed an interrupted rollback");
            }
        }
        Ok(Some(intent.op))
    }
}
