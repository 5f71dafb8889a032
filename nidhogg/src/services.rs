//! Interfaces of the subsystems the block logic collaborates with.
//!
//! The chain core treats block payloads opaquely; the transaction and
//! shared-secret subsystems verify them, fold them forward on apply and
//! unwind them on rollback. The slot clock tells the core what slot the
//! wall clock is in.

use chain_model::{Block, BlockUndo, SlotId, TxUndo};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TxError(pub String);

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SscError(pub String);

/// Wall-clock slotting service.
pub trait SlotClock: Send + Sync {
    fn current_slot(&self) -> SlotId;
}

/// Transaction validation subsystem.
///
/// `verify_blocks` is the step that produces the per-block undo records;
/// apply and rollback are expected to succeed on sequences that verified
/// against the same tip.
pub trait TxLedger: Send + Sync {
    fn verify_blocks(&self, blocks: &[Block]) -> Result<Vec<TxUndo>, TxError>;
    fn apply_blocks(&self, blocks: &[Block]) -> Result<(), TxError>;
    fn rollback_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<(), TxError>;
}

/// Shared-secret-computation subsystem.
pub trait SscLedger: Send + Sync {
    fn verify_blocks(&self, blocks: &[Block]) -> Result<(), SscError>;
    fn apply_blocks(&self, blocks: &[Block]) -> Result<(), SscError>;
    fn rollback_blocks(&self, segment: &[(Block, BlockUndo)]) -> Result<(), SscError>;
}
