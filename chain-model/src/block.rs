//! Blocks and undo records.
//!
//! Block payloads are opaque to the chain logic: the transaction and
//! shared-secret subsystems own their interpretation and expose
//! verification entry points over whole block sequences.

use crate::hash::HeaderHash;
use crate::header::BlockHeader;

/// Transaction payload, interpreted by the transaction subsystem only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxPayload(pub Vec<u8>);

/// Shared-secret-computation payload, interpreted by the ssc subsystem only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SscPayload(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockBody {
    pub tx: TxPayload,
    pub ssc: SscPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Self {
        Block { header, body }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn body(&self) -> &BlockBody {
        &self.body
    }

    pub fn hash(&self) -> HeaderHash {
        self.header.hash()
    }
}

/// Reversal record produced by transaction verification of one block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxUndo(pub Vec<u8>);

/// Reversal record for one applied block; paired 1:1 with blocks in
/// apply and rollback sequences.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockUndo {
    pub tx: TxUndo,
}
