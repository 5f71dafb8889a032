//! Pure structural verification of headers and header chains.
//!
//! Verification collects every failing check instead of stopping at the
//! first one; callers join the failures into a single stable message.

use crate::date::{ChainDate, SlotId};
use crate::header::BlockHeader;
use crate::HeaderHash;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("parent hash mismatch: expected {expected}, found {found}")]
    ParentMismatch {
        expected: HeaderHash,
        found: HeaderHash,
    },
    #[error("date {child} is not after parent date {parent}")]
    DateNotIncreasing { child: ChainDate, parent: ChainDate },
    #[error("difficulty {found} does not follow parent difficulty {parent}")]
    DifficultyMismatch {
        parent: crate::ChainDifficulty,
        found: crate::ChainDifficulty,
    },
    #[error("slot {slot} is ahead of the current slot {current}")]
    FromFuture { slot: SlotId, current: SlotId },
    #[error("invalid consensus proof for slot {0}")]
    InvalidSeal(SlotId),
}

/// Context a single header is verified against.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyHeaderParams<'a> {
    /// Parent header, when linkage and continuity are to be checked.
    pub parent: Option<&'a BlockHeader>,
    /// Upper bound on main-header slots, when known.
    pub current_slot: Option<SlotId>,
    /// Whether the consensus proof of a main header must hold.
    pub check_consensus: bool,
}

/// Check one header against its context, collecting all failures.
pub fn verify_header(
    params: &VerifyHeaderParams,
    header: &BlockHeader,
) -> Result<(), Vec<HeaderError>> {
    let mut errors = Vec::new();

    if let Some(parent) = params.parent {
        let expected = parent.hash();
        if header.parent() != expected {
            errors.push(HeaderError::ParentMismatch {
                expected,
                found: header.parent(),
            });
        }
        if header.date() <= parent.date() {
            errors.push(HeaderError::DateNotIncreasing {
                child: header.date(),
                parent: parent.date(),
            });
        }
        let expected_difficulty = parent.difficulty().advance(header.difficulty_delta());
        if header.difficulty() != expected_difficulty {
            errors.push(HeaderError::DifficultyMismatch {
                parent: parent.difficulty(),
                found: header.difficulty(),
            });
        }
    }

    if let BlockHeader::Main(main) = header {
        if let Some(current) = params.current_slot {
            if main.slot > current {
                errors.push(HeaderError::FromFuture {
                    slot: main.slot,
                    current,
                });
            }
        }
        if params.check_consensus && !main.seal.verify(main.slot, &main.parent) {
            errors.push(HeaderError::InvalidSeal(main.slot));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check a newest-first header chain for internal consistency: every
/// header links to the next one and passes its own structural checks.
///
/// The oldest header has no parent in the sequence, so only its
/// self-contained checks run.
pub fn verify_header_chain(
    newest_first: &[BlockHeader],
    require_consensus: bool,
) -> Result<(), Vec<HeaderError>> {
    let mut errors = Vec::new();
    for (index, header) in newest_first.iter().enumerate() {
        let params = VerifyHeaderParams {
            parent: newest_first.get(index + 1),
            current_slot: None,
            check_consensus: require_consensus,
        };
        if let Err(mut failed) = verify_header(&params, header) {
            errors.append(&mut failed);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Join failures into one stable, order-preserving message.
pub fn join_errors(errors: &[HeaderError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
