use chain_model::HeaderHash;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("block {0} not found")]
    BlockNotFound(HeaderHash),
    #[error("the parent {0} of the block being written is missing")]
    MissingParent(HeaderHash),
}
