mod chain;
mod storage;
mod tip;

#[cfg(test)]
mod testing;

pub use self::{
    chain::{Blockchain, ChainTriage, Error, HeaderTriage},
    storage::Storage,
    tip::TipSemaphore,
};
