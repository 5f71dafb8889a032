use chain_model::SlotsPerEpoch;
use serde::{Deserialize, Serialize};

/// Chain parameters the block logic depends on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Security parameter: the deepest fork, in slots, the node accepts.
    pub k: u32,
    pub slots_per_epoch: SlotsPerEpoch,
}
