//! Hardware acceptance filter derivation.
//!
//! Incoming identifiers are ANDed with the mask and compared with the
//! reference value (always 0). The mask keeps every identifier bit above the
//! highest bit of the largest subscribed identifier, so frames with a larger
//! (lower priority) identifier are dropped in hardware. Identifiers below the
//! maximum that the node does not subscribe to still pass; software demux
//! handles those.

use crate::ast::{Bus, Message};
use tracing::debug;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("bus {bus}: highest subscribed identifier is 0, no filter mask can be derived")]
    ZeroIdentifier { bus: String },
    #[error("bus {bus}: subscribed message {message} is not carried by this bus")]
    NotOnBus { bus: String, message: String },
    #[error("bus {bus}: message {message} identifier {identifier:#x} does not fit the bus identifier width")]
    IdentifierOutOfRange {
        bus: String,
        message: String,
        identifier: u32,
    },
}

/// Mask/reference pair programmed into the receive hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceFilter {
    pub mask: u32,
    pub reference: u32,
}

impl AcceptanceFilter {
    /// No bits compared: every identifier is admitted.
    pub fn accept_all() -> Self {
        AcceptanceFilter { mask: 0, reference: 0 }
    }

    pub fn is_accept_all(&self) -> bool {
        self.mask == 0
    }

    /// Hardware comparison: `(id & mask) == reference`.
    pub fn accepts(&self, identifier: u32) -> bool {
        identifier & self.mask == self.reference
    }
}

/// Derive the acceptance filter for a node subscribing to `subscribed` on `bus`.
pub fn generate_filter_mask(bus: &Bus, subscribed: &[&Message]) -> Result<AcceptanceFilter, FilterError> {
    for m in subscribed {
        if bus.message_by_id(m.identifier).map(|b| b.name.as_str()) != Some(m.name.as_str()) {
            return Err(FilterError::NotOnBus {
                bus: bus.name.clone(),
                message: m.name.clone(),
            });
        }
        if m.identifier > bus.id_mask() {
            return Err(FilterError::IdentifierOutOfRange {
                bus: bus.name.clone(),
                message: m.name.clone(),
                identifier: m.identifier,
            });
        }
    }

    let max_id = match subscribed.iter().map(|m| m.identifier).max() {
        Some(id) => id,
        None => return Ok(AcceptanceFilter::accept_all()),
    };
    if max_id == 0 {
        return Err(FilterError::ZeroIdentifier { bus: bus.name.clone() });
    }

    // floor(log2(max_id)) + 1
    let needed_bits = u32::BITS - max_id.leading_zeros();
    let low_mask = ((1u64 << needed_bits) - 1) as u32;
    let mask = low_mask ^ bus.id_mask();
    debug!(bus = %bus.name, max_id, needed_bits, mask, "derived filter mask");
    Ok(AcceptanceFilter { mask, reference: 0 })
}
