//! Frame handling: match a raw frame to its message by identifier and unpack it.
//!
//! This is the software stage that runs after the acceptance filter admitted
//! a frame; unsubscribed identifiers below the filter threshold end up here
//! as [`FrameDecodeResult::Unknown`].

use crate::codec::{CodecDescription, CodecError};
use crate::generate::GeneratedLibrary;
use crate::value::MessageValues;
use std::collections::HashMap;

/// Raw frame: identifier and up to 8 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum FrameDecodeResult {
    Decoded {
        message: String,
        values: MessageValues,
    },
    Unknown {
        identifier: u32,
    },
}

/// Identifier -> codec lookup for every bus of a generated library.
#[derive(Debug)]
pub struct Demux<'a> {
    by_bus: HashMap<&'a str, HashMap<u32, &'a CodecDescription>>,
    by_name: HashMap<&'a str, &'a CodecDescription>,
}

impl<'a> Demux<'a> {
    pub fn new(library: &'a GeneratedLibrary) -> Self {
        let mut by_bus = HashMap::new();
        let mut by_name = HashMap::new();
        for bus in &library.buses {
            let ids: HashMap<u32, &CodecDescription> =
                bus.codecs.iter().map(|c| (c.identifier, c)).collect();
            by_bus.insert(bus.bus.as_str(), ids);
            for c in &bus.codecs {
                by_name.insert(c.message.as_str(), c);
            }
        }
        Demux { by_bus, by_name }
    }

    /// Codec of the message carried on `bus` with `identifier`.
    pub fn lookup(&self, bus: &str, identifier: u32) -> Option<&'a CodecDescription> {
        self.by_bus.get(bus).and_then(|ids| ids.get(&identifier)).copied()
    }

    /// Decode one frame received on `bus`.
    pub fn decode(&self, bus: &str, frame: &Frame) -> Result<FrameDecodeResult, CodecError> {
        match self.lookup(bus, frame.id) {
            Some(codec) => Ok(FrameDecodeResult::Decoded {
                message: codec.message.clone(),
                values: codec.unpack(&frame.data)?,
            }),
            None => Ok(FrameDecodeResult::Unknown {
                identifier: frame.id,
            }),
        }
    }

    /// Pack `values` into a frame of `message`. `None` if the message is unknown.
    pub fn encode(&self, message: &str, values: &MessageValues) -> Option<Result<Frame, CodecError>> {
        let codec = self.by_name.get(message)?;
        Some(codec.pack(values).map(|data| Frame {
            id: codec.identifier,
            data,
        }))
    }
}
