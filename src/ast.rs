//! Network model: enums, buses, messages, segments and boards.

use crate::codec::{self, CodecError};
use std::collections::HashMap;

/// Root network definition: enums, buses and the boards attached to them.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub enums: Vec<EnumDef>,
    pub buses: Vec<Bus>,
    pub boards: Vec<Board>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub value: u64,
}

impl EnumDef {
    pub fn variant_by_value(&self, value: u64) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.value == value)
    }

    pub fn variant_by_name(&self, name: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// A shared channel with a fixed identifier width.
#[derive(Debug, Clone)]
pub struct Bus {
    pub name: String,
    /// 29-bit identifiers when set, 11-bit otherwise.
    pub is_extended: bool,
    pub messages: Vec<Message>,
}

pub const STANDARD_ID_MASK: u32 = (1 << 11) - 1;
pub const EXTENDED_ID_MASK: u32 = (1 << 29) - 1;

impl Bus {
    /// All identifier bits of this bus set.
    pub fn id_mask(&self) -> u32 {
        if self.is_extended {
            EXTENDED_ID_MASK
        } else {
            STANDARD_ID_MASK
        }
    }

    pub fn message_by_id(&self, identifier: u32) -> Option<&Message> {
        self.messages.iter().find(|m| m.identifier == identifier)
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// One frame type: identifier, byte order and bit-packed segments.
#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub identifier: u32,
    pub byte_order: ByteOrder,
    pub segments: Vec<Segment>,
}

impl Message {
    /// Total packed bits rounded up to whole bytes (not the highest occupied bit).
    pub fn payload_byte_length(&self) -> usize {
        let bits: u64 = self.segments.iter().map(|s| u64::from(s.length)).sum();
        bits.div_ceil(8) as usize
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }
}

/// One bit-packed field. Position 0 is the most significant bit of the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub position: u32,
    pub length: u32,
    pub kind: SegmentKind,
    /// Bit width of the declared integer type (`u32` -> 32), if any. The
    /// generated struct field uses it; `length` may be narrower.
    pub declared_bits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Signed,
    Unsigned,
    Bool,
    /// Name of an [`EnumDef`].
    Enum(String),
}

impl SegmentKind {
    pub fn is_integer(&self) -> bool {
        matches!(self, SegmentKind::Signed | SegmentKind::Unsigned)
    }
}

/// Byte count of the integer type a segment is carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ByteWidth {
    One,
    Two,
    Four,
    Eight,
}

impl ByteWidth {
    pub fn from_bytes(bytes: u32) -> Option<Self> {
        match bytes {
            1 => Some(ByteWidth::One),
            2 => Some(ByteWidth::Two),
            4 => Some(ByteWidth::Four),
            8 => Some(ByteWidth::Eight),
            _ => None,
        }
    }

    /// Smallest width covering `length` bits. `None` past 64 bits.
    pub fn covering(length: u32) -> Option<Self> {
        let bytes = length.div_ceil(8).max(1);
        ByteWidth::from_bytes(bytes.next_power_of_two())
    }

    pub fn bytes(self) -> u32 {
        match self {
            ByteWidth::One => 1,
            ByteWidth::Two => 2,
            ByteWidth::Four => 4,
            ByteWidth::Eight => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

impl Segment {
    /// Width the byte swap works over, from `length` alone.
    pub fn byte_width(&self) -> Option<ByteWidth> {
        ByteWidth::covering(self.length)
    }

    /// Integer type the value is held in: the declared type, widened if
    /// `length` does not fit it.
    pub fn carrier_width(&self) -> Option<ByteWidth> {
        ByteWidth::covering(self.declared_bits.unwrap_or(0).max(self.length))
    }

    pub fn end(&self) -> u64 {
        u64::from(self.position) + u64::from(self.length)
    }
}

/// A node on one or more buses. Only boards with an `arch` are programmed.
#[derive(Debug, Clone)]
pub struct Board {
    pub name: String,
    pub arch: Option<String>,
    pub subscribe: Vec<BusMessages>,
    pub publish: Vec<BusMessages>,
}

/// Message names a board uses on one bus.
#[derive(Debug, Clone)]
pub struct BusMessages {
    pub bus: String,
    pub messages: Vec<String>,
}

impl Board {
    pub fn is_programmed(&self) -> bool {
        self.arch.is_some()
    }

    pub fn subscriptions(&self, bus: &str) -> Option<&BusMessages> {
        self.subscribe.iter().find(|s| s.bus == bus)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Duplicate enum name: {0}")]
    DuplicateEnum(String),
    #[error("Duplicate bus name: {0}")]
    DuplicateBus(String),
    #[error("Duplicate board name: {0}")]
    DuplicateBoard(String),
    #[error("Duplicate message name: {0}")]
    DuplicateMessage(String),
    #[error("bus {bus}: identifier {identifier:#x} used by both {first} and {second}")]
    DuplicateIdentifier {
        bus: String,
        identifier: u32,
        first: String,
        second: String,
    },
    #[error("bus {bus}: message {message} identifier {identifier:#x} does not fit the bus identifier width")]
    IdentifierOutOfRange {
        bus: String,
        message: String,
        identifier: u32,
    },
    #[error("board {board}: unknown bus {bus}")]
    UnknownBus { board: String, bus: String },
    #[error("board {board}: message {message} is not carried by bus {bus}")]
    UnknownMessage {
        board: String,
        bus: String,
        message: String,
    },
    #[error(transparent)]
    Layout(#[from] CodecError),
}

/// Resolved network: buses, messages, enums and boards by name for generation.
#[derive(Debug, Clone)]
pub struct ResolvedNetwork {
    pub network: Network,
    pub enums_by_name: HashMap<String, usize>,
    pub buses_by_name: HashMap<String, usize>,
    pub boards_by_name: HashMap<String, usize>,
    /// Message name -> (bus index, message index).
    pub messages_by_name: HashMap<String, (usize, usize)>,
}

impl ResolvedNetwork {
    pub fn resolve(network: Network) -> Result<Self, ModelError> {
        let mut enums_by_name = HashMap::new();
        let mut buses_by_name = HashMap::new();
        let mut boards_by_name = HashMap::new();
        let mut messages_by_name = HashMap::new();
        for (i, e) in network.enums.iter().enumerate() {
            if enums_by_name.insert(e.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateEnum(e.name.clone()));
            }
        }
        for (bi, bus) in network.buses.iter().enumerate() {
            if buses_by_name.insert(bus.name.clone(), bi).is_some() {
                return Err(ModelError::DuplicateBus(bus.name.clone()));
            }
            let mut by_id: HashMap<u32, &str> = HashMap::new();
            for (mi, m) in bus.messages.iter().enumerate() {
                if messages_by_name.insert(m.name.clone(), (bi, mi)).is_some() {
                    return Err(ModelError::DuplicateMessage(m.name.clone()));
                }
                if m.identifier > bus.id_mask() {
                    return Err(ModelError::IdentifierOutOfRange {
                        bus: bus.name.clone(),
                        message: m.name.clone(),
                        identifier: m.identifier,
                    });
                }
                if let Some(first) = by_id.insert(m.identifier, &m.name) {
                    return Err(ModelError::DuplicateIdentifier {
                        bus: bus.name.clone(),
                        identifier: m.identifier,
                        first: first.to_string(),
                        second: m.name.clone(),
                    });
                }
                codec::check_layout(m, &network.enums)?;
            }
        }
        for (i, board) in network.boards.iter().enumerate() {
            if boards_by_name.insert(board.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateBoard(board.name.clone()));
            }
            for usage in board.subscribe.iter().chain(board.publish.iter()) {
                let bus = buses_by_name
                    .get(&usage.bus)
                    .map(|&bi| &network.buses[bi])
                    .ok_or_else(|| ModelError::UnknownBus {
                        board: board.name.clone(),
                        bus: usage.bus.clone(),
                    })?;
                for name in &usage.messages {
                    if bus.message(name).is_none() {
                        return Err(ModelError::UnknownMessage {
                            board: board.name.clone(),
                            bus: bus.name.clone(),
                            message: name.clone(),
                        });
                    }
                }
            }
        }
        Ok(ResolvedNetwork {
            network,
            enums_by_name,
            buses_by_name,
            boards_by_name,
            messages_by_name,
        })
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums_by_name
            .get(name)
            .map(|&i| &self.network.enums[i])
    }

    pub fn get_bus(&self, name: &str) -> Option<&Bus> {
        self.buses_by_name
            .get(name)
            .map(|&i| &self.network.buses[i])
    }

    pub fn get_board(&self, name: &str) -> Option<&Board> {
        self.boards_by_name
            .get(name)
            .map(|&i| &self.network.boards[i])
    }

    pub fn get_message(&self, name: &str) -> Option<&Message> {
        self.messages_by_name
            .get(name)
            .map(|&(bi, mi)| &self.network.buses[bi].messages[mi])
    }

    /// Messages a board subscribes to on `bus`, in declaration order.
    pub fn subscribed_messages<'a>(&self, board: &Board, bus: &'a Bus) -> Vec<&'a Message> {
        board
            .subscriptions(&bus.name)
            .map(|s| s.messages.iter().filter_map(|n| bus.message(n)).collect())
            .unwrap_or_default()
    }
}
