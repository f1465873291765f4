//! # canlib-gen: CAN message codec and filter generator
//!
//! Generates, from a declarative bus description, the code that packs typed
//! message structures into up-to-64-bit CAN payloads and unpacks them again,
//! plus the hardware acceptance filter each receiving board is initialised with.
//!
//! ## Pipeline
//!
//! 1. [`parse`] a `.can` description into a [`Network`]
//! 2. [`ResolvedNetwork::resolve`] it (name lookups, layout validation)
//! 3. [`generate`] one [`CodecDescription`] per message and one
//!    [`AcceptanceFilter`] per board and subscribed bus
//! 4. render C with [`emit::header`] / [`emit::source`] or [`emit::write_library`]
//!
//! ## Example description
//!
//! ```text
//! enum DriveMode { Off = 0, Drive = 1 }
//!
//! bus map standard {
//!   message VcuCommand = 0x100 little {
//!     torque: i16;
//!     enable: bool;
//!     mode: DriveMode @ 17 : 7;
//!   }
//! }
//!
//! board vcu arch stm32f4 {
//!   subscribe map { VcuCommand }
//! }
//! ```
//!
//! Bits are numbered MSB-first: position 0 is the most significant bit of the
//! first payload byte.

pub mod ast;
pub mod bits;
pub mod codec;
pub mod config;
pub mod dump;
pub mod emit;
pub mod filter;
pub mod frame;
pub mod generate;
pub mod parser;
pub mod value;

pub use ast::{Bus, ByteOrder, Message, Network, ResolvedNetwork, Segment, SegmentKind};
pub use codec::{generate_codec, CodecDescription, CodecError};
pub use config::GeneratorConfig;
pub use filter::{generate_filter_mask, AcceptanceFilter, FilterError};
pub use frame::{Demux, Frame, FrameDecodeResult};
pub use generate::{generate, GenerateError, GeneratedLibrary};
pub use parser::parse;
pub use value::{EnumValue, MessageValues, Value};
