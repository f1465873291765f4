//! Bit-codec generation: derive pack/unpack step lists for a message.
//!
//! [`generate_codec`] validates a message layout and produces a
//! [`CodecDescription`]: per segment, the ordered pack steps (optional byte
//! swap, insert) and unpack steps (extract, optional byte swap, then sign
//! extension, bool conversion or enum narrowing). The description can be
//! executed directly with [`CodecDescription::pack`] / [`CodecDescription::unpack`]
//! and is what the emitter renders into C.

use crate::ast::{ByteOrder, ByteWidth, EnumDef, Message, Segment, SegmentKind};
use crate::bits;
use crate::value::{EnumValue, MessageValues, Value};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("message {message}: segment {segment} has zero length")]
    ZeroLength { message: String, segment: String },
    #[error("message {message}: segment {segment} is {length} bits (max 64)")]
    TooLong {
        message: String,
        segment: String,
        length: u32,
    },
    #[error("message {message}: segment {segment} [{position}, {end}) does not fit in 64 bits")]
    OutOfRange {
        message: String,
        segment: String,
        position: u32,
        end: u64,
    },
    #[error("message {message}: segments {first} and {second} overlap")]
    Overlap {
        message: String,
        first: String,
        second: String,
    },
    #[error("message {message}: duplicate segment {segment}")]
    DuplicateSegment { message: String, segment: String },
    #[error("message {message}: segment {segment} ends at bit {end}, past the {payload_bits}-bit payload")]
    TruncatedSegment {
        message: String,
        segment: String,
        end: u64,
        payload_bits: usize,
    },
    #[error("message {message}: segment {segment} references unknown enum {name}")]
    UnknownEnum {
        message: String,
        segment: String,
        name: String,
    },
    #[error("message {message}: segment {segment} has no integer type for {bits} bits")]
    UnsupportedByteWidth {
        message: String,
        segment: String,
        bits: u32,
    },
    #[error("message {message}: missing value for segment {segment}")]
    MissingValue { message: String, segment: String },
    #[error("message {message}: segment {segment} expects a {expected} value, got {found}")]
    KindMismatch {
        message: String,
        segment: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("message {message}: value for segment {segment} does not fit in {length} bits")]
    ValueOutOfRange {
        message: String,
        segment: String,
        length: u32,
    },
    #[error("message {message}: payload is {found} bytes, expected at least {expected}")]
    ShortPayload {
        message: String,
        expected: usize,
        found: usize,
    },
}

/// Pack-side step for one segment, applied in order to the segment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackStep {
    /// Reorder the value's bytes (little-endian integer segments wider than one byte).
    ByteSwap { width: ByteWidth, bits: u32 },
    Insert { position: u32, length: u32 },
}

/// Unpack-side step for one segment. `ByteSwap` here undoes the pack-side swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackStep {
    Extract { position: u32, length: u32 },
    ByteSwap { width: ByteWidth, bits: u32 },
    SignExtend { bits: u32 },
    ToBool,
    /// Reinterpret the raw integer as the named enum without range checking.
    NarrowEnum { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub segment: String,
    pub kind: SegmentKind,
    pub position: u32,
    pub length: u32,
    /// Integer type the value is held in (declared type or smallest fit).
    pub carrier: ByteWidth,
    pub pack: Vec<PackStep>,
    pub unpack: Vec<UnpackStep>,
}

impl SegmentPlan {
    /// Byte swap applied to this segment, if any.
    pub fn byte_swap(&self) -> Option<(ByteWidth, u32)> {
        self.pack.iter().find_map(|s| match *s {
            PackStep::ByteSwap { width, bits } => Some((width, bits)),
            PackStep::Insert { .. } => None,
        })
    }
}

/// Structured pack/unpack description of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescription {
    pub message: String,
    pub identifier: u32,
    pub byte_order: ByteOrder,
    pub payload_byte_length: usize,
    pub segments: Vec<SegmentPlan>,
}

/// Check every layout invariant of `message`: segment lengths in `1..=64`,
/// ranges inside the 64-bit accumulator and inside the payload, no overlaps,
/// unique names and known enums.
pub fn check_layout(message: &Message, enums: &[EnumDef]) -> Result<(), CodecError> {
    let mut names = HashSet::new();
    for seg in &message.segments {
        if !names.insert(seg.name.as_str()) {
            return Err(CodecError::DuplicateSegment {
                message: message.name.clone(),
                segment: seg.name.clone(),
            });
        }
        if seg.length == 0 {
            return Err(CodecError::ZeroLength {
                message: message.name.clone(),
                segment: seg.name.clone(),
            });
        }
        if seg.length > bits::ACCUMULATOR_BITS {
            return Err(CodecError::TooLong {
                message: message.name.clone(),
                segment: seg.name.clone(),
                length: seg.length,
            });
        }
        if seg.end() > u64::from(bits::ACCUMULATOR_BITS) {
            return Err(CodecError::OutOfRange {
                message: message.name.clone(),
                segment: seg.name.clone(),
                position: seg.position,
                end: seg.end(),
            });
        }
        if let SegmentKind::Enum(name) = &seg.kind {
            if !enums.iter().any(|e| &e.name == name) {
                return Err(CodecError::UnknownEnum {
                    message: message.name.clone(),
                    segment: seg.name.clone(),
                    name: name.clone(),
                });
            }
        }
    }

    let mut ordered: Vec<&Segment> = message.segments.iter().collect();
    ordered.sort_by_key(|s| s.position);
    for pair in ordered.windows(2) {
        if pair[0].end() > u64::from(pair[1].position) {
            return Err(CodecError::Overlap {
                message: message.name.clone(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }

    // Output is truncated to the payload length; anything past it would be lost.
    let payload_bits = message.payload_byte_length() * 8;
    if let Some(seg) = ordered.iter().find(|s| s.end() > payload_bits as u64) {
        return Err(CodecError::TruncatedSegment {
            message: message.name.clone(),
            segment: seg.name.clone(),
            end: seg.end(),
            payload_bits,
        });
    }
    Ok(())
}

/// Derive the pack/unpack description of `message`.
pub fn generate_codec(message: &Message, enums: &[EnumDef]) -> Result<CodecDescription, CodecError> {
    check_layout(message, enums)?;
    let mut segments = Vec::with_capacity(message.segments.len());
    for seg in &message.segments {
        let plan = plan_segment(seg, message)?;
        debug!(
            message = %message.name,
            segment = %seg.name,
            position = seg.position,
            length = seg.length,
            swap = plan.byte_swap().is_some(),
            "planned segment"
        );
        segments.push(plan);
    }
    Ok(CodecDescription {
        message: message.name.clone(),
        identifier: message.identifier,
        byte_order: message.byte_order,
        payload_byte_length: message.payload_byte_length(),
        segments,
    })
}

fn plan_segment(seg: &Segment, message: &Message) -> Result<SegmentPlan, CodecError> {
    let unsupported = |bits: u32| CodecError::UnsupportedByteWidth {
        message: message.name.clone(),
        segment: seg.name.clone(),
        bits,
    };
    let insert = PackStep::Insert {
        position: seg.position,
        length: seg.length,
    };
    let extract = UnpackStep::Extract {
        position: seg.position,
        length: seg.length,
    };
    let carrier = seg
        .carrier_width()
        .ok_or_else(|| unsupported(seg.declared_bits.unwrap_or(0).max(seg.length)))?;
    let swap = if seg.kind.is_integer() && message.byte_order == ByteOrder::Little {
        let width = seg.byte_width().ok_or_else(|| unsupported(seg.length))?;
        (width != ByteWidth::One).then_some((width, seg.length))
    } else {
        None
    };

    let mut pack = Vec::with_capacity(2);
    let mut unpack = vec![extract];
    if let Some((width, bits)) = swap {
        pack.push(PackStep::ByteSwap { width, bits });
        unpack.push(UnpackStep::ByteSwap { width, bits });
    }
    pack.push(insert);

    match &seg.kind {
        SegmentKind::Signed => unpack.push(UnpackStep::SignExtend { bits: seg.length }),
        SegmentKind::Unsigned => {}
        SegmentKind::Bool => unpack.push(UnpackStep::ToBool),
        SegmentKind::Enum(name) => unpack.push(UnpackStep::NarrowEnum { name: name.clone() }),
    }

    Ok(SegmentPlan {
        segment: seg.name.clone(),
        kind: seg.kind.clone(),
        position: seg.position,
        length: seg.length,
        carrier,
        pack,
        unpack,
    })
}

impl CodecDescription {
    /// Pack values into the 64-bit accumulator (before truncation to the payload).
    pub fn pack_bitstring(&self, values: &MessageValues) -> Result<u64, CodecError> {
        let mut acc = 0u64;
        for plan in &self.segments {
            let value = values
                .get(&plan.segment)
                .ok_or_else(|| CodecError::MissingValue {
                    message: self.message.clone(),
                    segment: plan.segment.clone(),
                })?;
            let mut raw = self.raw_value(plan, value)?;
            for step in &plan.pack {
                match *step {
                    PackStep::ByteSwap { bits, .. } => raw = bits::swap_bytes(raw, bits),
                    PackStep::Insert { position, length } => {
                        acc = bits::insert(acc, raw, position, length)
                    }
                }
            }
        }
        Ok(acc)
    }

    /// Pack values into `payload_byte_length` bytes.
    pub fn pack(&self, values: &MessageValues) -> Result<Vec<u8>, CodecError> {
        let acc = self.pack_bitstring(values)?;
        Ok(bits::from_bitstring(acc, self.payload_byte_length))
    }

    /// Unpack every segment from the 64-bit accumulator.
    pub fn unpack_bitstring(&self, acc: u64) -> MessageValues {
        let mut out = MessageValues::with_capacity(self.segments.len());
        for plan in &self.segments {
            let mut raw = 0u64;
            let mut value = None;
            for step in &plan.unpack {
                match step {
                    UnpackStep::Extract { position, length } => {
                        raw = bits::extract(acc, *position, *length)
                    }
                    UnpackStep::ByteSwap { bits, .. } => raw = bits::unswap_bytes(raw, *bits),
                    UnpackStep::SignExtend { bits } => {
                        value = Some(Value::Signed(bits::sign_extend(raw, *bits)))
                    }
                    UnpackStep::ToBool => value = Some(Value::Bool(raw != 0)),
                    UnpackStep::NarrowEnum { .. } => value = Some(Value::Enum(EnumValue(raw))),
                }
            }
            out.insert(plan.segment.clone(), value.unwrap_or(Value::Unsigned(raw)));
        }
        out
    }

    /// Unpack a received payload of at least `payload_byte_length` bytes.
    pub fn unpack(&self, bytes: &[u8]) -> Result<MessageValues, CodecError> {
        if bytes.len() < self.payload_byte_length {
            return Err(CodecError::ShortPayload {
                message: self.message.clone(),
                expected: self.payload_byte_length,
                found: bytes.len(),
            });
        }
        let acc = bits::to_bitstring(&bytes[..self.payload_byte_length]);
        Ok(self.unpack_bitstring(acc))
    }

    pub fn segment(&self, name: &str) -> Option<&SegmentPlan> {
        self.segments.iter().find(|s| s.segment == name)
    }

    /// Check kind and range of `value`, returning its right-aligned bit pattern.
    fn raw_value(&self, plan: &SegmentPlan, value: &Value) -> Result<u64, CodecError> {
        let length = plan.length;
        let out_of_range = || CodecError::ValueOutOfRange {
            message: self.message.clone(),
            segment: plan.segment.clone(),
            length,
        };
        match (&plan.kind, value) {
            (SegmentKind::Unsigned, Value::Unsigned(x)) => {
                if *x > bits::ones(length) {
                    return Err(out_of_range());
                }
                Ok(*x)
            }
            (SegmentKind::Signed, Value::Signed(x)) => {
                if length < 64 {
                    let max = (1i64 << (length - 1)) - 1;
                    let min = -(1i64 << (length - 1));
                    if *x < min || *x > max {
                        return Err(out_of_range());
                    }
                }
                Ok((*x as u64) & bits::ones(length))
            }
            (SegmentKind::Bool, Value::Bool(b)) => Ok(u64::from(*b)),
            (SegmentKind::Enum(_), Value::Enum(e)) => {
                if e.raw() > bits::ones(length) {
                    return Err(out_of_range());
                }
                Ok(e.raw())
            }
            (kind, found) => Err(CodecError::KindMismatch {
                message: self.message.clone(),
                segment: plan.segment.clone(),
                expected: kind_name(kind),
                found: found.kind_name(),
            }),
        }
    }
}

fn kind_name(kind: &SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Signed => "signed",
        SegmentKind::Unsigned => "unsigned",
        SegmentKind::Bool => "bool",
        SegmentKind::Enum(_) => "enum",
    }
}
