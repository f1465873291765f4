//! Parse network description source into the model using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct NetworkParser;

/// Parse network source into the model.
pub fn parse(source: &str) -> Result<Network, String> {
    let pairs = NetworkParser::parse(Rule::network, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_network(pair)
}

fn build_network(pair: pest::iterators::Pair<Rule>) -> Result<Network, String> {
    let mut network = Network::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_section => network.enums.push(build_enum(inner)?),
            Rule::bus_section => network.buses.push(build_bus(inner)?),
            Rule::board_section => network.boards.push(build_board(inner)?),
            _ => {}
        }
    }
    Ok(network)
}

fn build_enum(pair: pest::iterators::Pair<Rule>) -> Result<EnumDef, String> {
    let mut name = String::new();
    let mut variants = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_variant => {
                let mut it = inner.into_inner();
                let var_name = it.next().ok_or("enum variant: name")?.as_str().to_string();
                let value = parse_num(it.next().ok_or("enum variant: value")?.as_str())?;
                if variants.iter().any(|v: &EnumVariant| v.name == var_name) {
                    return Err(format!("enum {}: duplicate variant {}", name, var_name));
                }
                variants.push(EnumVariant { name: var_name, value });
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum section: missing name".to_string());
    }
    Ok(EnumDef { name, variants })
}

fn build_bus(pair: pest::iterators::Pair<Rule>) -> Result<Bus, String> {
    let mut name = String::new();
    let mut is_extended = false;
    let mut messages = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::id_width => is_extended = inner.as_str() == "extended",
            Rule::message_section => messages.push(build_message(inner)?),
            _ => {}
        }
    }
    Ok(Bus {
        name,
        is_extended,
        messages,
    })
}

fn build_message(pair: pest::iterators::Pair<Rule>) -> Result<Message, String> {
    let mut name = String::new();
    let mut identifier = None;
    let mut byte_order = ByteOrder::Big;
    let mut segments = Vec::new();
    // Segments without an explicit position start where the previous one ended.
    let mut cursor: u32 = 0;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::num => {
                let id = parse_num(inner.as_str())?;
                identifier = Some(
                    u32::try_from(id).map_err(|_| format!("message {}: identifier {:#x} too large", name, id))?,
                );
            }
            Rule::byte_order => {
                byte_order = match inner.as_str() {
                    "little" => ByteOrder::Little,
                    _ => ByteOrder::Big,
                }
            }
            Rule::segment_field => {
                let seg = build_segment(inner, cursor)
                    .map_err(|e| format!("message {}: {}", name, e))?;
                cursor = seg.position.saturating_add(seg.length);
                segments.push(seg);
            }
            _ => {}
        }
    }
    Ok(Message {
        identifier: identifier.ok_or_else(|| format!("message {}: missing identifier", name))?,
        name,
        byte_order,
        segments,
    })
}

fn build_segment(pair: pest::iterators::Pair<Rule>, cursor: u32) -> Result<Segment, String> {
    let mut name = String::new();
    let mut typed = None;
    let mut position = None;
    let mut length = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::segment_type => typed = Some(build_segment_type(inner)?),
            Rule::placement => {
                let mut nums = inner.into_inner();
                let pos = nums.next().ok_or("placement: position")?;
                position = Some(parse_u32(pos.as_str())?);
                if let Some(len) = nums.next() {
                    length = Some(parse_u32(len.as_str())?);
                }
            }
            _ => {}
        }
    }
    let (kind, type_width) = typed.ok_or("Missing type in segment")?;
    let length = length.unwrap_or(type_width);
    if kind.is_integer() && length > type_width {
        return Err(format!(
            "segment {}: length {} exceeds its {}-bit type",
            name, length, type_width
        ));
    }
    let declared_bits = kind.is_integer().then_some(type_width);
    Ok(Segment {
        name,
        position: position.unwrap_or(cursor),
        length,
        kind,
        declared_bits,
    })
}

/// Segment kind plus the default length of its declared type.
fn build_segment_type(pair: pest::iterators::Pair<Rule>) -> Result<(SegmentKind, u32), String> {
    let inner = pair.into_inner().next().ok_or("Empty segment_type")?;
    match inner.as_rule() {
        Rule::base_type => parse_base_type(inner.as_str()),
        Rule::ident => Ok((SegmentKind::Enum(inner.as_str().to_string()), 8)),
        _ => Err(format!("Unhandled type rule: {:?}", inner.as_rule())),
    }
}

fn build_board(pair: pest::iterators::Pair<Rule>) -> Result<Board, String> {
    let mut name = String::new();
    let mut arch = None;
    let mut subscribe = Vec::new();
    let mut publish = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::arch_spec => {
                let id = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .ok_or("arch: missing name")?;
                arch = Some(id.as_str().to_string());
            }
            Rule::board_usage => {
                let mut it = inner.into_inner();
                let kind = it.next().ok_or("board usage: kind")?.as_str().to_string();
                let bus = it.next().ok_or("board usage: bus")?.as_str().to_string();
                let messages = it.map(|p| p.as_str().to_string()).collect();
                let target = if kind == "subscribe" { &mut subscribe } else { &mut publish };
                if target.iter().any(|u: &BusMessages| u.bus == bus) {
                    return Err(format!("board {}: bus {} listed twice under {}", name, bus, kind));
                }
                target.push(BusMessages { bus, messages });
            }
            _ => {}
        }
    }
    Ok(Board {
        name,
        arch,
        subscribe,
        publish,
    })
}

fn parse_base_type(s: &str) -> Result<(SegmentKind, u32), String> {
    match s {
        "u8" => Ok((SegmentKind::Unsigned, 8)),
        "u16" => Ok((SegmentKind::Unsigned, 16)),
        "u32" => Ok((SegmentKind::Unsigned, 32)),
        "u64" => Ok((SegmentKind::Unsigned, 64)),
        "i8" => Ok((SegmentKind::Signed, 8)),
        "i16" => Ok((SegmentKind::Signed, 16)),
        "i32" => Ok((SegmentKind::Signed, 32)),
        "i64" => Ok((SegmentKind::Signed, 64)),
        "bool" => Ok((SegmentKind::Bool, 1)),
        _ => Err(format!("Unknown base type: {}", s)),
    }
}

fn parse_num(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex number {}: {}", s, e));
    }
    s.parse::<u64>().map_err(|e| format!("Invalid number {}: {}", s, e))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let n = parse_num(s)?;
    u32::try_from(n).map_err(|_| format!("Number out of range: {}", s))
}
