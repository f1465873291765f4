//! Format unpacked values for display. Enum values are narrowed to variant names when known.

use crate::ast::ResolvedNetwork;
use crate::codec::CodecDescription;
use crate::value::{EnumMember, MessageValues, Value};

/// Format one value; `enum_name` is the segment's enum, if any.
pub fn format_value(v: &Value, network: &ResolvedNetwork, enum_name: Option<&str>) -> String {
    match v {
        Value::Unsigned(x) => format!("{}", x),
        Value::Signed(x) => format!("{}", x),
        Value::Bool(b) => format!("{}", b),
        Value::Enum(e) => match enum_name.and_then(|n| network.get_enum(n)) {
            Some(def) => match e.narrow(def) {
                EnumMember::Known(variant) => format!("{} ({})", variant.name, e.raw()),
                EnumMember::Unknown(raw) => format!("<unknown {}> ({})", def.name, raw),
            },
            None => format!("{}", e.raw()),
        },
    }
}

/// Format all values of a message in segment order, one `name = value` line each.
pub fn format_values(codec: &CodecDescription, values: &MessageValues, network: &ResolvedNetwork) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} (id {:#x})\n", codec.message, codec.identifier));
    for plan in &codec.segments {
        let Some(v) = values.get(&plan.segment) else {
            continue;
        };
        let enum_name = match &plan.kind {
            crate::ast::SegmentKind::Enum(n) => Some(n.as_str()),
            _ => None,
        };
        out.push_str(&format!(
            "  {} = {}\n",
            plan.segment,
            format_value(v, network, enum_name)
        ));
    }
    out
}
