//! Render a [`GeneratedLibrary`] as a C header/source pair.
//!
//! The emitter only formats: every bit position, swap and sign extension
//! comes from the [`CodecDescription`] steps and every mask from the
//! generated [`BoardFilter`]s.

use crate::ast::{ByteWidth, SegmentKind};
use crate::codec::{CodecDescription, PackStep, SegmentPlan, UnpackStep};
use crate::config::GeneratorConfig;
use crate::generate::{BoardFilter, GeneratedLibrary};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("Formatting: {0}")]
    Fmt(#[from] std::fmt::Error),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const BIT_MACROS: &str = r#"#define ONES(len) ((len) >= 64 ? UINT64_MAX : ((1ULL << (len)) - 1))
#define START_IDX(start, len) (64 - (start) - (len))
#define INSERT(input, output, start, len) \
  (((output) & ~(ONES(len) << START_IDX(start, len))) | (((uint64_t)(input) & ONES(len)) << START_IDX(start, len)))
#define EXTRACT(input, start, len) (((input) >> START_IDX(start, len)) & ONES(len))
#define SIGN(input, len) \
  ((len) >= 64 ? (int64_t)(input) : ((int64_t)((uint64_t)(input) << (64 - (len))) >> (64 - (len))))
"#;

const BITSTRING_HELPERS: &str = r#"
static uint64_t to_bitstring(const uint8_t *in) {
  uint64_t out = 0;
  for (int i = 0; i < 8; i++) {
    out = (out << 8) | in[i];
  }
  return out;
}

static void from_bitstring(uint64_t in, uint8_t *out) {
  for (int i = 7; i >= 0; i--) {
    out[i] = (uint8_t)(in & 0xFF);
    in >>= 8;
  }
}
"#;

const SWAP_UINT16: &str = r#"
static uint16_t swap_uint16(uint16_t v) { return (uint16_t)((v << 8) | (v >> 8)); }
"#;

const SWAP_UINT32: &str = r#"
static uint32_t swap_uint32(uint32_t v) {
  return ((v & 0xFFu) << 24) | ((v & 0xFF00u) << 8) | ((v >> 8) & 0xFF00u) | (v >> 24);
}
"#;

const SWAP_UINT64: &str = r#"
static uint64_t swap_uint64(uint64_t v) {
  uint32_t lo = (uint32_t)v, hi = (uint32_t)(v >> 32);
  lo = ((lo & 0xFFu) << 24) | ((lo & 0xFF00u) << 8) | ((lo >> 8) & 0xFF00u) | (lo >> 24);
  hi = ((hi & 0xFFu) << 24) | ((hi & 0xFF00u) << 8) | ((hi >> 8) & 0xFF00u) | (hi >> 24);
  return ((uint64_t)lo << 32) | hi;
}
"#;

// Little-endian byte groups of a field that is not a whole number of bytes.
const PARTIAL_SWAPS: &str = r#"
static uint64_t swap_bytes(uint64_t value, unsigned bits) {
  uint64_t out = 0;
  unsigned consumed = 0;
  value &= ONES(bits);
  for (unsigned i = 0; consumed < bits; i++) {
    unsigned width = bits - i * 8 < 8 ? bits - i * 8 : 8;
    consumed += width;
    out |= ((value >> (i * 8)) & ONES(width)) << (bits - consumed);
  }
  return out;
}

static uint64_t unswap_bytes(uint64_t pattern, unsigned bits) {
  uint64_t out = 0;
  unsigned consumed = 0;
  pattern &= ONES(bits);
  for (unsigned i = 0; consumed < bits; i++) {
    unsigned width = bits - i * 8 < 8 ? bits - i * 8 : 8;
    consumed += width;
    out |= ((pattern >> (bits - consumed)) & ONES(width)) << (i * 8);
  }
  return out;
}
"#;

/// Static C helpers referenced by at least one codec of the library.
#[derive(Debug, Default, PartialEq, Eq)]
struct HelperSet {
    bitstring: bool,
    swap16: bool,
    swap32: bool,
    swap64: bool,
    partial: bool,
}

impl HelperSet {
    fn for_library(library: &GeneratedLibrary) -> Self {
        let mut set = HelperSet::default();
        for codec in library.buses.iter().flat_map(|b| b.codecs.iter()) {
            set.bitstring = true;
            for (width, bits) in codec.segments.iter().filter_map(SegmentPlan::byte_swap) {
                match width {
                    _ if bits != width.bits() => set.partial = true,
                    ByteWidth::Two => set.swap16 = true,
                    ByteWidth::Four => set.swap32 = true,
                    ByteWidth::Eight => set.swap64 = true,
                    ByteWidth::One => {}
                }
            }
        }
        set
    }

    fn write(&self, out: &mut String) {
        out.push_str(BIT_MACROS);
        for (used, text) in [
            (self.bitstring, BITSTRING_HELPERS),
            (self.swap16, SWAP_UINT16),
            (self.swap32, SWAP_UINT32),
            (self.swap64, SWAP_UINT64),
            (self.partial, PARTIAL_SWAPS),
        ] {
            if used {
                out.push_str(text);
            }
        }
    }
}

/// Python-style title case: `vcu_main` -> `Vcu_Main`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut start = true;
    for c in s.chars() {
        if c.is_ascii_alphabetic() {
            if start {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
            start = false;
        } else {
            out.push(c);
            start = true;
        }
    }
    out
}

fn id_macro(message: &str) -> String {
    format!("{}__id", message.to_ascii_uppercase())
}

fn len_macro(message: &str) -> String {
    format!("{}__len", message.to_ascii_uppercase())
}

fn c_type(plan: &SegmentPlan) -> String {
    match &plan.kind {
        SegmentKind::Bool => "bool".to_string(),
        SegmentKind::Enum(name) => format!("{}_T", name),
        SegmentKind::Unsigned => format!("uint{}_t", plan.carrier.bits()),
        SegmentKind::Signed => format!("int{}_t", plan.carrier.bits()),
    }
}

fn swap_call(width: ByteWidth, bits: u32, arg: &str, pack: bool) -> String {
    if bits == width.bits() {
        let n = width.bits();
        format!("swap_uint{n}((uint{n}_t)({arg}))")
    } else if pack {
        format!("swap_bytes((uint64_t)({arg}), {bits})")
    } else {
        format!("unswap_bytes({arg}, {bits})")
    }
}

fn init_name(filter: &BoardFilter) -> String {
    format!("{}_{}_Init", title_case(&filter.bus), title_case(&filter.board))
}

/// Emit the header: frame type, enums, message ids/structs and prototypes.
pub fn header(library: &GeneratedLibrary, config: &GeneratorConfig) -> Result<String, EmitError> {
    let prefix = &config.symbol_prefix;
    let guard = format!("_{}_H", config.file_stem.to_ascii_uppercase());
    let mut out = String::new();
    writeln!(out, "#ifndef {guard}")?;
    writeln!(out, "#define {guard}\n")?;
    writeln!(out, "#include <stdbool.h>")?;
    writeln!(out, "#include <stdint.h>\n")?;
    writeln!(out, "typedef struct {{\n  uint32_t id;\n  uint8_t len;\n  uint8_t data[8];\n}} Frame;\n")?;
    writeln!(out, "void {prefix}_Init(uint32_t baudrate);")?;
    writeln!(out, "void {prefix}_SetFilter(uint32_t mask, uint32_t id);\n")?;

    for e in &library.network.network.enums {
        writeln!(out, "typedef enum {{")?;
        for v in &e.variants {
            writeln!(out, "  {}_{} = {},", e.name, v.name, v.value)?;
        }
        writeln!(out, "}} {}_T;\n", e.name)?;
    }

    for bus in &library.buses {
        for codec in &bus.codecs {
            writeln!(out, "#define {} {:#x}", id_macro(&codec.message), codec.identifier)?;
            writeln!(out, "#define {} {}", len_macro(&codec.message), codec.payload_byte_length)?;
            writeln!(out, "typedef struct {{")?;
            for plan in &codec.segments {
                writeln!(out, "  {} {};", c_type(plan), plan.segment)?;
            }
            writeln!(out, "}} {prefix}_{}_T;", codec.message)?;
            writeln!(
                out,
                "void {prefix}_{m}_Pack(const {prefix}_{m}_T *type_in, Frame *can_out);",
                m = codec.message
            )?;
            writeln!(
                out,
                "void {prefix}_{m}_Unpack(const Frame *can_in, {prefix}_{m}_T *type_out);\n",
                m = codec.message
            )?;
        }
    }

    if config.emit_demux {
        writeln!(out, "typedef enum {{")?;
        writeln!(out, "  {prefix}_Unknown_Msg,")?;
        for bus in &library.buses {
            for codec in &bus.codecs {
                writeln!(out, "  {prefix}_{}_Msg,", codec.message)?;
            }
        }
        writeln!(out, "}} {prefix}_MsgID_T;\n")?;
        for bus in &library.buses {
            writeln!(out, "{prefix}_MsgID_T {prefix}_{}_MsgType(uint32_t id);", title_case(&bus.bus))?;
        }
        writeln!(out)?;
    }

    for f in &library.filters {
        writeln!(out, "void {}(uint32_t baudrate);", init_name(f))?;
    }
    writeln!(out, "\n#endif // {guard}")?;
    Ok(out)
}

/// Emit the source: bit helpers, pack/unpack functions, demux and init functions.
pub fn source(library: &GeneratedLibrary, config: &GeneratorConfig) -> Result<String, EmitError> {
    let prefix = &config.symbol_prefix;
    let mut out = String::new();
    writeln!(out, "#include \"{}.h\"\n", config.file_stem)?;
    HelperSet::for_library(library).write(&mut out);
    writeln!(out)?;

    for bus in &library.buses {
        for codec in &bus.codecs {
            emit_pack(&mut out, codec, prefix)?;
            emit_unpack(&mut out, codec, prefix)?;
        }
    }

    if config.emit_demux {
        for bus in &library.buses {
            writeln!(out, "{prefix}_MsgID_T {prefix}_{}_MsgType(uint32_t id) {{", title_case(&bus.bus))?;
            writeln!(out, "  switch (id) {{")?;
            for codec in &bus.codecs {
                writeln!(out, "    case {}:", id_macro(&codec.message))?;
                writeln!(out, "      return {prefix}_{}_Msg;", codec.message)?;
            }
            writeln!(out, "    default:\n      return {prefix}_Unknown_Msg;")?;
            writeln!(out, "  }}\n}}\n")?;
        }
    }

    for f in &library.filters {
        writeln!(out, "void {}(uint32_t baudrate) {{", init_name(f))?;
        writeln!(out, "  {prefix}_Init(baudrate);")?;
        if f.subscribed {
            writeln!(out, "  {prefix}_SetFilter({:#b}, {});", f.filter.mask, f.filter.reference)?;
        }
        writeln!(out, "}}\n")?;
    }
    Ok(out)
}

fn emit_pack(out: &mut String, codec: &CodecDescription, prefix: &str) -> Result<(), EmitError> {
    writeln!(
        out,
        "void {prefix}_{m}_Pack(const {prefix}_{m}_T *type_in, Frame *can_out) {{",
        m = codec.message
    )?;
    writeln!(out, "  uint64_t bitstring = 0;")?;
    for plan in &codec.segments {
        let mut value = format!("type_in->{}", plan.segment);
        for step in &plan.pack {
            match *step {
                PackStep::ByteSwap { width, bits } => {
                    let swapped = format!("{}_swap_value", plan.segment);
                    writeln!(out, "  uint64_t {swapped} = {};", swap_call(width, bits, &value, true))?;
                    value = swapped;
                }
                PackStep::Insert { position, length } => {
                    writeln!(out, "  bitstring = INSERT({value}, bitstring, {position}, {length});")?;
                }
            }
        }
    }
    writeln!(out, "  from_bitstring(bitstring, can_out->data);")?;
    writeln!(out, "  can_out->id = {};", id_macro(&codec.message))?;
    writeln!(out, "  can_out->len = {};", len_macro(&codec.message))?;
    writeln!(out, "}}\n")?;
    Ok(())
}

fn emit_unpack(out: &mut String, codec: &CodecDescription, prefix: &str) -> Result<(), EmitError> {
    writeln!(
        out,
        "void {prefix}_{m}_Unpack(const Frame *can_in, {prefix}_{m}_T *type_out) {{",
        m = codec.message
    )?;
    writeln!(out, "  uint64_t bitstring = to_bitstring(can_in->data);")?;
    for plan in &codec.segments {
        let raw = format!("{}_raw", plan.segment);
        let ty = c_type(plan);
        let mut assigned = false;
        for step in &plan.unpack {
            match step {
                UnpackStep::Extract { position, length } => {
                    writeln!(out, "  uint64_t {raw} = EXTRACT(bitstring, {position}, {length});")?;
                }
                UnpackStep::ByteSwap { width, bits } => {
                    writeln!(out, "  {raw} = {};", swap_call(*width, *bits, &raw, false))?;
                }
                UnpackStep::SignExtend { bits } => {
                    writeln!(out, "  type_out->{} = ({ty})SIGN({raw}, {bits});", plan.segment)?;
                    assigned = true;
                }
                UnpackStep::ToBool => {
                    writeln!(out, "  type_out->{} = {raw} != 0;", plan.segment)?;
                    assigned = true;
                }
                UnpackStep::NarrowEnum { .. } => {
                    writeln!(out, "  type_out->{} = ({ty}){raw};", plan.segment)?;
                    assigned = true;
                }
            }
        }
        if !assigned {
            writeln!(out, "  type_out->{} = ({ty}){raw};", plan.segment)?;
        }
    }
    writeln!(out, "}}\n")?;
    Ok(())
}

/// Write `<stem>.h` and `<stem>.c` into the configured output directory.
pub fn write_library(
    library: &GeneratedLibrary,
    config: &GeneratorConfig,
) -> Result<(PathBuf, PathBuf), EmitError> {
    let h = header(library, config)?;
    let c = source(library, config)?;
    std::fs::create_dir_all(&config.output_dir).map_err(|source| EmitError::Io {
        path: config.output_dir.clone(),
        source,
    })?;
    let header_path = config.header_path();
    let source_path = config.source_path();
    for (path, text) in [(&header_path, &h), (&source_path, &c)] {
        std::fs::write(path, text).map_err(|source| EmitError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = text.len(), "wrote");
    }
    Ok((header_path, source_path))
}
