//! Integration tests: parse description, generate codecs and filters, pack/unpack, demux, emit C.

use canlib_gen::emit::{header, source, write_library};
use canlib_gen::generate::BoardFilter;
use canlib_gen::value::EnumValue;
use canlib_gen::{
    generate, parse, AcceptanceFilter, Demux, Frame, FrameDecodeResult, GeneratedLibrary,
    GeneratorConfig, ResolvedNetwork, Value,
};
use std::collections::HashMap;

const VEHICLE: &str = r#"
enum DriveMode { Off = 0, Drive = 1, Reverse = 2 }

bus map standard {
	message VcuCommand = 0x100 big {
		torque: i16;
		enable: bool;
		mode: DriveMode @ 17 : 7;
	}
	message BmsStatus = 0x200 little {
		pack_voltage: u16;
		current: i16;
		soc: u8;
	}
	message WheelSpeed = 0x300 little {
		front: u16 @ 0 : 12;
		rear: u16 @ 12 : 12;
	}
}

bus sensor extended {
	message Imu = 0x12345 little {
		accel_x: i32;
		accel_y: i32;
	}
}

board vcu arch stm32f4 {
	subscribe map { VcuCommand, BmsStatus }
	publish sensor { Imu }
}

board dash arch stm32h7 {
	subscribe map { WheelSpeed }
	subscribe sensor { Imu }
}

board logger {
	subscribe map { VcuCommand }
}
"#;

fn library() -> GeneratedLibrary {
    let network = parse(VEHICLE).expect("parse");
    let resolved = ResolvedNetwork::resolve(network).expect("resolve");
    generate(resolved).expect("generate")
}

fn values(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn filter<'a>(lib: &'a GeneratedLibrary, board: &str, bus: &str) -> Option<&'a BoardFilter> {
    lib.filters_for(board).find(|f| f.bus == bus)
}

#[test]
fn test_payload_lengths() {
    let lib = library();
    let len = |m: &str| lib.codec(m).expect(m).payload_byte_length;
    assert_eq!(len("VcuCommand"), 3);
    assert_eq!(len("BmsStatus"), 5);
    assert_eq!(len("WheelSpeed"), 3);
    assert_eq!(len("Imu"), 8);
}

#[test]
fn test_big_endian_pack_layout() {
    let lib = library();
    let codec = lib.codec("VcuCommand").expect("codec");
    let v = values(&[
        ("torque", Value::Signed(-2)),
        ("enable", Value::Bool(true)),
        ("mode", Value::Enum(EnumValue(2))),
    ]);
    let bytes = codec.pack(&v).expect("pack");
    // torque 0xFFFE, enable bit, then 7-bit mode = 2.
    assert_eq!(bytes, vec![0xFF, 0xFE, 0b1000_0010]);
    assert_eq!(codec.unpack(&bytes).expect("unpack"), v);
}

#[test]
fn test_little_endian_pack_layout() {
    let lib = library();
    let codec = lib.codec("BmsStatus").expect("codec");
    let v = values(&[
        ("pack_voltage", Value::Unsigned(0x1234)),
        ("current", Value::Signed(-300)),
        ("soc", Value::Unsigned(87)),
    ]);
    let bytes = codec.pack(&v).expect("pack");
    // -300 = 0xFED4, written low byte first.
    assert_eq!(bytes, vec![0x34, 0x12, 0xD4, 0xFE, 87]);
    assert_eq!(codec.unpack(&bytes).expect("unpack"), v);
}

#[test]
fn test_little_endian_partial_bytes_round_trip() {
    let lib = library();
    let codec = lib.codec("WheelSpeed").expect("codec");
    let v = values(&[("front", Value::Unsigned(0xABC)), ("rear", Value::Unsigned(0x123))]);
    let bytes = codec.pack(&v).expect("pack");
    assert_eq!(bytes, vec![0xBC, 0xA2, 0x31]);
    assert_eq!(codec.unpack(&bytes).expect("unpack"), v);
}

#[test]
fn test_board_filters() {
    let lib = library();
    // max id 0x200 -> 10 bits -> mask 0x400
    assert_eq!(
        filter(&lib, "vcu", "map").map(|f| f.filter),
        Some(AcceptanceFilter { mask: 0x400, reference: 0 })
    );
    // publish-only bus: no filtering
    let publish = filter(&lib, "vcu", "sensor").expect("vcu sensor init");
    assert!(!publish.subscribed);
    assert!(publish.filter.is_accept_all());
    // max id 0x300 -> 10 bits
    assert_eq!(filter(&lib, "dash", "map").map(|f| f.filter.mask), Some(0x400));
    // 0x12345 -> 17 bits on a 29-bit bus
    assert_eq!(filter(&lib, "dash", "sensor").map(|f| f.filter.mask), Some(0x1FFE_0000));
    // boards without an arch are not programmed
    assert_eq!(lib.filters_for("logger").count(), 0);
}

#[test]
fn test_demux_decode_and_unknown() {
    let lib = library();
    let demux = Demux::new(&lib);
    let v = values(&[
        ("pack_voltage", Value::Unsigned(400)),
        ("current", Value::Signed(12)),
        ("soc", Value::Unsigned(50)),
    ]);
    let frame = demux.encode("BmsStatus", &v).expect("known").expect("pack");
    assert_eq!(frame.id, 0x200);
    match demux.decode("map", &frame).expect("decode") {
        FrameDecodeResult::Decoded { message, values } => {
            assert_eq!(message, "BmsStatus");
            assert_eq!(values, v);
        }
        other => panic!("expected decoded frame, got {:?}", other),
    }
    // Same identifier on another bus is not a BmsStatus.
    assert!(matches!(
        demux.decode("sensor", &frame).expect("decode"),
        FrameDecodeResult::Unknown { identifier: 0x200 }
    ));
    // A short payload is an error, not a silent zero fill.
    let short = Frame { id: 0x200, data: vec![1, 2] };
    assert!(demux.decode("map", &short).is_err());
    assert!(demux.encode("Nope", &v).is_none());
}

#[test]
fn test_emitted_header() {
    let lib = library();
    let h = header(&lib, &GeneratorConfig::default()).expect("header");
    assert!(h.contains("#ifndef _CAN_LIBRARY_H"));
    assert!(h.contains("DriveMode_Reverse = 2,"));
    assert!(h.contains("#define VCUCOMMAND__id 0x100"));
    assert!(h.contains("#define BMSSTATUS__len 5"));
    assert!(h.contains("  int16_t torque;"));
    assert!(h.contains("  DriveMode_T mode;"));
    assert!(h.contains("  uint16_t front;"));
    assert!(h.contains("} Can_Imu_T;"));
    assert!(h.contains("Can_MsgID_T Can_Map_MsgType(uint32_t id);"));
    assert!(h.contains("void Map_Vcu_Init(uint32_t baudrate);"));
    assert!(h.contains("void Sensor_Vcu_Init(uint32_t baudrate);"));
}

#[test]
fn test_emitted_source() {
    let lib = library();
    let c = source(&lib, &GeneratorConfig::default()).expect("source");
    assert!(c.contains("#include \"Can_Library.h\""));
    assert!(c.contains("  bitstring = INSERT(type_in->torque, bitstring, 0, 16);"));
    assert!(c.contains("  uint64_t current_swap_value = swap_uint16((uint16_t)(type_in->current));"));
    assert!(c.contains("  uint64_t front_swap_value = swap_bytes((uint64_t)(type_in->front), 12);"));
    assert!(c.contains("  front_raw = unswap_bytes(front_raw, 12);"));
    assert!(c.contains("  type_out->torque = (int16_t)SIGN(torque_raw, 16);"));
    assert!(c.contains("  type_out->enable = enable_raw != 0;"));
    assert!(c.contains("  type_out->mode = (DriveMode_T)mode_raw;"));
    assert!(c.contains("  can_out->len = VCUCOMMAND__len;"));
    assert!(c.contains("    case BMSSTATUS__id:\n      return Can_BmsStatus_Msg;"));
    // filtered init vs publish-only init
    assert!(c.contains("void Map_Vcu_Init(uint32_t baudrate) {\n  Can_Init(baudrate);\n  Can_SetFilter(0b10000000000, 0);\n}"));
    assert!(c.contains("void Sensor_Vcu_Init(uint32_t baudrate) {\n  Can_Init(baudrate);\n}"));
}

#[test]
fn test_emit_without_demux_and_custom_prefix() {
    let lib = library();
    let cfg = GeneratorConfig {
        symbol_prefix: "CANlib".to_string(),
        emit_demux: false,
        ..GeneratorConfig::default()
    };
    let c = source(&lib, &cfg).expect("source");
    assert!(!c.contains("_MsgType"));
    assert!(c.contains("void CANlib_BmsStatus_Pack(const CANlib_BmsStatus_T *type_in, Frame *can_out) {"));
    assert!(c.contains("  CANlib_SetFilter("));
}

#[test]
fn test_write_library_to_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = GeneratorConfig {
        output_dir: dir.path().join("gen"),
        file_stem: "canlib".to_string(),
        ..GeneratorConfig::default()
    };
    let lib = library();
    let (h, c) = write_library(&lib, &cfg).expect("write");
    assert_eq!(h, dir.path().join("gen").join("canlib.h"));
    let c_text = std::fs::read_to_string(&c).expect("read source");
    assert!(c_text.starts_with("#include \"canlib.h\""));
    let h_text = std::fs::read_to_string(&h).expect("read header");
    assert!(h_text.contains("#ifndef _CANLIB_H"));
}

#[test]
fn test_config_file_loading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("canlib.toml");
    std::fs::write(&path, "file_stem = \"bus_lib\"\nemit_demux = false\n").expect("write");
    let cfg = GeneratorConfig::load_from_file(&path).expect("load");
    assert_eq!(cfg.file_stem, "bus_lib");
    assert!(!cfg.emit_demux);
    assert_eq!(cfg.symbol_prefix, "Can");
    assert!(GeneratorConfig::load_from_file(dir.path().join("missing.toml")).is_err());
}

#[test]
fn test_subscription_to_identifier_zero_fails_generation() {
    let src = r#"
bus map standard { message Zero = 0 big { x: u8; } }
board b arch x { subscribe map { Zero } }
"#;
    let resolved = ResolvedNetwork::resolve(parse(src).expect("parse")).expect("resolve");
    let err = generate(resolved).unwrap_err();
    assert!(err.to_string().contains("board b"), "{}", err);
}

#[test]
fn test_struct_field_uses_declared_type() {
    let src = "bus map standard { message Narrow = 0x10 little { a: u32 @ 0 : 12; b: u8 @ 12 : 4; } }";
    let resolved = ResolvedNetwork::resolve(parse(src).expect("parse")).expect("resolve");
    let lib = generate(resolved).expect("generate");
    let cfg = GeneratorConfig::default();
    let h = header(&lib, &cfg).expect("header");
    assert!(h.contains("  uint32_t a;"), "{}", h);
    assert!(h.contains("  uint8_t b;"), "{}", h);
    let c = source(&lib, &cfg).expect("source");
    // The swap still works over the 12 packed bits.
    assert!(c.contains("  uint64_t a_swap_value = swap_bytes((uint64_t)(type_in->a), 12);"));
    assert!(c.contains("  type_out->a = (uint32_t)a_raw;"));
}

#[test]
fn test_only_referenced_helpers_are_emitted() {
    let c = source(&library(), &GeneratorConfig::default()).expect("source");
    assert!(c.contains("static uint16_t swap_uint16("));
    assert!(c.contains("static uint32_t swap_uint32("));
    assert!(c.contains("static uint64_t swap_bytes("));
    assert!(c.contains("static uint64_t unswap_bytes("));
    assert!(!c.contains("swap_uint64"));

    let src = "bus map standard { message Plain = 0x10 big { a: u16; b: i32; } }";
    let resolved = ResolvedNetwork::resolve(parse(src).expect("parse")).expect("resolve");
    let c = source(&generate(resolved).expect("generate"), &GeneratorConfig::default()).expect("source");
    assert!(c.contains("static uint64_t to_bitstring("));
    assert!(!c.contains("swap_"));

    let empty = generate(ResolvedNetwork::resolve(parse("").expect("parse")).expect("resolve")).expect("generate");
    let c = source(&empty, &GeneratorConfig::default()).expect("source");
    assert!(c.contains("#define INSERT("));
    assert!(!c.contains("to_bitstring"));
}
