//! Integration tests for the env import module, driven by WAT guests

use std::sync::{Arc, Mutex};

use slotlink::abi::{surface_fingerprint, Buff, ErrorCode, RefId, TypeTag};
use slotlink::world::MemberValue;
use slotlink::{Instance, Runtime, RuntimeConfig, RuntimeError, World};

/// Bump allocator plus a counter of frees.
const ALLOCATOR: &str = r#"
    (global $bump (mut i32) (i32.const 4096))
    (global $freed (mut i32) (i32.const 0))
    (func (export "slotlink_alloc") (param $size i32) (result i32)
        (local $p i32)
        (local.set $p (global.get $bump))
        (global.set $bump
            (i32.add (global.get $bump)
                (i32.and (i32.add (local.get $size) (i32.const 7)) (i32.const -8))))
        (local.get $p))
    (func (export "slotlink_free") (param i32 i32)
        (global.set $freed (i32.add (global.get $freed) (i32.const 1))))
    (func (export "bump") (result i32) (global.get $bump))
    (func (export "freed") (result i32) (global.get $freed))
"#;

fn guest(imports: &str, body: &str) -> Vec<u8> {
    let wat = format!(
        "(module {} (memory (export \"memory\") 1) {} {})",
        imports, ALLOCATOR, body
    );
    wat::parse_str(wat).expect("parse WAT")
}

fn instantiate(wasm: &[u8], world: World) -> Instance<World> {
    let runtime = Runtime::new();
    let module = runtime.load_module(wasm).expect("load module");
    module.instantiate(world).expect("instantiate")
}

fn read_u32(instance: &mut Instance<World>, at: usize) -> u32 {
    let bytes = instance.read_memory(at, 4).expect("read");
    u32::from_le_bytes(bytes.try_into().unwrap())
}

fn read_u64(instance: &mut Instance<World>, at: usize) -> u64 {
    let bytes = instance.read_memory(at, 8).expect("read");
    u64::from_le_bytes(bytes.try_into().unwrap())
}

fn read_c_str(instance: &mut Instance<World>, at: usize) -> String {
    let bytes = instance.read_memory(at, 256).expect("read");
    let end = bytes.iter().position(|b| *b == 0).expect("NUL terminator");
    String::from_utf8(bytes[..end].to_vec()).expect("utf-8")
}

const SLOT_IMPORTS: &str = r#"
    (import "env" "slot__root_slot" (func $root_slot (param i32) (result i32)))
    (import "env" "slot__get_parent" (func $get_parent (param i64 i32) (result i32)))
    (import "env" "slot__get_name" (func $get_name (param i64 i32) (result i32)))
    (import "env" "slot__set_name" (func $set_name (param i64 i32) (result i32)))
    (import "env" "slot__get_children" (func $get_children (param i64 i32) (result i32)))
"#;

const SLOT_BODY: &str = r#"
    (data (i32.const 256) "Renamed\00")
    (data (i32.const 512) "\ff\fe\00")
    (data (i32.const 65532) "abcd")
    (func (export "root_slot") (param $out i32) (result i32)
        (call $root_slot (local.get $out)))
    (func (export "get_parent") (param $slot i64) (param $out i32) (result i32)
        (call $get_parent (local.get $slot) (local.get $out)))
    (func (export "get_name") (param $slot i64) (param $out i32) (result i32)
        (call $get_name (local.get $slot) (local.get $out)))
    (func (export "set_name") (param $slot i64) (param $name i32) (result i32)
        (call $set_name (local.get $slot) (local.get $name)))
    (func (export "get_children") (param $slot i64) (param $out i32) (result i32)
        (call $get_children (local.get $slot) (local.get $out)))
"#;

fn slot_guest() -> Vec<u8> {
    guest(SLOT_IMPORTS, SLOT_BODY)
}

#[test]
fn test_root_slot_writes_its_id() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));

    let code: i32 = instance.call_typed("root_slot", 16).expect("call");
    assert_eq!(code, ErrorCode::Success.as_raw());
    assert_eq!(RefId(read_u64(&mut instance, 16)), instance.handler().root());
}

#[test]
fn test_get_name_allocates_in_guest() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));
    let root = instance.handler().root().raw() as i64;

    let code: i32 = instance.call_typed("get_name", (root, 16)).expect("call");
    assert_eq!(code, 0);

    let ptr = read_u32(&mut instance, 16);
    assert!(ptr >= 4096, "string should come from the guest allocator");
    assert_eq!(read_c_str(&mut instance, ptr as usize), "Root");
}

#[test]
fn test_set_name_reads_guest_string() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));
    let root = instance.handler().root();

    let code: i32 = instance
        .call_typed("set_name", (root.raw() as i64, 256))
        .expect("call");
    assert_eq!(code, 0);
    assert_eq!(instance.handler().name(root), Ok("Renamed"));
}

#[test]
fn test_bad_strings_are_rejected() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));
    let root = instance.handler().root();
    let raw = root.raw() as i64;

    let null: i32 = instance.call_typed("set_name", (raw, 0)).expect("call");
    assert_eq!(null, ErrorCode::NullArgument.as_raw());

    let not_utf8: i32 = instance.call_typed("set_name", (raw, 512)).expect("call");
    assert_eq!(not_utf8, ErrorCode::InvalidArgument.as_raw());

    let unterminated: i32 = instance.call_typed("set_name", (raw, 65532)).expect("call");
    assert_eq!(unterminated, ErrorCode::InvalidArgument.as_raw());

    assert_eq!(instance.handler().name(root), Ok("Root"));
}

#[test]
fn test_null_and_out_of_bounds_out_pointers() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));

    let null: i32 = instance.call_typed("root_slot", 0).expect("call");
    assert_eq!(null, ErrorCode::NullArgument.as_raw());

    let past_end: i32 = instance.call_typed("root_slot", 65535).expect("call");
    assert_eq!(past_end, ErrorCode::InvalidArgument.as_raw());
}

#[test]
fn test_outputs_untouched_on_failure() {
    let mut world = World::new("Root");
    world.add_slot(world.root(), "Child").unwrap();
    let mut instance = instantiate(&slot_guest(), world);
    let root = instance.handler().root().raw() as i64;

    instance.write_memory(16, &[0xAA; 8]).expect("write");
    let code: i32 = instance.call_typed("get_parent", (root, 16)).expect("call");
    assert_eq!(code, ErrorCode::NotFound.as_raw());
    assert_eq!(instance.read_memory(16, 8).unwrap(), vec![0xAA; 8]);

    let code: i32 = instance.call_typed("get_parent", (0xdead_i64, 16)).expect("call");
    assert_eq!(code, ErrorCode::InvalidHandle.as_raw());
    assert_eq!(instance.read_memory(16, 8).unwrap(), vec![0xAA; 8]);
}

#[test]
fn test_children_list_is_a_guest_buffer() {
    let mut world = World::new("Root");
    let root = world.root();
    let a = world.add_slot(root, "A").unwrap();
    let b = world.add_slot(root, "B").unwrap();
    let c = world.add_slot(root, "C").unwrap();
    let mut instance = instantiate(&slot_guest(), world);

    let code: i32 = instance
        .call_typed("get_children", (root.raw() as i64, 32))
        .expect("call");
    assert_eq!(code, 0);

    let bytes: [u8; 8] = instance.read_memory(32, 8).unwrap().try_into().unwrap();
    let buff = Buff::from_le_bytes(bytes);
    assert_eq!(buff.len, 3);
    let ids: Vec<RefId> = (0..3)
        .map(|i| RefId(read_u64(&mut instance, buff.ptr as usize + i * 8)))
        .collect();
    assert_eq!(ids, [a, b, c]);
}

#[test]
fn test_empty_list_allocates_nothing() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));
    let root = instance.handler().root().raw() as i64;
    let before: i32 = instance.call_typed("bump", ()).unwrap();

    let code: i32 = instance.call_typed("get_children", (root, 32)).expect("call");
    assert_eq!(code, 0);

    let bytes: [u8; 8] = instance.read_memory(32, 8).unwrap().try_into().unwrap();
    assert_eq!(Buff::from_le_bytes(bytes), Buff::EMPTY);
    let after: i32 = instance.call_typed("bump", ()).unwrap();
    assert_eq!(before, after);
}

const CHILD_IMPORTS: &str = r#"
    (import "env" "slot__get_children" (func $get_children (param i64 i32) (result i32)))
    (import "env" "slot__get_num_children" (func $get_num_children (param i64 i32) (result i32)))
    (import "env" "slot__get_child" (func $get_child (param i64 i32 i32) (result i32)))
"#;

const CHILD_BODY: &str = r#"
    (func (export "get_children") (param $slot i64) (param $out i32) (result i32)
        (call $get_children (local.get $slot) (local.get $out)))
    (func (export "get_num_children") (param $slot i64) (param $out i32) (result i32)
        (call $get_num_children (local.get $slot) (local.get $out)))
    (func (export "get_child") (param $slot i64) (param $i i32) (param $out i32) (result i32)
        (call $get_child (local.get $slot) (local.get $i) (local.get $out)))
"#;

#[test]
fn test_children_buffer_agrees_with_count_and_index() {
    let mut world = World::new("Root");
    let root = world.root();
    for name in ["A", "B", "C", "D"] {
        world.add_slot(root, name).unwrap();
    }
    let mut instance = instantiate(&guest(CHILD_IMPORTS, CHILD_BODY), world);
    let raw = root.raw() as i64;

    let code: i32 = instance.call_typed("get_children", (raw, 32)).expect("call");
    assert_eq!(code, 0);
    let bytes: [u8; 8] = instance.read_memory(32, 8).unwrap().try_into().unwrap();
    let buff = Buff::from_le_bytes(bytes);

    let code: i32 = instance.call_typed("get_num_children", (raw, 48)).expect("call");
    assert_eq!(code, 0);
    assert_eq!(buff.len, 4);
    assert_eq!(read_u32(&mut instance, 48) as i32, buff.len);

    for i in 0..buff.len {
        let listed = read_u64(&mut instance, buff.ptr as usize + i as usize * 8);
        let code: i32 = instance
            .call_typed("get_child", (raw, i, 64))
            .expect("call");
        assert_eq!(code, 0);
        assert_eq!(read_u64(&mut instance, 64), listed, "child {}", i);
    }
}

const VALUE_IMPORTS: &str = r#"
    (import "env" "slot__get_component" (func $get_component (param i64 i32 i32) (result i32)))
    (import "env" "component__get_member" (func $get_member (param i64 i32 i32 i32) (result i32)))
    (import "env" "value__get_int" (func $get_int (param i64 i32) (result i32)))
    (import "env" "value__set_float" (func $set_float (param i64 f32) (result i32)))
"#;

const VALUE_BODY: &str = r#"
    (data (i32.const 256) "ValueField<int>\00")
    (data (i32.const 320) "Value\00")
    (func (export "get_component") (param $slot i64) (param $out i32) (result i32)
        (call $get_component (local.get $slot) (i32.const 256) (local.get $out)))
    (func (export "get_member") (param $comp i64) (param $tag i32) (param $out i32) (result i32)
        (call $get_member (local.get $comp) (i32.const 320) (local.get $tag) (local.get $out)))
    (func (export "get_int") (param $member i64) (param $out i32) (result i32)
        (call $get_int (local.get $member) (local.get $out)))
    (func (export "set_float") (param $member i64) (param $v f32) (result i32)
        (call $set_float (local.get $member) (local.get $v)))
"#;

#[test]
fn test_component_member_and_value_access() {
    let mut world = World::new("Root");
    let root = world.root();
    let field = world.attach_component(root, "ValueField<int>").unwrap();
    let member = world.add_member(field, "Value", MemberValue::Int(42)).unwrap();
    let mut instance = instantiate(&guest(VALUE_IMPORTS, VALUE_BODY), world);

    let code: i32 = instance
        .call_typed("get_component", (root.raw() as i64, 16))
        .expect("call");
    assert_eq!(code, 0);
    assert_eq!(RefId(read_u64(&mut instance, 16)), field);

    let code: i32 = instance
        .call_typed("get_member", (field.raw() as i64, 32, 40))
        .expect("call");
    assert_eq!(code, 0);
    assert_eq!(TypeTag::from_raw(read_u32(&mut instance, 32) as i32), TypeTag::Int);
    assert_eq!(RefId(read_u64(&mut instance, 40)), member);

    let code: i32 = instance
        .call_typed("get_int", (member.raw() as i64, 48))
        .expect("call");
    assert_eq!(code, 0);
    assert_eq!(read_u32(&mut instance, 48), 42);

    let code: i32 = instance
        .call_typed("set_float", (member.raw() as i64, 1.5f32))
        .expect("call");
    assert_eq!(code, ErrorCode::TypeMismatch.as_raw());
    assert_eq!(instance.handler().get_int(member), Ok(42));
}

#[test]
fn test_allocation_failure_is_reported() {
    let wat = format!(
        r#"(module
            {}
            (memory (export "memory") 1)
            (func (export "slotlink_alloc") (param i32) (result i32) (i32.const 0))
            {})"#,
        SLOT_IMPORTS, SLOT_BODY
    );
    let wasm = wat::parse_str(wat).expect("parse WAT");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let runtime = Runtime::with_config(
        RuntimeConfig::default().on_error(move |err| sink.lock().unwrap().push(err.to_string())),
    )
    .unwrap();
    let module = runtime.load_module(&wasm).unwrap();
    let mut instance = module.instantiate(World::new("Root")).unwrap();
    let root = instance.handler().root().raw() as i64;

    instance.write_memory(16, &[0xAA; 4]).unwrap();
    let code: i32 = instance.call_typed("get_name", (root, 16)).expect("call");
    assert_eq!(code, ErrorCode::HostFailure.as_raw());
    assert_eq!(instance.read_memory(16, 4).unwrap(), vec![0xAA; 4]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("slot__get_name"), "{}", seen[0]);
}

#[test]
fn test_surface_fingerprint_must_match() {
    let matching = format!(
        r#"(func (export "slotlink_surface") (result i64) (i64.const {}))"#,
        surface_fingerprint().short() as i64
    );
    let runtime = Runtime::new();
    let wasm = guest("", &matching);
    assert!(runtime.load_module(&wasm).unwrap().instantiate(World::default()).is_ok());

    let stale = r#"(func (export "slotlink_surface") (result i64) (i64.const 1))"#;
    let wasm = guest("", stale);
    let err = runtime
        .load_module(&wasm)
        .unwrap()
        .instantiate(World::default())
        .err()
        .expect("stale surface rejected");
    assert!(matches!(err, RuntimeError::SurfaceMismatch { guest: 1, .. }));
}

#[test]
fn test_wrong_import_signature_is_rejected() {
    let wasm = guest(
        r#"(import "env" "slot__get_parent" (func (param i32 i32) (result i32)))"#,
        "",
    );
    let runtime = Runtime::new();
    let err = runtime
        .load_module(&wasm)
        .unwrap()
        .instantiate(World::default())
        .err()
        .expect("rejected");
    assert!(matches!(err, RuntimeError::Interface(_)));
}

#[test]
fn test_call_from_slot() {
    let body = r#"
        (func (export "rename") (param $name i32) (param $slot i64) (param $n i32) (result i32)
            (drop (call $set_name (local.get $slot) (local.get $name)))
            (local.get $n))
    "#;
    let mut world = World::new("Root");
    let root = world.root();
    let target = world.add_slot(root, "Target").unwrap();
    let call = world.add_slot(root, "Call").unwrap();
    let f = world.attach_component(call, "ValueField<string>").unwrap();
    world.add_member(f, "Value", MemberValue::Str("rename".into())).unwrap();
    for value in [
        MemberValue::Str("Renamed".into()),
        MemberValue::Ref(target),
        MemberValue::Int(7),
    ] {
        let arg = world.add_slot(call, "Arg").unwrap();
        let field = world.attach_component(arg, "ValueField").unwrap();
        world.add_member(field, "Value", value).unwrap();
    }

    let mut instance = instantiate(&guest(SLOT_IMPORTS, body), world);
    let results = instance.call_from_slot(call).expect("call");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].i32(), Some(7));
    assert_eq!(instance.handler().name(target), Ok("Renamed"));

    let freed: i32 = instance.call_typed("freed", ()).unwrap();
    assert_eq!(freed, 1);
}

#[test]
fn test_call_from_slot_needs_a_function_name() {
    let mut instance = instantiate(&slot_guest(), World::new("Root"));
    let root = instance.handler().root();
    assert!(matches!(
        instance.call_from_slot(root),
        Err(RuntimeError::InvalidCall(_))
    ));
}

#[test]
fn test_fuel_limits_runaway_guests() {
    let wasm = guest("", r#"(func (export "run") (loop $l (br $l)))"#);
    let runtime = Runtime::with_config(RuntimeConfig::default().with_fuel(10_000)).unwrap();
    let mut instance = runtime
        .load_module(&wasm)
        .unwrap()
        .instantiate(World::default())
        .unwrap();
    assert!(matches!(
        instance.call("run", &[]),
        Err(RuntimeError::WasmError(_))
    ));
    assert!(instance.fuel_remaining().is_some());
}
