//! A guest that walks the slot tree through the `resonitenative` module.
//!
//! Build with `cargo build --release --target wasm32-unknown-unknown` and
//! run with `slotlink run target/wasm32-unknown-unknown/release/tree_walker.wasm`.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::ffi::{c_char, CStr};
use slotlink_guest::{
    not_found_as_none, Module, RefId, ScriptError, TypeTag, Value, WasmHost,
};

slotlink_guest::setup_guest!();

/// The first output of a call's result tuple.
fn first(value: Value) -> Value {
    match value {
        Value::Tuple(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn ref_id(value: &Value) -> Option<RefId> {
    RefId::try_from(value).ok()
}

/// Count every slot below the root. Returns the count, or minus the error
/// code when a call fails.
#[no_mangle]
pub extern "C" fn run() -> i32 {
    match count_slots() {
        Ok(n) => n,
        Err(err) => -err.code().as_raw(),
    }
}

fn count_slots() -> Result<i32, ScriptError> {
    let module = Module::new();
    let mut host = WasmHost::new();

    let root = first(module.call(&mut host, "slot__root_slot", &[])?);
    let mut pending: Vec<Value> = alloc::vec![root];
    let mut count = 0;
    while let Some(slot) = pending.pop() {
        let children = first(module.call(&mut host, "slot__get_children", &[slot])?);
        if let Value::List(children) = children {
            count += children.len() as i32;
            pending.extend(children);
        }
    }
    Ok(count)
}

/// Add `delta` to every `ValueField<int>` at or below `slot`. Returns the
/// number of fields changed.
#[no_mangle]
pub extern "C" fn bump_ints(slot: u64, delta: i32) -> i32 {
    match bump_ints_below(RefId(slot), delta) {
        Ok(n) => n,
        Err(err) => -err.code().as_raw(),
    }
}

fn bump_ints_below(slot: RefId, delta: i32) -> Result<i32, ScriptError> {
    let module = Module::new();
    let mut host = WasmHost::new();

    let mut pending = alloc::vec![Value::from(slot)];
    let mut changed = 0;
    while let Some(slot) = pending.pop() {
        let found = not_found_as_none(module.call(
            &mut host,
            "slot__get_component",
            &[slot.clone(), Value::from("ValueField<int>")],
        ))?;
        if let Some(component) = found {
            let member = module.call(
                &mut host,
                "component__get_member",
                &[first(component), Value::from("Value")],
            )?;
            let items = member.items().unwrap_or(&[]);
            if let [tag, id] = items {
                if i32::try_from(tag).ok() == Some(TypeTag::Int.as_raw()) {
                    let current = first(module.call(&mut host, "value__get_int", &[id.clone()])?);
                    let current = i32::try_from(&current).unwrap_or(0);
                    module.call(
                        &mut host,
                        "value__set_int",
                        &[id.clone(), Value::from(current.wrapping_add(delta))],
                    )?;
                    changed += 1;
                }
            }
        }
        if let Value::List(children) = first(module.call(&mut host, "slot__get_children", &[slot])?) {
            pending.extend(children.into_iter().filter(|c| ref_id(c).is_some()));
        }
    }
    Ok(changed)
}

/// Rename `slot`; callable from an args slot holding a string then a slot
/// reference.
#[no_mangle]
pub unsafe extern "C" fn rename(name: *const c_char, slot: u64) -> i32 {
    if name.is_null() {
        return -1;
    }
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        return -1;
    };
    let module = Module::new();
    let mut host = WasmHost::new();
    match module.call(
        &mut host,
        "slot__set_name",
        &[Value::from(RefId(slot)), Value::from(name)],
    ) {
        Ok(_) => 0,
        Err(err) => -err.code().as_raw(),
    }
}
