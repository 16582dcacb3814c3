//! Guest-side bindings to the slotlink host call surface.
//!
//! A guest module embeds a scripting runtime. Scripts call into the host
//! through the `resonitenative` [`Module`], which decodes dynamic values,
//! invokes the host surface and encodes the outputs back into a tuple:
//!
//! ```ignore
//! #![no_std]
//! extern crate alloc;
//!
//! use slotlink_guest::{Module, Value, WasmHost};
//!
//! // Allocator, panic handler, keepalive exports and allocation exports.
//! slotlink_guest::setup_guest!();
//!
//! #[no_mangle]
//! pub extern "C" fn run() -> i32 {
//!     let module = Module::new();
//!     let mut host = WasmHost::new();
//!     match module.call(&mut host, "slot__root_slot", &[]) {
//!         Ok(_) => 0,
//!         Err(err) => err.code().as_raw(),
//!     }
//! }
//! ```
//!
//! Everything per-operation (imports, exports, the raw call thunk) is
//! expanded from [`slotlink_abi::for_each_host_op!`], so this crate has no
//! hand-written list of operations.

#![cfg_attr(not(test), no_std)]
// Wire symbols use a double underscore as namespace separator.
#![allow(non_snake_case)]

pub extern crate alloc;

mod dispatch;
mod marshal;
mod module;
mod release;
mod surface;
#[cfg(test)]
mod testing;

#[cfg(target_arch = "wasm32")]
#[doc(hidden)]
pub mod ffi;
#[cfg(target_arch = "wasm32")]
mod wasm_host;

pub use dispatch::{call, not_found_as_none, ScriptError};
pub use marshal::{decode_arg, encode_outputs};
pub use module::Module;
pub use release::ReleaseGuard;
pub use surface::{BufferKind, HostSurface, RawBuffer, RawOutput};
#[cfg(target_arch = "wasm32")]
pub use wasm_host::WasmHost;

pub use slotlink_abi::{
    Arg, ConversionError, ErrorCode, OpId, OpSchema, Output, RefId, TypeTag, Value,
};

#[doc(hidden)]
pub use dlmalloc::GlobalDlmalloc as __GlobalDlmalloc;

#[doc(hidden)]
pub use slotlink_abi as __abi;

/// A boolean as it crosses the export boundary: any nonzero `i32` is true.
///
/// Callers of the keepalive exports are not guaranteed to pass 0 or 1, so
/// the shim accepts the full `i32` and narrows before forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct NarrowBool(pub i32);

impl From<NarrowBool> for bool {
    fn from(b: NarrowBool) -> bool {
        b.0 != 0
    }
}

impl From<bool> for NarrowBool {
    fn from(b: bool) -> NarrowBool {
        NarrowBool(b as i32)
    }
}

/// Allocate `size` bytes for the host. Returns 0 for a non-positive size or
/// when the allocator is exhausted.
///
/// Backs the `slotlink_alloc` export; memory obtained here is released with
/// [`free_for_host`] or through [`HostSurface::release`].
#[doc(hidden)]
pub fn alloc_for_host(size: i32) -> i32 {
    let Some(layout) = host_layout(size) else {
        return 0;
    };
    unsafe { alloc::alloc::alloc(layout) as usize as i32 }
}

/// Free memory obtained from [`alloc_for_host`].
///
/// # Safety
///
/// `ptr` and `size` must come from a single earlier `alloc_for_host` call
/// that has not been freed yet.
#[doc(hidden)]
pub unsafe fn free_for_host(ptr: i32, size: i32) {
    if ptr == 0 {
        return;
    }
    if let Some(layout) = host_layout(size) {
        alloc::alloc::dealloc(ptr as u32 as usize as *mut u8, layout);
    }
}

pub(crate) fn host_layout(size: i32) -> Option<core::alloc::Layout> {
    if size <= 0 {
        return None;
    }
    core::alloc::Layout::from_size_align(size as usize, slotlink_abi::GUEST_ALLOC_ALIGN).ok()
}

/// Parameter type of a keepalive export.
#[doc(hidden)]
#[macro_export]
macro_rules! __shim_param {
    (RefId) => { u64 };
    (Bool) => { $crate::NarrowBool };
    (Int) => { i32 };
    (Float) => { f32 };
    (Double) => { f64 };
    (Str) => { *const core::ffi::c_char };
}

/// Parameter type of a raw `env` import.
#[doc(hidden)]
#[macro_export]
macro_rules! __wire_param {
    (RefId) => { u64 };
    (Bool) => { bool };
    (Int) => { i32 };
    (Float) => { f32 };
    (Double) => { f64 };
    (Str) => { *const core::ffi::c_char };
}

/// Out-pointer type of an output, shared by imports and exports.
#[doc(hidden)]
#[macro_export]
macro_rules! __wire_out {
    (RefId) => { *mut u64 };
    (Int) => { *mut i32 };
    (Float) => { *mut f32 };
    (Double) => { *mut f64 };
    (Str) => { *mut *mut core::ffi::c_char };
    (TypeTag) => { *mut i32 };
    (RefIdList) => { *mut $crate::__abi::Buff };
}

/// Expands to one retained export per operation, `_<symbol>`, forwarding to
/// the `env` import of the same name.
#[doc(hidden)]
#[macro_export]
macro_rules! __keepalive_exports {
    ($(
        $variant:ident {
            symbol: $symbol:ident,
            export: $export:literal,
            namespace: $ns:ident,
            params: ( $( $p:ident : $pty:ident ),* $(,)? ),
            outputs: ( $( $o:ident : $oty:ident ),* $(,)? ),
        }
    ),* $(,)?) => {
        $(
            #[export_name = $export]
            pub unsafe extern "C" fn $symbol(
                $( $p: $crate::__shim_param!($pty), )*
                $( $o: $crate::__wire_out!($oty), )*
            ) -> i32 {
                $crate::ffi::$symbol(
                    $( ::core::convert::Into::into($p), )*
                    $( $o, )*
                )
            }
        )*
    };
}

/// Emit the guest's externally visible entry points: a `_<symbol>`
/// keepalive export per host operation, `slotlink_alloc`/`slotlink_free`
/// for host-side allocation, and `slotlink_surface` reporting the surface
/// fingerprint the guest was built against.
///
/// Must be invoked in the final (cdylib) crate so the linker retains the
/// exports. [`setup_guest!`] calls it.
#[macro_export]
macro_rules! export_host_surface {
    () => {
        #[cfg(target_arch = "wasm32")]
        #[allow(non_snake_case)]
        #[doc(hidden)]
        pub mod __slotlink_exports {
            $crate::__abi::for_each_host_op!($crate::__keepalive_exports);

            #[no_mangle]
            pub extern "C" fn slotlink_alloc(size: i32) -> i32 {
                $crate::alloc_for_host(size)
            }

            #[no_mangle]
            pub unsafe extern "C" fn slotlink_free(ptr: i32, size: i32) {
                $crate::free_for_host(ptr, size)
            }

            #[no_mangle]
            pub extern "C" fn slotlink_surface() -> i64 {
                $crate::__abi::surface_fingerprint().short() as i64
            }
        }
    };
}

/// Set up a panic handler that loops forever.
///
/// Use this in `no_std` guests.
#[macro_export]
macro_rules! panic_handler {
    () => {
        #[panic_handler]
        fn panic(_info: &core::panic::PanicInfo) -> ! {
            loop {}
        }
    };
}

/// Set up the dlmalloc allocator, the panic handler and the exported host
/// surface.
///
/// ```ignore
/// slotlink_guest::setup_guest!();
/// ```
#[macro_export]
macro_rules! setup_guest {
    () => {
        #[global_allocator]
        static __SLOTLINK_ALLOCATOR: $crate::__GlobalDlmalloc = $crate::__GlobalDlmalloc;
        $crate::panic_handler!();
        $crate::export_host_surface!();
    };
}
