//! Shared definitions for the slotlink host call boundary.
//!
//! Both sides of the boundary depend on this crate:
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │  guest (slotlink-guest)  │  env   │   host (slotlink)        │
//! │  script → dispatcher ────┼───────►│  env provider → world    │
//! │  keepalive exports       │◄───────┼── out-params, buffers    │
//! └──────────────────────────┘        └──────────────────────────┘
//!               ▲                                  ▲
//!               └──────── slotlink-abi ────────────┘
//!                 schema, RefId, ErrorCode, Value
//! ```
//!
//! The operation table is declared exactly once, in [`for_each_host_op!`].
//! Everything that needs a per-operation shape (the [`OpId`] enum, the
//! [`SCHEMA`] table, guest imports and exports, host registration) is
//! expanded from it.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod call;
mod hash;
mod schema;
mod types;
mod value;

pub use call::{ArgReader, Arg, Output};
pub use hash::{fingerprint, surface_fingerprint, SurfaceHash};
pub use schema::{
    Namespace, OpId, OpSchema, OutputSpec, OutputType, ParamSpec, ParamType, WireType, SCHEMA,
};
pub use types::{Buff, ErrorCode, RefId, TypeTag, BUFF_SIZE, REF_ID_SIZE};
pub use value::{ConversionError, Value};

/// Name of the wasm import module the host surface lives in.
pub const HOST_MODULE: &str = "env";

/// Guest export the host calls to allocate strings and buffers it hands back.
///
/// Signature: `(size: i32) -> i32`. Returns 0 on allocation failure.
pub const GUEST_ALLOC_EXPORT: &str = "slotlink_alloc";

/// Guest export that frees memory obtained from [`GUEST_ALLOC_EXPORT`].
///
/// Signature: `(ptr: i32, size: i32)`.
pub const GUEST_FREE_EXPORT: &str = "slotlink_free";

/// Alignment used for every host-requested guest allocation.
pub const GUEST_ALLOC_ALIGN: usize = 8;

/// Name under which the scripting module is registered.
pub const SCRIPT_MODULE_NAME: &str = "resonitenative";

/// Guest export returning [`SurfaceHash::short`] of the table the guest was
/// built against, as an `i64`.
pub const GUEST_SURFACE_EXPORT: &str = "slotlink_surface";
