//! Slotlink: a typed host call surface between WASM guests and a 3D world
//!
//! Guest scripts manipulate slots, components and member values of a host
//! world through a fixed set of imported functions. This crate is the host
//! side of that boundary.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              slotlink host              │
//! │                                         │
//! │  runtime  - module checks, env linking  │
//! │  handler  - per-operation semantics     │
//! │  world    - in-memory scene graph       │
//! │                                         │
//! ├─────────────────────────────────────────┤
//! │         WASM Execution (wasmtime)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The operation table itself, with its wire types and fingerprint, lives in
//! `slotlink-abi` and is shared with the guest crate.

pub mod handler;
pub mod runtime;
pub mod world;

pub use handler::HostCallHandler;
pub use runtime::{CompiledModule, Instance, Runtime, RuntimeConfig, RuntimeError};
pub use slotlink_abi as abi;
pub use world::{SceneConfig, World};
