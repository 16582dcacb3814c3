//! Fingerprinting of the host call surface.
//!
//! The boundary is bit-exact, so guest and host must be built against the
//! same table. The fingerprint hashes what the wire depends on: each
//! operation's symbol and the ordered types of its parameters and outputs.
//! Parameter and output names are bindings, not part of the contract, and
//! are left out.

use alloc::string::String;
use core::fmt;

use sha2::{Digest, Sha256};

use crate::schema::{OpSchema, SCHEMA};

/// A 256-bit surface hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHash([u8; 32]);

impl SurfaceHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight bytes as a little-endian `u64`, short enough to embed in a
    /// guest as a version constant.
    pub fn short(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(head)
    }

    pub fn to_hex(&self) -> String {
        use core::fmt::Write;
        let mut out = String::with_capacity(64);
        for b in self.0 {
            let _ = write!(out, "{:02x}", b);
        }
        out
    }
}

impl fmt::Display for SurfaceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

const PARAMS_END: u8 = 0xFF;
const OP_END: u8 = 0xFE;

/// Hash an arbitrary operation table.
pub fn fingerprint(ops: &[OpSchema]) -> SurfaceHash {
    let mut hasher = Sha256::new();
    hasher.update(b"slotlink-surface");
    for op in ops {
        hasher.update(op.symbol.as_bytes());
        hasher.update([0u8]);
        for p in op.params {
            hasher.update([p.ty.code()]);
        }
        hasher.update([PARAMS_END]);
        for o in op.outputs {
            hasher.update([o.ty.code()]);
        }
        hasher.update([OP_END]);
    }
    SurfaceHash(hasher.finalize().into())
}

/// Fingerprint of this crate's [`SCHEMA`].
pub fn surface_fingerprint() -> SurfaceHash {
    fingerprint(SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{OutputSpec, OutputType, ParamSpec, ParamType};
    use alloc::vec::Vec;

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(surface_fingerprint(), surface_fingerprint());
        assert_eq!(surface_fingerprint().to_hex().len(), 64);
    }

    #[test]
    fn names_do_not_change_the_fingerprint() {
        let mut ops: Vec<OpSchema> = SCHEMA.to_vec();
        static RENAMED: [ParamSpec; 1] = [ParamSpec { name: "target", ty: ParamType::RefId }];
        ops[1].params = &RENAMED;
        assert_eq!(fingerprint(&ops), surface_fingerprint());
    }

    #[test]
    fn widths_change_the_fingerprint() {
        let mut ops: Vec<OpSchema> = SCHEMA.to_vec();
        static WIDENED: [OutputSpec; 1] = [OutputSpec { name: "value", ty: OutputType::Double }];
        let get_int = ops
            .iter_mut()
            .find(|op| op.symbol == "value__get_int")
            .expect("value__get_int");
        get_int.outputs = &WIDENED;
        assert_ne!(fingerprint(&ops), surface_fingerprint());
    }

    #[test]
    fn short_is_a_prefix() {
        let hash = SurfaceHash::from_bytes([1; 32]);
        assert_eq!(hash.short(), u64::from_le_bytes([1; 8]));
    }
}
