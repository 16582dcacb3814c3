//! The typed view of the host surface the dispatcher calls through.

use alloc::string::String;
use alloc::vec::Vec;

use slotlink_abi::{Arg, ErrorCode, OpId, Output, RefId};

/// What a host-owned allocation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `len` little-endian reference IDs.
    RefIds,
    /// `len` bytes of UTF-8, including the trailing NUL.
    Str,
}

/// A host allocation handed to the caller.
///
/// Deliberately not `Clone`: whoever holds the value owns the allocation and
/// must pass it to [`HostSurface::release`] exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct RawBuffer {
    kind: BufferKind,
    addr: usize,
    len: usize,
}

impl RawBuffer {
    pub fn ref_ids(addr: usize, len: usize) -> Self {
        Self { kind: BufferKind::RefIds, addr, len }
    }

    /// `len` counts the trailing NUL.
    pub fn string(addr: usize, len: usize) -> Self {
        Self { kind: BufferKind::Str, addr, len }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Elements for a reference ID list, bytes for a string.
    pub fn len(&self) -> usize {
        self.len
    }

    /// A null or zero-length buffer owns no allocation.
    pub fn is_empty(&self) -> bool {
        self.addr == 0 || self.len == 0
    }

    /// Size of the underlying allocation in bytes.
    pub fn byte_len(&self) -> usize {
        match self.kind {
            BufferKind::RefIds => self.len * slotlink_abi::REF_ID_SIZE,
            BufferKind::Str => self.len,
        }
    }
}

/// One output of a successful raw call, before host-owned memory is copied.
#[derive(Debug, PartialEq)]
pub enum RawOutput {
    Value(Output),
    RefIds(RawBuffer),
    Str(RawBuffer),
}

/// The host call surface as the binding sees it.
///
/// [`WasmHost`](crate::WasmHost) implements it over the real `env` imports;
/// tests implement it in memory.
pub trait HostSurface {
    /// Perform one host call. On error no output exists and nothing needs
    /// releasing.
    fn invoke(&mut self, op: OpId, args: &[Arg]) -> Result<Vec<RawOutput>, ErrorCode>;

    /// Copy exactly `buffer.len()` reference IDs out of a host buffer.
    fn read_ref_ids(&self, buffer: &RawBuffer) -> Result<Vec<RefId>, ErrorCode>;

    /// Copy a host string, without its trailing NUL.
    fn read_str(&self, buffer: &RawBuffer) -> Result<String, ErrorCode>;

    /// Give a host allocation back.
    fn release(&mut self, buffer: RawBuffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_depends_on_kind() {
        assert_eq!(RawBuffer::ref_ids(64, 3).byte_len(), 24);
        assert_eq!(RawBuffer::string(64, 6).byte_len(), 6);
        assert!(RawBuffer::ref_ids(0, 0).is_empty());
        assert!(!RawBuffer::string(8, 1).is_empty());
    }
}
