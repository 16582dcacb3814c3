//! An in-memory host surface that tracks every allocation it hands out.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use slotlink_abi::{Arg, ErrorCode, OpId, Output, RefId};

use crate::surface::{HostSurface, RawBuffer, RawOutput};

pub(crate) struct FakeHost {
    pub calls: Vec<(OpId, Vec<Arg>)>,
    response: Option<Result<Vec<RawOutput>, ErrorCode>>,
    live: BTreeMap<usize, Vec<u8>>,
    next_addr: usize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            response: None,
            live: BTreeMap::new(),
            next_addr: 0x1000,
        }
    }

    pub fn respond(&mut self, outputs: Vec<RawOutput>) {
        self.response = Some(Ok(outputs));
    }

    pub fn respond_values(&mut self, outputs: Vec<Output>) {
        self.respond(outputs.into_iter().map(RawOutput::Value).collect());
    }

    pub fn fail_with(&mut self, code: ErrorCode) {
        self.response = Some(Err(code));
    }

    fn alloc(&mut self, bytes: Vec<u8>) -> usize {
        let addr = self.next_addr;
        self.next_addr += bytes.len().max(1).next_multiple_of(8);
        self.live.insert(addr, bytes);
        addr
    }

    pub fn alloc_ref_ids(&mut self, ids: &[RefId]) -> RawBuffer {
        let bytes = ids.iter().flat_map(|id| id.raw().to_le_bytes()).collect();
        let addr = self.alloc(bytes);
        RawBuffer::ref_ids(addr, ids.len())
    }

    pub fn alloc_str(&mut self, s: &str) -> RawBuffer {
        self.alloc_invalid_str(s.as_bytes())
    }

    /// Allocate raw bytes as a string, without checking they are UTF-8.
    pub fn alloc_invalid_str(&mut self, bytes: &[u8]) -> RawBuffer {
        let mut owned = bytes.to_vec();
        owned.push(0);
        let len = owned.len();
        let addr = self.alloc(owned);
        RawBuffer::string(addr, len)
    }

    pub fn assert_all_released(&self) {
        assert!(
            self.live.is_empty(),
            "leaked host allocations at {:x?}",
            self.live.keys().collect::<Vec<_>>()
        );
    }
}

impl HostSurface for FakeHost {
    fn invoke(&mut self, op: OpId, args: &[Arg]) -> Result<Vec<RawOutput>, ErrorCode> {
        self.calls.push((op, args.to_vec()));
        self.response.take().unwrap_or(Ok(vec![]))
    }

    fn read_ref_ids(&self, buffer: &RawBuffer) -> Result<Vec<RefId>, ErrorCode> {
        if buffer.is_empty() {
            return Ok(Vec::new());
        }
        let bytes = self.live.get(&buffer.addr()).ok_or(ErrorCode::HostFailure)?;
        Ok(bytes
            .chunks_exact(8)
            .take(buffer.len())
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                RefId(u64::from_le_bytes(raw))
            })
            .collect())
    }

    fn read_str(&self, buffer: &RawBuffer) -> Result<String, ErrorCode> {
        let bytes = self.live.get(&buffer.addr()).ok_or(ErrorCode::HostFailure)?;
        let text = &bytes[..buffer.len().saturating_sub(1)];
        core::str::from_utf8(text)
            .map(String::from)
            .map_err(|_| ErrorCode::HostFailure)
    }

    fn release(&mut self, buffer: RawBuffer) {
        if buffer.is_empty() {
            return;
        }
        assert!(
            self.live.remove(&buffer.addr()).is_some(),
            "released {:#x} twice",
            buffer.addr()
        );
    }
}
