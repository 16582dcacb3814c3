//! Scoped ownership of host allocations.

use alloc::string::String;
use alloc::vec::Vec;

use slotlink_abi::{ErrorCode, RefId};

use crate::surface::{HostSurface, RawBuffer};

/// Holds host allocations until they are copied, releasing each one exactly
/// once.
///
/// [`take_ref_ids`](Self::take_ref_ids) and [`take_str`](Self::take_str)
/// release as soon as the copy is made, whether or not it succeeded.
/// Anything still held when the guard drops is released then, so early
/// returns cannot leak.
pub struct ReleaseGuard<'h, H: HostSurface + ?Sized> {
    host: &'h mut H,
    held: Vec<Option<RawBuffer>>,
}

impl<'h, H: HostSurface + ?Sized> ReleaseGuard<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            held: Vec::new(),
        }
    }

    /// Take ownership of `buffer`, returning a ticket to redeem it with.
    pub fn hold(&mut self, buffer: RawBuffer) -> usize {
        self.held.push(Some(buffer));
        self.held.len() - 1
    }

    fn redeem(&mut self, ticket: usize) -> Result<RawBuffer, ErrorCode> {
        self.held
            .get_mut(ticket)
            .and_then(Option::take)
            .ok_or(ErrorCode::HostFailure)
    }

    pub fn take_ref_ids(&mut self, ticket: usize) -> Result<Vec<RefId>, ErrorCode> {
        let buffer = self.redeem(ticket)?;
        let copied = self.host.read_ref_ids(&buffer);
        self.host.release(buffer);
        copied
    }

    pub fn take_str(&mut self, ticket: usize) -> Result<String, ErrorCode> {
        let buffer = self.redeem(ticket)?;
        let copied = self.host.read_str(&buffer);
        self.host.release(buffer);
        copied
    }
}

impl<H: HostSurface + ?Sized> Drop for ReleaseGuard<'_, H> {
    fn drop(&mut self) {
        for buffer in self.held.drain(..).flatten() {
            self.host.release(buffer);
        }
    }
}
