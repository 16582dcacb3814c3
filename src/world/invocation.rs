//! Calls described by slots.
//!
//! An args slot names the guest function to run in a string member on one of
//! its own components. Each child contributes one argument: the first member
//! found on its components, in component order. Children without members are
//! skipped.

use slotlink_abi::{ErrorCode, RefId};

use super::{MemberValue, World};

/// A guest call read out of an args slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCall {
    pub function: String,
    pub args: Vec<MemberValue>,
}

impl World {
    fn first_member<'w>(
        &'w self,
        slot: RefId,
        mut accept: impl FnMut(&MemberValue) -> bool,
    ) -> Result<Option<&'w MemberValue>, ErrorCode> {
        for component in self.components(slot)? {
            for (_, member) in &self.component(*component)?.members {
                let value = &self.member(*member)?.value;
                if accept(value) {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Read the call described by `args_slot`. `NotFound` when the slot
    /// carries no string member to name the function.
    pub fn slot_invocation(&self, args_slot: RefId) -> Result<SlotCall, ErrorCode> {
        let function = match self.first_member(args_slot, |v| matches!(v, MemberValue::Str(_)))? {
            Some(MemberValue::Str(name)) => name.clone(),
            _ => return Err(ErrorCode::NotFound),
        };
        let mut args = Vec::new();
        for child in self.children(args_slot)? {
            if let Some(value) = self.first_member(*child, |_| true)? {
                args.push(value.clone());
            }
        }
        Ok(SlotCall { function, args })
    }
}
