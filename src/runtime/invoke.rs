//! Running guest functions named by slots.

use slotlink_abi::{RefId, GUEST_ALLOC_EXPORT, GUEST_FREE_EXPORT};
use tracing::{debug, warn};
use wasmtime::Val;

use super::{Instance, RuntimeError};
use crate::world::{MemberValue, World};

impl Instance<World> {
    /// Run the guest function described by `args_slot`.
    ///
    /// String arguments are copied into guest allocations for the duration
    /// of the call and freed afterwards, whether or not the call succeeds.
    pub fn call_from_slot(&mut self, args_slot: RefId) -> Result<Vec<Val>, RuntimeError> {
        let call = self.handler().slot_invocation(args_slot).map_err(|code| {
            RuntimeError::InvalidCall(format!("args slot {}: {}", args_slot, code))
        })?;
        debug!(function = %call.function, args = call.args.len(), "slot call");

        let mut allocations = Vec::new();
        let lowered = self.lower_args(&call.args, &mut allocations);
        let result = match lowered {
            Ok(args) => self.call(&call.function, &args),
            Err(e) => Err(e),
        };

        for (ptr, size) in allocations {
            if let Err(e) = self.call_typed::<(i32, i32), ()>(GUEST_FREE_EXPORT, (ptr, size)) {
                warn!(ptr, size, "failed to free slot call argument: {}", e);
            }
        }
        result
    }

    fn lower_args(
        &mut self,
        values: &[MemberValue],
        allocations: &mut Vec<(i32, i32)>,
    ) -> Result<Vec<Val>, RuntimeError> {
        values
            .iter()
            .map(|value| {
                Ok(match value {
                    MemberValue::Int(v) => Val::I32(*v),
                    MemberValue::Bool(b) => Val::I32(i32::from(*b)),
                    MemberValue::Float(v) => Val::F32(v.to_bits()),
                    MemberValue::Double(v) => Val::F64(v.to_bits()),
                    MemberValue::Ref(id) => Val::I64(id.raw() as i64),
                    MemberValue::Str(s) => {
                        let mut bytes = s.clone().into_bytes();
                        bytes.push(0);
                        let size = i32::try_from(bytes.len()).map_err(|_| {
                            RuntimeError::InvalidCall(format!("{}-byte string argument", bytes.len()))
                        })?;
                        let ptr = self.call_typed::<i32, i32>(GUEST_ALLOC_EXPORT, size)?;
                        if ptr == 0 {
                            return Err(RuntimeError::MemoryError(format!(
                                "{} returned null for {} bytes",
                                GUEST_ALLOC_EXPORT, size
                            )));
                        }
                        allocations.push((ptr, size));
                        self.write_memory(ptr as u32 as usize, &bytes)?;
                        Val::I32(ptr)
                    }
                })
            })
            .collect()
    }
}
