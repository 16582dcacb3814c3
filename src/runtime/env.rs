//! The `env` import module.
//!
//! Every operation in the host call surface is registered here as a raw
//! wasm function. A call goes through [`serve`]:
//!
//! 1. out-pointers are checked (non-null, in bounds) before anything runs
//! 2. wire parameters are lifted into [`Arg`]s, reading strings from guest
//!    memory
//! 3. the [`HostCallHandler`] answers with typed outputs or an error code
//! 4. strings and lists are copied into guest allocations
//! 5. all outputs are written, and only then is `Success` returned
//!
//! Outputs are never touched when the call fails.

use std::marker::PhantomData;

use slotlink_abi::{
    Arg, Buff, ErrorCode, OpId, Output, ParamType, RefId, HOST_MODULE, REF_ID_SIZE,
};
use tracing::trace;
use wasmtime::Caller;

use super::host::{
    Ctx, HostFunctionErrorKind, HostFunctionProvider, HostLinkerBuilder, InterfaceBuilder,
    LinkerError, Reporter,
};
use crate::handler::HostCallHandler;

/// Store data of an instance serving the call surface.
pub struct HostState<H> {
    pub handler: H,
}

impl<H> HostState<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

/// A raw wasm parameter as received by a registered function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl From<i32> for WireValue {
    fn from(v: i32) -> Self {
        WireValue::I32(v)
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        WireValue::I64(v)
    }
}

impl From<f32> for WireValue {
    fn from(v: f32) -> Self {
        WireValue::F32(v)
    }
}

impl From<f64> for WireValue {
    fn from(v: f64) -> Self {
        WireValue::F64(v)
    }
}

/// Registers the whole call surface under `env`.
pub struct EnvProvider<H> {
    _marker: PhantomData<fn() -> H>,
}

impl<H> EnvProvider<H> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<H> Default for EnvProvider<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostCallHandler + 'static> HostFunctionProvider<HostState<H>> for EnvProvider<H> {
    fn register(&self, builder: &mut HostLinkerBuilder<'_, HostState<H>>) -> Result<(), LinkerError> {
        let mut env = builder.interface(HOST_MODULE)?;
        register_ops(&mut env)
    }
}

macro_rules! host_wire {
    (RefId) => { i64 };
    (Bool) => { i32 };
    (Int) => { i32 };
    (Float) => { f32 };
    (Double) => { f64 };
    (Str) => { i32 };
}

macro_rules! define_registration {
    ($(
        $variant:ident {
            symbol: $symbol:ident,
            export: $export:literal,
            namespace: $ns:ident,
            params: ( $( $p:ident : $pty:ident ),* $(,)? ),
            outputs: ( $( $o:ident : $oty:ident ),* $(,)? ),
        }
    ),* $(,)?) => {
        fn register_ops<H: HostCallHandler + 'static>(
            env: &mut InterfaceBuilder<'_, '_, HostState<H>>,
        ) -> Result<(), LinkerError> {
            $(
                {
                    let reporter = env.reporter(stringify!($symbol));
                    env.func_raw(
                        stringify!($symbol),
                        move |mut caller: Caller<'_, HostState<H>>, $( $p: host_wire!($pty), )* $( $o: i32, )*| -> i32 {
                            let code = serve(
                                &mut caller,
                                &reporter,
                                OpId::$variant,
                                &[$( WireValue::from($p) ),*],
                                &[$( $o ),*],
                            );
                            code.as_raw()
                        },
                    )?;
                }
            )*
            Ok(())
        }
    };
}

slotlink_abi::for_each_host_op!(define_registration);

/// Serve one host call. Returns the code handed back to the guest.
pub fn serve<H: HostCallHandler>(
    caller: &mut Caller<'_, HostState<H>>,
    reporter: &Reporter,
    op: OpId,
    params: &[WireValue],
    outs: &[i32],
) -> ErrorCode {
    let mut ctx = Ctx::new(caller);
    match serve_in(&mut ctx, reporter, op, params, outs) {
        Ok(()) => ErrorCode::Success,
        Err(code) => {
            trace!(%op, %code, "host call returned error");
            code
        }
    }
}

fn serve_in<H: HostCallHandler>(
    ctx: &mut Ctx<'_, '_, HostState<H>>,
    reporter: &Reporter,
    op: OpId,
    params: &[WireValue],
    outs: &[i32],
) -> Result<(), ErrorCode> {
    let schema = op.schema();

    let memory_size = ctx.memory_size().map_err(|e| {
        reporter.report(HostFunctionErrorKind::MemoryRead(e.to_string()));
        ErrorCode::HostFailure
    })?;
    let outs: Vec<u32> = outs.iter().map(|p| *p as u32).collect();
    for (ptr, spec) in outs.iter().zip(schema.outputs) {
        if *ptr == 0 {
            return Err(ErrorCode::NullArgument);
        }
        if *ptr as usize + spec.ty.slot_size() > memory_size {
            return Err(ErrorCode::InvalidArgument);
        }
    }

    let args = schema
        .params
        .iter()
        .zip(params)
        .map(|(spec, wire)| lift_arg(ctx, spec.ty, *wire))
        .collect::<Result<Vec<_>, _>>()?;

    let outputs = ctx.data_mut().handler.handle(op, &args)?;

    let shape_ok = outputs.len() == schema.outputs.len()
        && outputs.iter().zip(schema.outputs).all(|(o, spec)| o.ty() == spec.ty);
    if !shape_ok {
        let got: Vec<_> = outputs.iter().map(|o| o.ty().as_str()).collect();
        reporter.report(HostFunctionErrorKind::Contract(format!(
            "{} answered with ({})",
            schema,
            got.join(", ")
        )));
        return Err(ErrorCode::HostFailure);
    }

    let mut staged = Staged::default();
    let mut encoded = Vec::with_capacity(outputs.len());
    for output in outputs {
        match stage_output(ctx, &mut staged, output) {
            Ok(bytes) => encoded.push(bytes),
            Err(kind) => {
                staged.release(ctx);
                reporter.report(kind);
                return Err(ErrorCode::HostFailure);
            }
        }
    }

    for (ptr, bytes) in outs.iter().zip(&encoded) {
        if let Err(e) = ctx.write_bytes(*ptr, bytes) {
            staged.release(ctx);
            reporter.report(HostFunctionErrorKind::MemoryWrite(e.to_string()));
            return Err(ErrorCode::HostFailure);
        }
    }
    Ok(())
}

fn lift_arg<T>(ctx: &mut Ctx<'_, '_, T>, ty: ParamType, wire: WireValue) -> Result<Arg, ErrorCode> {
    let arg = match (ty, wire) {
        (ParamType::RefId, WireValue::I64(v)) => Arg::RefId(RefId(v as u64)),
        (ParamType::Bool, WireValue::I32(v)) => Arg::Bool(v != 0),
        (ParamType::Int, WireValue::I32(v)) => Arg::Int(v),
        (ParamType::Float, WireValue::F32(v)) => Arg::Float(v),
        (ParamType::Double, WireValue::F64(v)) => Arg::Double(v),
        (ParamType::Str, WireValue::I32(0)) => return Err(ErrorCode::NullArgument),
        (ParamType::Str, WireValue::I32(ptr)) => {
            let bytes = ctx
                .read_c_bytes(ptr as u32)
                .map_err(|_| ErrorCode::InvalidArgument)?
                .ok_or(ErrorCode::InvalidArgument)?;
            Arg::Str(String::from_utf8(bytes).map_err(|_| ErrorCode::InvalidArgument)?)
        }
        _ => return Err(ErrorCode::HostFailure),
    };
    Ok(arg)
}

/// Guest allocations made for the current call, freed if the call fails
/// after making them.
#[derive(Default)]
struct Staged {
    allocations: Vec<(u32, usize)>,
}

impl Staged {
    fn alloc_and_write<T>(
        &mut self,
        ctx: &mut Ctx<'_, '_, T>,
        bytes: &[u8],
    ) -> Result<u32, HostFunctionErrorKind> {
        let ptr = ctx
            .guest_alloc(bytes.len())
            .map_err(|e| HostFunctionErrorKind::Allocation(e.to_string()))?;
        self.allocations.push((ptr, bytes.len()));
        ctx.write_bytes(ptr, bytes)
            .map_err(|e| HostFunctionErrorKind::MemoryWrite(e.to_string()))?;
        Ok(ptr)
    }

    fn release<T>(self, ctx: &mut Ctx<'_, '_, T>) {
        for (ptr, size) in self.allocations {
            ctx.guest_free(ptr, size);
        }
    }
}

fn stage_output<T>(
    ctx: &mut Ctx<'_, '_, T>,
    staged: &mut Staged,
    output: Output,
) -> Result<Vec<u8>, HostFunctionErrorKind> {
    let bytes = match output {
        Output::RefId(id) => id.raw().to_le_bytes().to_vec(),
        Output::Int(v) => v.to_le_bytes().to_vec(),
        Output::Float(v) => v.to_le_bytes().to_vec(),
        Output::Double(v) => v.to_le_bytes().to_vec(),
        Output::TypeTag(tag) => tag.as_raw().to_le_bytes().to_vec(),
        Output::Str(s) => {
            let mut text = s.into_bytes();
            if text.contains(&0) {
                return Err(HostFunctionErrorKind::Contract(
                    "string output contains an interior NUL".into(),
                ));
            }
            text.push(0);
            let ptr = staged.alloc_and_write(ctx, &text)?;
            ptr.to_le_bytes().to_vec()
        }
        Output::RefIds(ids) if ids.is_empty() => Buff::EMPTY.to_le_bytes().to_vec(),
        Output::RefIds(ids) => {
            let len = i32::try_from(ids.len())
                .map_err(|_| HostFunctionErrorKind::Contract(format!("{} ids", ids.len())))?;
            let mut raw = Vec::with_capacity(ids.len() * REF_ID_SIZE);
            for id in &ids {
                raw.extend_from_slice(&id.raw().to_le_bytes());
            }
            let ptr = staged.alloc_and_write(ctx, &raw)?;
            Buff { ptr, len }.to_le_bytes().to_vec()
        }
    };
    Ok(bytes)
}

/// Whether any operation in `ops` hands back guest allocations.
pub fn needs_guest_alloc<'a>(ops: impl IntoIterator<Item = &'a OpId>) -> bool {
    ops.into_iter()
        .any(|op| op.schema().outputs.iter().any(|o| o.ty.is_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotlink_abi::OutputType;

    #[test]
    fn wire_values_convert_from_core_types() {
        assert_eq!(WireValue::from(3i32), WireValue::I32(3));
        assert_eq!(WireValue::from(-1i64), WireValue::I64(-1));
        assert_eq!(WireValue::from(1.5f32), WireValue::F32(1.5));
    }

    #[test]
    fn owned_outputs_need_the_guest_allocator() {
        assert!(needs_guest_alloc(&[OpId::SlotGetName]));
        assert!(needs_guest_alloc(&[OpId::SlotRootSlot, OpId::SlotGetChildren]));
        assert!(!needs_guest_alloc(&[OpId::SlotRootSlot, OpId::ValueGetInt]));
        assert_eq!(OutputType::Str.slot_size(), 4);
    }
}
