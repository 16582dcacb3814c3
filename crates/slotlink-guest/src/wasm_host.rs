//! [`HostSurface`] over the real `env` imports.

use alloc::ffi::CString;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::ffi::{c_char, CStr};

use slotlink_abi::{Arg, Buff, ErrorCode, OpId, Output, RefId, TypeTag};

use crate::ffi;
use crate::surface::{HostSurface, RawBuffer, RawOutput};

/// The host surface of the running wasm instance.
#[derive(Debug, Default)]
pub struct WasmHost {
    _private: (),
}

impl WasmHost {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

/// Lowering of one typed argument to its wire value. The held value keeps
/// string storage alive for the duration of the call.
trait Lower {
    type Held;
    type Raw;
    fn hold(arg: Option<&Arg>) -> Result<Self::Held, ErrorCode>;
    fn raw(held: &Self::Held) -> Self::Raw;
}

/// Lifting of one out-parameter slot after a successful call.
trait Lift {
    type Slot;
    fn empty() -> Self::Slot;
    fn lift(slot: Self::Slot) -> RawOutput;
}

mod wire {
    pub struct RefId;
    pub struct Bool;
    pub struct Int;
    pub struct Float;
    pub struct Double;
    pub struct Str;
    pub struct TypeTag;
    pub struct RefIdList;
}

macro_rules! lower_scalar {
    ($marker:ident, $variant:ident, $ty:ty) => {
        impl Lower for wire::$marker {
            type Held = $ty;
            type Raw = $ty;
            fn hold(arg: Option<&Arg>) -> Result<$ty, ErrorCode> {
                match arg {
                    Some(Arg::$variant(v)) => Ok((*v).into()),
                    _ => Err(ErrorCode::InvalidArgument),
                }
            }
            fn raw(held: &$ty) -> $ty {
                *held
            }
        }
    };
}

lower_scalar!(RefId, RefId, u64);
lower_scalar!(Bool, Bool, bool);
lower_scalar!(Int, Int, i32);
lower_scalar!(Float, Float, f32);
lower_scalar!(Double, Double, f64);

impl Lower for wire::Str {
    type Held = CString;
    type Raw = *const c_char;
    fn hold(arg: Option<&Arg>) -> Result<CString, ErrorCode> {
        match arg {
            Some(Arg::Str(s)) => CString::new(s.as_str()).map_err(|_| ErrorCode::InvalidArgument),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
    fn raw(held: &CString) -> *const c_char {
        held.as_ptr()
    }
}

macro_rules! lift_scalar {
    ($marker:ident, $ty:ty, $wrap:expr) => {
        impl Lift for wire::$marker {
            type Slot = $ty;
            fn empty() -> $ty {
                <$ty>::default()
            }
            fn lift(slot: $ty) -> RawOutput {
                RawOutput::Value($wrap(slot))
            }
        }
    };
}

lift_scalar!(RefId, u64, |v| Output::RefId(RefId(v)));
lift_scalar!(Int, i32, Output::Int);
lift_scalar!(Float, f32, Output::Float);
lift_scalar!(Double, f64, Output::Double);
lift_scalar!(TypeTag, i32, |v| Output::TypeTag(TypeTag::from_raw(v)));

impl Lift for wire::Str {
    type Slot = *mut c_char;
    fn empty() -> *mut c_char {
        core::ptr::null_mut()
    }
    fn lift(slot: *mut c_char) -> RawOutput {
        if slot.is_null() {
            return RawOutput::Str(RawBuffer::string(0, 0));
        }
        let len = unsafe { CStr::from_ptr(slot) }.to_bytes_with_nul().len();
        RawOutput::Str(RawBuffer::string(slot as usize, len))
    }
}

impl Lift for wire::RefIdList {
    type Slot = Buff;
    fn empty() -> Buff {
        Buff::EMPTY
    }
    fn lift(slot: Buff) -> RawOutput {
        if slot.is_empty() {
            return RawOutput::RefIds(RawBuffer::ref_ids(0, 0));
        }
        RawOutput::RefIds(RawBuffer::ref_ids(slot.ptr as usize, slot.len as usize))
    }
}

macro_rules! raw_dispatch {
    ($(
        $variant:ident {
            symbol: $symbol:ident,
            export: $export:literal,
            namespace: $ns:ident,
            params: ( $( $p:ident : $pty:ident ),* $(,)? ),
            outputs: ( $( $o:ident : $oty:ident ),* $(,)? ),
        }
    ),* $(,)?) => {
        #[allow(unused_mut, unused_variables)]
        fn invoke_raw(op: OpId, args: &[Arg]) -> Result<Vec<RawOutput>, ErrorCode> {
            match op {
                $(
                    OpId::$variant => {
                        let mut args = args.iter();
                        $( let $p = <wire::$pty as Lower>::hold(args.next())?; )*
                        $( let mut $o = <wire::$oty as Lift>::empty(); )*
                        let code = unsafe {
                            ffi::$symbol(
                                $( <wire::$pty as Lower>::raw(&$p), )*
                                $( &mut $o, )*
                            )
                        };
                        ErrorCode::from_raw(code).check()?;
                        Ok(vec![ $( <wire::$oty as Lift>::lift($o), )* ])
                    }
                )*
            }
        }
    };
}

slotlink_abi::for_each_host_op!(raw_dispatch);

impl HostSurface for WasmHost {
    fn invoke(&mut self, op: OpId, args: &[Arg]) -> Result<Vec<RawOutput>, ErrorCode> {
        invoke_raw(op, args)
    }

    fn read_ref_ids(&self, buffer: &RawBuffer) -> Result<Vec<RefId>, ErrorCode> {
        if buffer.is_empty() {
            return Ok(Vec::new());
        }
        let base = buffer.addr() as *const u64;
        Ok((0..buffer.len())
            .map(|i| RefId(u64::from_le(unsafe { base.add(i).read_unaligned() })))
            .collect())
    }

    fn read_str(&self, buffer: &RawBuffer) -> Result<String, ErrorCode> {
        if buffer.addr() == 0 || buffer.len() == 0 {
            return Err(ErrorCode::HostFailure);
        }
        let bytes = unsafe {
            core::slice::from_raw_parts(buffer.addr() as *const u8, buffer.len() - 1)
        };
        core::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| ErrorCode::HostFailure)
    }

    fn release(&mut self, buffer: RawBuffer) {
        if buffer.is_empty() {
            return;
        }
        unsafe { crate::free_for_host(buffer.addr() as i32, buffer.byte_len() as i32) }
    }
}
