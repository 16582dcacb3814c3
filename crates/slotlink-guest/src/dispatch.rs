//! The generic, schema-driven dispatcher.
//!
//! One function serves every operation: the schema entry says how many
//! arguments to expect and how to decode each, and how many outputs come
//! back and of which type. There is no per-operation glue to keep in sync.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use slotlink_abi::{ConversionError, ErrorCode, OpSchema, Output, OutputType, Value};

use crate::marshal::{decode_arg, encode_outputs};
use crate::release::ReleaseGuard;
use crate::surface::{HostSurface, RawOutput};

/// An error raised into the script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// The script passed the wrong number of arguments.
    Arity {
        op: &'static str,
        expected: usize,
        got: usize,
    },
    /// An argument could not be decoded as its declared type.
    Argument {
        op: &'static str,
        index: usize,
        name: &'static str,
        error: ConversionError,
    },
    /// The host returned a non-success code.
    Host { op: &'static str, code: ErrorCode },
    /// The host reported success but its outputs do not match the schema.
    Contract { op: &'static str, detail: String },
    UnknownOperation(String),
}

impl ScriptError {
    /// The error code closest to this error, for guests that report codes.
    pub fn code(&self) -> ErrorCode {
        match self {
            ScriptError::Arity { .. } | ScriptError::Argument { .. } => {
                ErrorCode::InvalidArgument
            }
            ScriptError::Host { code, .. } => *code,
            ScriptError::Contract { .. } => ErrorCode::HostFailure,
            ScriptError::UnknownOperation(_) => ErrorCode::NotFound,
        }
    }
}

/// Read a host `NotFound` as an absent result. Every other error is kept.
///
/// For lookups where a miss is an answer, such as probing a slot for a
/// component type.
pub fn not_found_as_none(
    result: Result<Value, ScriptError>,
) -> Result<Option<Value>, ScriptError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ScriptError::Host {
            code: ErrorCode::NotFound,
            ..
        }) => Ok(None),
        Err(err) => Err(err),
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Arity { op, expected, got } => {
                write!(f, "{}() takes {} arguments ({} given)", op, expected, got)
            }
            ScriptError::Argument { op, index, name, error } => {
                write!(f, "{}() argument {} ({}): {}", op, index, name, error)
            }
            ScriptError::Host { op, code } => write!(f, "{} failed: {}", op, code),
            ScriptError::Contract { op, detail } => {
                write!(f, "{} broke the host contract: {}", op, detail)
            }
            ScriptError::UnknownOperation(name) => write!(f, "no host operation named {}", name),
        }
    }
}

enum Pending {
    Ready(Output),
    RefIds(usize),
    Str(usize),
}

/// Call `op` on `host` with dynamic script arguments.
///
/// Returns a tuple with one element per declared output (possibly empty).
/// Every host allocation the call produces is released exactly once,
/// whatever happens after the call returns.
pub fn call<H: HostSurface + ?Sized>(
    host: &mut H,
    op: &'static OpSchema,
    args: &[Value],
) -> Result<Value, ScriptError> {
    if args.len() != op.params.len() {
        return Err(ScriptError::Arity {
            op: op.symbol,
            expected: op.params.len(),
            got: args.len(),
        });
    }

    let typed = op
        .params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, value))| {
            decode_arg(param.ty, value).map_err(|error| ScriptError::Argument {
                op: op.symbol,
                index,
                name: param.name,
                error,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let raw = host
        .invoke(op.id, &typed)
        .map_err(|code| ScriptError::Host { op: op.symbol, code })?;

    // Adopt every allocation before anything else can fail.
    let mut guard = ReleaseGuard::new(host);
    let pending: Vec<Pending> = raw
        .into_iter()
        .map(|out| match out {
            RawOutput::Value(v) => Pending::Ready(v),
            RawOutput::RefIds(b) => Pending::RefIds(guard.hold(b)),
            RawOutput::Str(b) => Pending::Str(guard.hold(b)),
        })
        .collect();

    let contract = |detail: String| ScriptError::Contract { op: op.symbol, detail };

    if pending.len() != op.outputs.len() {
        return Err(contract(format!(
            "{} outputs declared, {} returned",
            op.outputs.len(),
            pending.len()
        )));
    }

    let mut outputs = Vec::with_capacity(pending.len());
    for (spec, slot) in op.outputs.iter().zip(pending) {
        let output = match (spec.ty, slot) {
            (OutputType::RefIdList, Pending::RefIds(ticket)) => guard
                .take_ref_ids(ticket)
                .map(Output::RefIds)
                .map_err(|code| ScriptError::Host { op: op.symbol, code })?,
            (OutputType::Str, Pending::Str(ticket)) => guard
                .take_str(ticket)
                .map(Output::Str)
                .map_err(|code| ScriptError::Host { op: op.symbol, code })?,
            (ty, Pending::Ready(v)) if v.ty() == ty => v,
            (ty, _) => {
                return Err(contract(format!(
                    "output {} should be {}",
                    spec.name,
                    ty.as_str()
                )))
            }
        };
        outputs.push(output);
    }

    Ok(encode_outputs(outputs))
}
