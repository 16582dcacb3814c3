//! Interface enforcement - validate guest modules against the call surface
//!
//! A guest built against a different table would link against functions of
//! the wrong shape and silently misread its outputs, so modules are checked
//! before they are instantiated.

use slotlink_abi::{
    OpId, WireType, GUEST_ALLOC_EXPORT, GUEST_FREE_EXPORT, GUEST_SURFACE_EXPORT, HOST_MODULE,
};
use thiserror::Error;
use wasmtime::{ExternType, FuncType, Module, ValType};

/// Errors from interface validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterfaceError {
    #[error("Import '{module}::{name}' is not provided by the host")]
    UnknownImport { module: String, name: String },

    #[error("Import '{name}' must be a function")]
    NotAFunction { name: String },

    #[error("Function '{name}' has wrong signature: expected {expected}, got {actual}")]
    SignatureMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Missing memory export 'memory'")]
    MissingMemory,

    #[error("Missing export '{name}' with signature {expected}")]
    MissingExport { name: String, expected: String },
}

/// The operations `module` imports from the host, in import order.
///
/// Every import must be an `env` function from the call surface with
/// exactly the wire signature of its operation.
pub fn imported_ops(module: &Module) -> Result<Vec<OpId>, InterfaceError> {
    let mut ops = Vec::new();
    for import in module.imports() {
        let name = import.name();
        let op = match OpId::from_symbol(name) {
            Some(op) if import.module() == HOST_MODULE => op,
            _ => {
                return Err(InterfaceError::UnknownImport {
                    module: import.module().to_string(),
                    name: name.to_string(),
                })
            }
        };
        let ExternType::Func(ty) = import.ty() else {
            return Err(InterfaceError::NotAFunction {
                name: name.to_string(),
            });
        };
        let schema = op.schema();
        check_signature(name, &ty, &schema.wire_params(), &[schema.wire_result()])?;
        ops.push(op);
    }
    Ok(ops)
}

/// Check everything the host needs from `module` before it can serve calls.
///
/// Beyond [`imported_ops`]: the module must export `memory`; if it imports
/// an operation that hands back strings or lists, it must export the guest
/// allocator; and optional exports, when present, must have the right shape.
pub fn validate_module(module: &Module) -> Result<Vec<OpId>, InterfaceError> {
    let ops = imported_ops(module)?;

    if !matches!(module.get_export("memory"), Some(ExternType::Memory(_))) {
        return Err(InterfaceError::MissingMemory);
    }

    let alloc = module.get_export(GUEST_ALLOC_EXPORT);
    if alloc.is_none() && super::env::needs_guest_alloc(&ops) {
        return Err(InterfaceError::MissingExport {
            name: GUEST_ALLOC_EXPORT.to_string(),
            expected: describe(&[WireType::I32], &[WireType::I32]),
        });
    }

    let optional: [(&str, &[WireType], &[WireType]); 3] = [
        (GUEST_ALLOC_EXPORT, &[WireType::I32], &[WireType::I32]),
        (GUEST_FREE_EXPORT, &[WireType::I32, WireType::I32], &[]),
        (GUEST_SURFACE_EXPORT, &[], &[WireType::I64]),
    ];
    for (name, params, results) in optional {
        match module.get_export(name) {
            None => {}
            Some(ExternType::Func(ty)) => check_signature(name, &ty, params, results)?,
            Some(_) => {
                return Err(InterfaceError::NotAFunction {
                    name: name.to_string(),
                })
            }
        }
    }

    Ok(ops)
}

fn check_signature(
    name: &str,
    ty: &FuncType,
    params: &[WireType],
    results: &[WireType],
) -> Result<(), InterfaceError> {
    let actual_params: Vec<ValType> = ty.params().collect();
    let actual_results: Vec<ValType> = ty.results().collect();
    let same = |actual: &[ValType], expected: &[WireType]| {
        actual.len() == expected.len()
            && actual.iter().zip(expected).all(|(a, e)| is_wire(a, *e))
    };
    if same(&actual_params, params) && same(&actual_results, results) {
        return Ok(());
    }
    Err(InterfaceError::SignatureMismatch {
        name: name.to_string(),
        expected: describe(params, results),
        actual: format!(
            "({}) -> ({})",
            actual_params.iter().map(val_type_name).collect::<Vec<_>>().join(", "),
            actual_results.iter().map(val_type_name).collect::<Vec<_>>().join(", ")
        ),
    })
}

fn is_wire(ty: &ValType, wire: WireType) -> bool {
    matches!(
        (ty, wire),
        (ValType::I32, WireType::I32)
            | (ValType::I64, WireType::I64)
            | (ValType::F32, WireType::F32)
            | (ValType::F64, WireType::F64)
    )
}

fn val_type_name(ty: &ValType) -> String {
    match ty {
        ValType::I32 => "i32".to_string(),
        ValType::I64 => "i64".to_string(),
        ValType::F32 => "f32".to_string(),
        ValType::F64 => "f64".to_string(),
        other => format!("{:?}", other),
    }
}

fn describe(params: &[WireType], results: &[WireType]) -> String {
    let join = |tys: &[WireType]| {
        tys.iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("({}) -> ({})", join(params), join(results))
}
