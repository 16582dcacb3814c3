//! Conversion between script values and typed call values.

use alloc::vec::Vec;

use slotlink_abi::{Arg, ConversionError, Output, ParamType, RefId, Value};

/// Decode one script value as a parameter of type `ty`.
pub fn decode_arg(ty: ParamType, value: &Value) -> Result<Arg, ConversionError> {
    Ok(match ty {
        ParamType::RefId => Arg::RefId(RefId::try_from(value)?),
        ParamType::Bool => Arg::Bool(bool::try_from(value)?),
        ParamType::Int => Arg::Int(i32::try_from(value)?),
        ParamType::Float => Arg::Float(f32::try_from(value)?),
        ParamType::Double => Arg::Double(f64::try_from(value)?),
        ParamType::Str => Arg::Str(alloc::string::String::try_from(value)?),
    })
}

/// Encode a call's outputs as the tuple returned to the script.
pub fn encode_outputs(outputs: Vec<Output>) -> Value {
    Value::tuple(outputs.into_iter().map(Value::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use slotlink_abi::TypeTag;

    #[test]
    fn decodes_by_declared_type() {
        assert_eq!(decode_arg(ParamType::RefId, &Value::U64(5)), Ok(Arg::RefId(RefId(5))));
        assert_eq!(decode_arg(ParamType::Bool, &Value::S64(2)), Ok(Arg::Bool(true)));
        assert_eq!(decode_arg(ParamType::Float, &Value::F64(0.5)), Ok(Arg::Float(0.5)));
        assert_eq!(
            decode_arg(ParamType::Str, &Value::from("Head")),
            Ok(Arg::Str("Head".into()))
        );
    }

    #[test]
    fn decode_never_truncates() {
        assert!(decode_arg(ParamType::Int, &Value::S64(i64::from(i32::MAX) + 1)).is_err());
        assert!(decode_arg(ParamType::RefId, &Value::F64(3.0)).is_err());
        assert!(decode_arg(ParamType::Str, &Value::U64(3)).is_err());
    }

    #[test]
    fn encodes_fixed_arity_tuples() {
        assert_eq!(encode_outputs(vec![]), Value::Tuple(vec![]));
        assert_eq!(
            encode_outputs(vec![Output::TypeTag(TypeTag::Double), Output::RefId(RefId(40))]),
            Value::Tuple(vec![Value::S64(3), Value::U64(40)])
        );
    }
}
