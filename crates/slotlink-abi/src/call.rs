//! Typed inputs and outputs of a host call.
//!
//! `Arg` and `Output` replace the raw out-parameter convention in the typed
//! layers: a call is `(OpId, &[Arg]) -> Result<Vec<Output>, ErrorCode>`, so
//! there is no state where an error code sits next to half-written outputs.

use alloc::string::String;
use alloc::vec::Vec;

use crate::schema::{OutputType, ParamType};
use crate::types::{ErrorCode, RefId, TypeTag};

/// A decoded input parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    RefId(RefId),
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Arg {
    pub fn ty(&self) -> ParamType {
        match self {
            Arg::RefId(_) => ParamType::RefId,
            Arg::Bool(_) => ParamType::Bool,
            Arg::Int(_) => ParamType::Int,
            Arg::Float(_) => ParamType::Float,
            Arg::Double(_) => ParamType::Double,
            Arg::Str(_) => ParamType::Str,
        }
    }
}

/// A fully populated output of a successful host call.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    RefId(RefId),
    Int(i32),
    Float(f32),
    Double(f64),
    Str(String),
    TypeTag(TypeTag),
    RefIds(Vec<RefId>),
}

impl Output {
    pub fn ty(&self) -> OutputType {
        match self {
            Output::RefId(_) => OutputType::RefId,
            Output::Int(_) => OutputType::Int,
            Output::Float(_) => OutputType::Float,
            Output::Double(_) => OutputType::Double,
            Output::Str(_) => OutputType::Str,
            Output::TypeTag(_) => OutputType::TypeTag,
            Output::RefIds(_) => OutputType::RefIdList,
        }
    }
}

/// Positional access to a call's arguments for host-side handlers.
///
/// A missing argument or one of the wrong type is reported as
/// `InvalidArgument`; the guest dispatcher has already validated types, so
/// this only fires for hand-built calls.
pub struct ArgReader<'a> {
    args: &'a [Arg],
}

impl<'a> ArgReader<'a> {
    pub fn new(args: &'a [Arg]) -> Self {
        Self { args }
    }

    fn get(&self, index: usize) -> Result<&'a Arg, ErrorCode> {
        self.args.get(index).ok_or(ErrorCode::InvalidArgument)
    }

    pub fn ref_id(&self, index: usize) -> Result<RefId, ErrorCode> {
        match self.get(index)? {
            Arg::RefId(id) => Ok(*id),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn bool(&self, index: usize) -> Result<bool, ErrorCode> {
        match self.get(index)? {
            Arg::Bool(b) => Ok(*b),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn int(&self, index: usize) -> Result<i32, ErrorCode> {
        match self.get(index)? {
            Arg::Int(n) => Ok(*n),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn float(&self, index: usize) -> Result<f32, ErrorCode> {
        match self.get(index)? {
            Arg::Float(x) => Ok(*x),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn double(&self, index: usize) -> Result<f64, ErrorCode> {
        match self.get(index)? {
            Arg::Double(x) => Ok(*x),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn str(&self, index: usize) -> Result<&'a str, ErrorCode> {
        match self.get(index)? {
            Arg::Str(s) => Ok(s.as_str()),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn reader_checks_position_and_type() {
        let args = [Arg::RefId(RefId(7)), Arg::Str("Head".to_string()), Arg::Int(2)];
        let reader = ArgReader::new(&args);

        assert_eq!(reader.ref_id(0), Ok(RefId(7)));
        assert_eq!(reader.str(1), Ok("Head"));
        assert_eq!(reader.int(2), Ok(2));
        assert_eq!(reader.int(1), Err(ErrorCode::InvalidArgument));
        assert_eq!(reader.bool(3), Err(ErrorCode::InvalidArgument));
    }

    #[test]
    fn output_reports_its_type() {
        assert_eq!(Output::RefIds(Vec::new()).ty(), OutputType::RefIdList);
        assert_eq!(Output::TypeTag(TypeTag::Int).ty(), OutputType::TypeTag);
        assert_eq!(Arg::Bool(true).ty(), ParamType::Bool);
    }
}
