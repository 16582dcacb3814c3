//! Wire-level types of the host call surface.
//!
//! These are bit-exact: guest and host must agree on every width and every
//! discriminant, since a mismatch is silent type confusion rather than a
//! caught error.

use core::fmt;

/// Opaque handle to a host-side entity (slot, component, member, user).
///
/// The guest never dereferences it; only the host decides whether it is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct RefId(pub u64);

impl RefId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for RefId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<RefId> for u64 {
    fn from(id: RefId) -> Self {
        id.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID{:X}", self.0)
    }
}

/// Size in bytes of a reference ID in guest memory.
pub const REF_ID_SIZE: usize = 8;

/// Concrete type of a component member, returned next to its reference ID so
/// the caller knows which value accessor to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum TypeTag {
    Unknown = 0,
    Int = 1,
    Float = 2,
    Double = 3,
}

impl TypeTag {
    /// Unrecognized codes decode as `Unknown`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => TypeTag::Int,
            2 => TypeTag::Float,
            3 => TypeTag::Double,
            _ => TypeTag::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Result code returned by every host call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    /// A required pointer argument (string or out-parameter) was null.
    NullArgument = 1,
    /// A reference ID no longer denotes a live host entity.
    InvalidHandle = 2,
    /// Catch-all for host-side failures outside the other categories.
    HostFailure = 3,
    /// A name, tag or type lookup exhausted its search without a match.
    NotFound = 4,
    /// A member or value was accessed with the wrong accessor.
    TypeMismatch = 5,
    /// A malformed string or out-of-range index.
    InvalidArgument = 6,
}

impl ErrorCode {
    /// Unknown codes are treated as `HostFailure`, never as success.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ErrorCode::Success,
            1 => ErrorCode::NullArgument,
            2 => ErrorCode::InvalidHandle,
            4 => ErrorCode::NotFound,
            5 => ErrorCode::TypeMismatch,
            6 => ErrorCode::InvalidArgument,
            _ => ErrorCode::HostFailure,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// Turn the code into a `Result`, so callers branch on the code rather
    /// than on whatever the out-parameters happen to hold.
    pub fn check(self) -> Result<(), ErrorCode> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::NullArgument => "null argument",
            ErrorCode::InvalidHandle => "invalid handle",
            ErrorCode::HostFailure => "host failure",
            ErrorCode::NotFound => "not found",
            ErrorCode::TypeMismatch => "type mismatch",
            ErrorCode::InvalidArgument => "invalid argument",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffer descriptor as laid out in guest linear memory.
///
/// `ptr` addresses `len` consecutive little-endian `u64` reference IDs. An
/// empty list is `{ ptr: 0, len: 0 }` and owns no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Buff {
    pub ptr: u32,
    pub len: i32,
}

/// Size in bytes of a [`Buff`] in guest memory.
pub const BUFF_SIZE: usize = 8;

impl Buff {
    pub const EMPTY: Buff = Buff { ptr: 0, len: 0 };

    pub fn is_empty(&self) -> bool {
        self.ptr == 0 || self.len <= 0
    }

    /// Encode for writing into guest memory.
    pub fn to_le_bytes(&self) -> [u8; BUFF_SIZE] {
        let mut bytes = [0u8; BUFF_SIZE];
        bytes[0..4].copy_from_slice(&self.ptr.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.len.to_le_bytes());
        bytes
    }

    pub fn from_le_bytes(bytes: [u8; BUFF_SIZE]) -> Self {
        Buff {
            ptr: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            len: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}
