//! The host call surface, declared once.
//!
//! [`for_each_host_op!`] is the single source of truth for every operation the
//! host exposes: its wire symbol, the keepalive export that retains it in the
//! guest, its scripting namespace, its ordered parameters and its ordered
//! outputs. Adding an operation means adding one entry here; the guest
//! imports, the guest exports, the guest raw-call thunk, the host `env`
//! registration and [`SCHEMA`] all expand from the same list.
//!
//! The macro takes the name of a callback macro and invokes it with the whole
//! table:
//!
//! ```ignore
//! macro_rules! count_ops {
//!     ($( $variant:ident { $($body:tt)* } ),* $(,)?) => {
//!         [$( stringify!($variant) ),*].len()
//!     };
//! }
//! let n = slotlink_abi::for_each_host_op!(count_ops);
//! ```

use alloc::vec::Vec;
use core::fmt;

/// Invoke `$callback!` with the full operation table. The callback may be a
/// bare macro name or a path such as `$crate::some_macro`.
///
/// Each entry has the shape:
///
/// ```text
/// Variant {
///     symbol: wire_symbol,
///     export: "_wire_symbol",
///     namespace: Slot | Component | Value,
///     params: (name: ParamType, ...),
///     outputs: (name: OutputType, ...),
/// }
/// ```
#[macro_export]
macro_rules! for_each_host_op {
    ($($callback:tt)+) => {
        $($callback)+! {
            SlotRootSlot {
                symbol: slot__root_slot,
                export: "_slot__root_slot",
                namespace: Slot,
                params: (),
                outputs: (slot: RefId),
            },
            SlotGetParent {
                symbol: slot__get_parent,
                export: "_slot__get_parent",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (parent: RefId),
            },
            SlotGetActiveUser {
                symbol: slot__get_active_user,
                export: "_slot__get_active_user",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (user: RefId),
            },
            SlotGetActiveUserRoot {
                symbol: slot__get_active_user_root,
                export: "_slot__get_active_user_root",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (user_root: RefId),
            },
            SlotGetObjectRoot {
                symbol: slot__get_object_root,
                export: "_slot__get_object_root",
                namespace: Slot,
                params: (slot: RefId, only_explicit: Bool),
                outputs: (object_root: RefId),
            },
            SlotGetName {
                symbol: slot__get_name,
                export: "_slot__get_name",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (name: Str),
            },
            SlotSetName {
                symbol: slot__set_name,
                export: "_slot__set_name",
                namespace: Slot,
                params: (slot: RefId, name: Str),
                outputs: (),
            },
            SlotGetNumChildren {
                symbol: slot__get_num_children,
                export: "_slot__get_num_children",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (num_children: Int),
            },
            SlotGetChild {
                symbol: slot__get_child,
                export: "_slot__get_child",
                namespace: Slot,
                params: (slot: RefId, index: Int),
                outputs: (child: RefId),
            },
            SlotGetChildren {
                symbol: slot__get_children,
                export: "_slot__get_children",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (children: RefIdList),
            },
            SlotFindChildByName {
                symbol: slot__find_child_by_name,
                export: "_slot__find_child_by_name",
                namespace: Slot,
                params: (
                    slot: RefId,
                    name: Str,
                    match_substring: Bool,
                    ignore_case: Bool,
                    max_depth: Int
                ),
                outputs: (child: RefId),
            },
            SlotFindChildByTag {
                symbol: slot__find_child_by_tag,
                export: "_slot__find_child_by_tag",
                namespace: Slot,
                params: (slot: RefId, tag: Str, max_depth: Int),
                outputs: (child: RefId),
            },
            SlotGetComponent {
                symbol: slot__get_component,
                export: "_slot__get_component",
                namespace: Slot,
                params: (slot: RefId, type_name: Str),
                outputs: (component: RefId),
            },
            SlotGetComponents {
                symbol: slot__get_components,
                export: "_slot__get_components",
                namespace: Slot,
                params: (slot: RefId),
                outputs: (components: RefIdList),
            },
            ComponentGetTypeName {
                symbol: component__get_type_name,
                export: "_component__get_type_name",
                namespace: Component,
                params: (component: RefId),
                outputs: (type_name: Str),
            },
            ComponentGetMember {
                symbol: component__get_member,
                export: "_component__get_member",
                namespace: Component,
                params: (component: RefId, name: Str),
                outputs: (member_type: TypeTag, member: RefId),
            },
            ValueGetInt {
                symbol: value__get_int,
                export: "_value__get_int",
                namespace: Value,
                params: (ref_id: RefId),
                outputs: (value: Int),
            },
            ValueGetFloat {
                symbol: value__get_float,
                export: "_value__get_float",
                namespace: Value,
                params: (ref_id: RefId),
                outputs: (value: Float),
            },
            ValueGetDouble {
                symbol: value__get_double,
                export: "_value__get_double",
                namespace: Value,
                params: (ref_id: RefId),
                outputs: (value: Double),
            },
            ValueSetInt {
                symbol: value__set_int,
                export: "_value__set_int",
                namespace: Value,
                params: (ref_id: RefId, value: Int),
                outputs: (),
            },
            ValueSetFloat {
                symbol: value__set_float,
                export: "_value__set_float",
                namespace: Value,
                params: (ref_id: RefId, value: Float),
                outputs: (),
            },
            ValueSetDouble {
                symbol: value__set_double,
                export: "_value__set_double",
                namespace: Value,
                params: (ref_id: RefId, value: Double),
                outputs: (),
            },
        }
    };
}

/// Semantic type of an input parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ParamType {
    RefId,
    /// Narrowed to an `i32` (0 or 1) at the wire.
    Bool,
    Int,
    Float,
    Double,
    /// Borrowed NUL-terminated UTF-8, passed as a guest pointer.
    Str,
}

impl ParamType {
    pub fn wire(self) -> WireType {
        match self {
            ParamType::RefId => WireType::I64,
            ParamType::Bool | ParamType::Int | ParamType::Str => WireType::I32,
            ParamType::Float => WireType::F32,
            ParamType::Double => WireType::F64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::RefId => "refid",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Double => "double",
            ParamType::Str => "string",
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            ParamType::RefId => 0x01,
            ParamType::Bool => 0x02,
            ParamType::Int => 0x03,
            ParamType::Float => 0x04,
            ParamType::Double => 0x05,
            ParamType::Str => 0x06,
        }
    }
}

/// Semantic type of an output parameter. Every output is an out-pointer at
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OutputType {
    RefId,
    Int,
    Float,
    Double,
    /// Host-allocated NUL-terminated UTF-8; the caller takes ownership.
    Str,
    TypeTag,
    /// Host-allocated [`Buff`](crate::Buff) of reference IDs; the caller takes
    /// ownership.
    RefIdList,
}

impl OutputType {
    /// Number of bytes the host writes through the out-pointer.
    pub fn slot_size(self) -> usize {
        match self {
            OutputType::RefId | OutputType::Double => 8,
            OutputType::Int | OutputType::Float | OutputType::TypeTag => 4,
            OutputType::Str => 4,
            OutputType::RefIdList => crate::BUFF_SIZE,
        }
    }

    /// Whether the output transfers a host allocation to the caller.
    pub fn is_owned(self) -> bool {
        matches!(self, OutputType::Str | OutputType::RefIdList)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::RefId => "refid",
            OutputType::Int => "int",
            OutputType::Float => "float",
            OutputType::Double => "double",
            OutputType::Str => "string",
            OutputType::TypeTag => "type",
            OutputType::RefIdList => "list<refid>",
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            OutputType::RefId => 0x81,
            OutputType::Int => 0x82,
            OutputType::Float => 0x83,
            OutputType::Double => 0x84,
            OutputType::Str => 0x85,
            OutputType::TypeTag => 0x86,
            OutputType::RefIdList => 0x87,
        }
    }
}

/// Core wasm value type of a parameter at the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum WireType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireType::I32 => "i32",
            WireType::I64 => "i64",
            WireType::F32 => "f32",
            WireType::F64 => "f64",
        })
    }
}

/// Scripting namespace an operation is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Namespace {
    Slot,
    Component,
    Value,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Slot => "Slot",
            Namespace::Component => "Component",
            Namespace::Value => "Value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OutputSpec {
    pub name: &'static str,
    pub ty: OutputType,
}

/// Declarative description of one host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpSchema {
    pub id: OpId,
    /// Import name in the `env` module, also the scripting name.
    pub symbol: &'static str,
    /// Retained guest export forwarding to `symbol`.
    pub export: &'static str,
    pub namespace: Namespace,
    pub params: &'static [ParamSpec],
    pub outputs: &'static [OutputSpec],
}

impl OpSchema {
    /// The operation name without its namespace prefix (`get_parent` for
    /// `slot__get_parent`).
    pub fn method(&self) -> &'static str {
        match self.symbol.split_once("__") {
            Some((_, method)) => method,
            None => self.symbol,
        }
    }

    /// Wire parameter list: inputs in order, then one out-pointer per output.
    pub fn wire_params(&self) -> Vec<WireType> {
        self.params
            .iter()
            .map(|p| p.ty.wire())
            .chain(self.outputs.iter().map(|_| WireType::I32))
            .collect()
    }

    /// Every operation returns an `i32` error code.
    pub fn wire_result(&self) -> WireType {
        WireType::I32
    }
}

impl fmt::Display for OpSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.symbol)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", p.name, p.ty.as_str())?;
        }
        f.write_str(") -> (")?;
        for (i, o) in self.outputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", o.name, o.ty.as_str())?;
        }
        f.write_str(")")
    }
}

macro_rules! define_ops {
    ($(
        $variant:ident {
            symbol: $symbol:ident,
            export: $export:literal,
            namespace: $ns:ident,
            params: ( $( $p:ident : $pty:ident ),* $(,)? ),
            outputs: ( $( $o:ident : $oty:ident ),* $(,)? ),
        }
    ),* $(,)?) => {
        /// Identifies one host operation. Discriminants index [`SCHEMA`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum OpId {
            $( $variant, )*
        }

        /// Every host operation, in declaration order.
        pub static SCHEMA: &[OpSchema] = &[
            $(
                OpSchema {
                    id: OpId::$variant,
                    symbol: stringify!($symbol),
                    export: $export,
                    namespace: Namespace::$ns,
                    params: &[ $( ParamSpec { name: stringify!($p), ty: ParamType::$pty } ),* ],
                    outputs: &[ $( OutputSpec { name: stringify!($o), ty: OutputType::$oty } ),* ],
                },
            )*
        ];
    };
}

for_each_host_op!(define_ops);

impl OpId {
    pub fn schema(self) -> &'static OpSchema {
        &SCHEMA[self as usize]
    }

    pub fn symbol(self) -> &'static str {
        self.schema().symbol
    }

    /// Look up an operation by its wire symbol.
    pub fn from_symbol(symbol: &str) -> Option<OpId> {
        SCHEMA.iter().find(|op| op.symbol == symbol).map(|op| op.id)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_order_matches_op_ids() {
        for (i, op) in SCHEMA.iter().enumerate() {
            assert_eq!(op.id as usize, i, "{} is out of place", op.symbol);
            assert_eq!(op.id.schema().symbol, op.symbol);
        }
    }

    #[test]
    fn exports_are_underscore_prefixed_symbols() {
        for op in SCHEMA {
            assert_eq!(op.export.strip_prefix('_'), Some(op.symbol));
        }
    }

    #[test]
    fn symbols_are_unique() {
        for (i, a) in SCHEMA.iter().enumerate() {
            for b in &SCHEMA[i + 1..] {
                assert_ne!(a.symbol, b.symbol);
            }
        }
    }

    #[test]
    fn get_member_yields_type_then_handle() {
        let op = OpId::ComponentGetMember.schema();
        let outputs: Vec<_> = op.outputs.iter().map(|o| o.ty).collect();
        assert_eq!(outputs, [OutputType::TypeTag, OutputType::RefId]);
    }

    #[test]
    fn setters_have_no_outputs() {
        for id in [
            OpId::SlotSetName,
            OpId::ValueSetInt,
            OpId::ValueSetFloat,
            OpId::ValueSetDouble,
        ] {
            assert!(id.schema().outputs.is_empty(), "{id}");
        }
    }

    #[test]
    fn wire_params_append_out_pointers() {
        let op = OpId::SlotFindChildByName.schema();
        assert_eq!(
            op.wire_params(),
            [
                WireType::I64,
                WireType::I32,
                WireType::I32,
                WireType::I32,
                WireType::I32,
                WireType::I32,
            ]
        );
        assert_eq!(OpId::SlotRootSlot.schema().wire_params(), [WireType::I32]);
    }

    #[test]
    fn method_strips_namespace() {
        assert_eq!(OpId::SlotGetParent.schema().method(), "get_parent");
        assert_eq!(OpId::ValueSetDouble.schema().method(), "set_double");
        assert_eq!(OpId::ComponentGetMember.schema().namespace, Namespace::Component);
    }

    #[test]
    fn from_symbol_finds_declared_ops() {
        assert_eq!(OpId::from_symbol("slot__get_children"), Some(OpId::SlotGetChildren));
        assert_eq!(OpId::from_symbol("slot__explode"), None);
    }
}
