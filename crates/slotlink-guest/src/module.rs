//! The `resonitenative` registration table.

use alloc::string::ToString;
use hashbrown::HashMap;

use slotlink_abi::{OpSchema, Value, SCHEMA, SCRIPT_MODULE_NAME};

use crate::dispatch::{self, ScriptError};
use crate::surface::HostSurface;

/// The scripting module: one entry per host operation, keyed by its wire
/// symbol, all served by the generic dispatcher.
pub struct Module {
    name: &'static str,
    entries: HashMap<&'static str, &'static OpSchema>,
}

impl Module {
    pub fn new() -> Self {
        Self::from_schema(SCRIPT_MODULE_NAME, SCHEMA)
    }

    /// Build a module over an arbitrary operation table.
    pub fn from_schema(name: &'static str, ops: &'static [OpSchema]) -> Self {
        let entries = ops.iter().map(|op| (op.symbol, op)).collect();
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&'static OpSchema> {
        self.entries.get(symbol).copied()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &'static OpSchema> + '_ {
        let mut ops: alloc::vec::Vec<_> = self.entries.values().copied().collect();
        ops.sort_by_key(|op| op.id);
        ops.into_iter()
    }

    /// Call the operation registered as `symbol`.
    pub fn call<H: HostSurface + ?Sized>(
        &self,
        host: &mut H,
        symbol: &str,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let op = self
            .get(symbol)
            .ok_or_else(|| ScriptError::UnknownOperation(symbol.to_string()))?;
        dispatch::call(host, op, args)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use alloc::vec;
    use slotlink_abi::{ErrorCode, OpId, Output, RefId};

    #[test]
    fn registers_every_operation_under_its_symbol() {
        let module = Module::new();
        assert_eq!(module.name(), "resonitenative");
        assert_eq!(module.len(), SCHEMA.len());
        for op in SCHEMA {
            assert_eq!(module.get(op.symbol).map(|o| o.id), Some(op.id));
        }
    }

    #[test]
    fn entries_follow_declaration_order() {
        let module = Module::new();
        let symbols: vec::Vec<_> = module.entries().map(|op| op.symbol).collect();
        let declared: vec::Vec<_> = SCHEMA.iter().map(|op| op.symbol).collect();
        assert_eq!(symbols, declared);
    }

    #[test]
    fn unknown_names_are_reported() {
        let module = Module::new();
        let mut host = FakeHost::new();
        let err = module.call(&mut host, "slot__teleport", &[]).unwrap_err();
        assert_eq!(err, ScriptError::UnknownOperation("slot__teleport".into()));
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(host.calls.is_empty());
    }

    #[test]
    fn call_routes_through_the_dispatcher() {
        let module = Module::new();
        let mut host = FakeHost::new();
        host.respond_values(vec![Output::RefId(RefId(1))]);
        let out = module.call(&mut host, "slot__root_slot", &[]).unwrap();
        assert_eq!(out, Value::Tuple(vec![Value::U64(1)]));
        assert_eq!(host.calls[0].0, OpId::SlotRootSlot);
    }
}
