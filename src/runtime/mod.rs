//! Guest Runtime
//!
//! Loads guest modules, checks them against the call surface, links the
//! `env` import module and runs exports.
//!
//! ```ignore
//! let runtime = Runtime::new();
//! let module = runtime.load_module(&wasm_bytes)?;
//! let mut instance = module.instantiate(World::default())?;
//! instance.call("run", &[])?;
//! let world = instance.into_handler();
//! ```

mod env;
mod host;
mod interface_check;
mod invoke;

pub use env::{needs_guest_alloc, serve, EnvProvider, HostState, WireValue};
pub use host::{
    Ctx, ErrorHandler, HostFunctionError, HostFunctionErrorKind, HostFunctionProvider,
    HostLinkerBuilder, InterfaceBuilder, LinkerError, Reporter,
};
pub use interface_check::{imported_ops, validate_module, InterfaceError};

use std::sync::Arc;

use slotlink_abi::{surface_fingerprint, OpId, GUEST_SURFACE_EXPORT};
use thiserror::Error;
use tracing::{debug, info};
use wasmtime::{
    Config, Engine, Instance as WasmtimeInstance, Linker, Memory, Module, Store, Val, WasmParams,
    WasmResults,
};

use crate::handler::HostCallHandler;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("WASM execution error: {0}")]
    WasmError(String),

    #[error("Memory error: {0}")]
    MemoryError(String),

    #[error("Interface error: {0}")]
    Interface(#[from] InterfaceError),

    #[error("Guest was built against surface {guest:016x}, host provides {host:016x}")]
    SurfaceMismatch { guest: u64, host: u64 },

    #[error("Invalid call: {0}")]
    InvalidCall(String),
}

/// Settings shared by every module a [`Runtime`] loads.
#[derive(Clone, Default)]
pub struct RuntimeConfig {
    /// Fuel given to each instance; `None` runs without metering.
    pub fuel: Option<u64>,
    /// Receives host plumbing errors; defaults to a `tracing` warning.
    pub error_handler: Option<ErrorHandler>,
}

impl RuntimeConfig {
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HostFunctionError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

/// The guest runtime
pub struct Runtime {
    engine: Engine,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let mut wasm_config = Config::new();
        wasm_config.consume_fuel(config.fuel.is_some());
        let engine =
            Engine::new(&wasm_config).map_err(|e| RuntimeError::WasmError(e.to_string()))?;
        Ok(Self { engine, config })
    }

    /// Load a WASM module from bytes (binary or text format)
    pub fn load_module(&self, wasm_bytes: &[u8]) -> Result<CompiledModule<'_>, RuntimeError> {
        let module = Module::new(&self.engine, wasm_bytes)
            .map_err(|e| RuntimeError::WasmError(e.to_string()))?;
        Ok(CompiledModule {
            module,
            runtime: self,
        })
    }

}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled guest module
pub struct CompiledModule<'a> {
    module: Module,
    runtime: &'a Runtime,
}

impl<'a> CompiledModule<'a> {
    /// Operations the module imports, after checking their signatures.
    pub fn imported_ops(&self) -> Result<Vec<OpId>, RuntimeError> {
        Ok(imported_ops(&self.module)?)
    }

    /// Run every pre-instantiation check.
    pub fn validate(&self) -> Result<Vec<OpId>, RuntimeError> {
        Ok(validate_module(&self.module)?)
    }

    /// Instantiate the module with `handler` serving its host calls.
    ///
    /// If the guest exports a surface fingerprint it must match the host's.
    pub fn instantiate<H: HostCallHandler + 'static>(
        &self,
        handler: H,
    ) -> Result<Instance<H>, RuntimeError> {
        let ops = self.validate()?;
        let engine = &self.runtime.engine;

        let mut linker = Linker::new(engine);
        let mut builder = HostLinkerBuilder::new(&mut linker);
        builder.with_error_handler(self.runtime.config.error_handler.clone());
        builder
            .register_provider(&EnvProvider::<H>::new())
            .map_err(|e| RuntimeError::WasmError(e.to_string()))?;

        let mut store = Store::new(engine, HostState::new(handler));
        if let Some(fuel) = self.runtime.config.fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::WasmError(e.to_string()))?;
        }

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| RuntimeError::WasmError(e.to_string()))?;

        let mut instance = Instance { store, instance };
        instance.check_surface()?;
        info!(imports = ops.len(), "guest instantiated");
        Ok(instance)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }
}

/// A running guest
pub struct Instance<H> {
    store: Store<HostState<H>>,
    instance: WasmtimeInstance,
}

impl<H: 'static> Instance<H> {
    fn check_surface(&mut self) -> Result<(), RuntimeError> {
        let Some(func) = self.instance.get_func(&mut self.store, GUEST_SURFACE_EXPORT) else {
            debug!("guest exports no surface fingerprint");
            return Ok(());
        };
        let func = func
            .typed::<(), i64>(&self.store)
            .map_err(|e| RuntimeError::TypeMismatch(e.to_string()))?;
        let guest = func
            .call(&mut self.store, ())
            .map_err(|e| RuntimeError::WasmError(e.to_string()))? as u64;
        let host = surface_fingerprint().short();
        if guest != host {
            return Err(RuntimeError::SurfaceMismatch { guest, host });
        }
        Ok(())
    }

    pub fn handler(&self) -> &H {
        &self.store.data().handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.store.data_mut().handler
    }

    pub fn into_handler(self) -> H {
        self.store.into_data().handler
    }

    /// Fuel left, when the runtime meters execution.
    pub fn fuel_remaining(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    /// Get the exported memory (assumes it's named "memory")
    fn get_memory(&mut self) -> Result<Memory, RuntimeError> {
        self.instance
            .get_memory(&mut self.store, "memory")
            .ok_or_else(|| RuntimeError::MemoryError("no exported memory named 'memory'".into()))
    }

    /// Write bytes to the instance's memory at the given offset
    pub fn write_memory(&mut self, offset: usize, data: &[u8]) -> Result<(), RuntimeError> {
        let memory = self.get_memory()?;
        memory
            .write(&mut self.store, offset, data)
            .map_err(|e| RuntimeError::MemoryError(e.to_string()))
    }

    /// Read bytes from the instance's memory
    pub fn read_memory(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, RuntimeError> {
        let memory = self.get_memory()?;
        let mut buffer = vec![0u8; len];
        memory
            .read(&self.store, offset, &mut buffer)
            .map_err(|e| RuntimeError::MemoryError(e.to_string()))?;
        Ok(buffer)
    }

    /// Get the current memory size in bytes
    pub fn memory_size(&mut self) -> Result<usize, RuntimeError> {
        let memory = self.get_memory()?;
        Ok(memory.data_size(&self.store))
    }

    /// Call an export with a statically known signature.
    pub fn call_typed<P, R>(&mut self, name: &str, params: P) -> Result<R, RuntimeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .map_err(|e| RuntimeError::FunctionNotFound(e.to_string()))?;

        func.call(&mut self.store, params)
            .map_err(|e| RuntimeError::WasmError(e.to_string()))
    }

    /// Call an export by name with dynamically typed arguments.
    pub fn call(&mut self, name: &str, args: &[Val]) -> Result<Vec<Val>, RuntimeError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| RuntimeError::FunctionNotFound(name.to_string()))?;
        let ty = func.ty(&self.store);
        if ty.params().len() != args.len() {
            return Err(RuntimeError::TypeMismatch(format!(
                "{} takes {} arguments, got {}",
                name,
                ty.params().len(),
                args.len()
            )));
        }
        let mut results = vec![Val::I32(0); ty.results().len()];
        debug!(name, args = args.len(), "calling guest export");
        func.call(&mut self.store, args, &mut results)
            .map_err(|e| RuntimeError::WasmError(e.to_string()))?;
        Ok(results)
    }
}
