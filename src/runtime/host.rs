//! Host Function Registration API
//!
//! A builder over a wasmtime [`Linker`] for registering host functions by
//! import module, plus the guest-memory helpers those functions need.
//!
//! # Example
//!
//! ```ignore
//! let mut linker = Linker::new(&engine);
//! let mut builder = HostLinkerBuilder::new(&mut linker);
//! builder.on_error(|err| eprintln!("{err}"));
//! builder.interface("env")?
//!     .func_raw("tick", |_caller: Caller<'_, MyState>| -> i32 { 0 })?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use slotlink_abi::{GUEST_ALLOC_EXPORT, GUEST_FREE_EXPORT};
use thiserror::Error;
use tracing::warn;
use wasmtime::{Caller, Linker, Memory};

// ============================================================================
// Error Handling Infrastructure
// ============================================================================

/// Error that occurred while serving a host call.
///
/// These are plumbing failures (guest memory, guest allocator), not the
/// operation's own error codes; the guest only ever sees `HostFailure`.
#[derive(Debug, Clone)]
pub struct HostFunctionError {
    /// The import module (always `env` for the call surface)
    pub interface: String,
    /// The import name, e.g. `slot__get_name`
    pub function: String,
    pub kind: HostFunctionErrorKind,
}

impl std::fmt::Display for HostFunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "host function error in {}::{}: {}",
            self.interface, self.function, self.kind
        )
    }
}

impl std::error::Error for HostFunctionError {}

#[derive(Debug, Clone)]
pub enum HostFunctionErrorKind {
    /// Failed to read from guest memory
    MemoryRead(String),
    /// Failed to write to guest memory
    MemoryWrite(String),
    /// The guest allocator was missing or returned null
    Allocation(String),
    /// The handler's outputs do not match the operation's declared outputs
    Contract(String),
}

impl std::fmt::Display for HostFunctionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryRead(e) => write!(f, "memory read failed: {}", e),
            Self::MemoryWrite(e) => write!(f, "memory write failed: {}", e),
            Self::Allocation(e) => write!(f, "guest allocation failed: {}", e),
            Self::Contract(e) => write!(f, "handler broke the output contract: {}", e),
        }
    }
}

/// Handler for host function errors, for logging or metrics.
pub type ErrorHandler = Arc<dyn Fn(&HostFunctionError) + Send + Sync>;

fn default_error_handler(err: &HostFunctionError) {
    warn!("{}", err);
}

/// Reports errors for one registered function.
#[derive(Clone)]
pub struct Reporter {
    interface: String,
    function: String,
    handler: Option<ErrorHandler>,
}

impl Reporter {
    pub fn report(&self, kind: HostFunctionErrorKind) {
        let error = HostFunctionError {
            interface: self.interface.clone(),
            function: self.function.clone(),
            kind,
        };
        match &self.handler {
            Some(handler) => handler(&error),
            None => default_error_handler(&error),
        }
    }
}

/// Errors from linker operations
#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("Function registration failed: {0}")]
    FunctionRegistration(String),

    #[error("Memory error: {0}")]
    MemoryError(String),
}

// ============================================================================
// Guest memory access
// ============================================================================

/// Context wrapper giving host functions access to store data and guest
/// memory.
pub struct Ctx<'c, 'a, T> {
    caller: &'c mut Caller<'a, T>,
}

impl<'c, 'a, T> Ctx<'c, 'a, T> {
    pub fn new(caller: &'c mut Caller<'a, T>) -> Self {
        Self { caller }
    }

    pub fn data_mut(&mut self) -> &mut T {
        self.caller.data_mut()
    }

    fn memory(&mut self) -> Result<Memory, LinkerError> {
        self.caller
            .get_export("memory")
            .and_then(|e| e.into_memory())
            .ok_or_else(|| LinkerError::MemoryError("no memory export".into()))
    }

    pub fn memory_size(&mut self) -> Result<usize, LinkerError> {
        let memory = self.memory()?;
        Ok(memory.data_size(&*self.caller))
    }

    /// Read the bytes of a NUL-terminated string, without the NUL. `None`
    /// when no NUL occurs before the end of memory.
    pub fn read_c_bytes(&mut self, ptr: u32) -> Result<Option<Vec<u8>>, LinkerError> {
        let memory = self.memory()?;
        let data = memory.data(&*self.caller);
        let tail = data
            .get(ptr as usize..)
            .ok_or_else(|| LinkerError::MemoryError(format!("pointer {:#x} out of bounds", ptr)))?;
        Ok(tail
            .iter()
            .position(|b| *b == 0)
            .map(|end| tail[..end].to_vec()))
    }

    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), LinkerError> {
        let memory = self.memory()?;
        memory
            .write(&mut *self.caller, ptr as usize, bytes)
            .map_err(|e| LinkerError::MemoryError(e.to_string()))
    }

    /// Allocate `size` bytes through the guest's allocator export.
    pub fn guest_alloc(&mut self, size: usize) -> Result<u32, LinkerError> {
        let size = i32::try_from(size)
            .map_err(|_| LinkerError::MemoryError(format!("allocation of {} bytes", size)))?;
        let alloc = self
            .caller
            .get_export(GUEST_ALLOC_EXPORT)
            .and_then(|e| e.into_func())
            .ok_or_else(|| LinkerError::MemoryError(format!("no {} export", GUEST_ALLOC_EXPORT)))?
            .typed::<i32, i32>(&*self.caller)
            .map_err(|e| LinkerError::MemoryError(e.to_string()))?;
        let ptr = alloc
            .call(&mut *self.caller, size)
            .map_err(|e| LinkerError::MemoryError(e.to_string()))?;
        if ptr == 0 {
            return Err(LinkerError::MemoryError(format!(
                "{} returned null for {} bytes",
                GUEST_ALLOC_EXPORT, size
            )));
        }
        Ok(ptr as u32)
    }

    /// Free memory from [`guest_alloc`](Self::guest_alloc). Best effort: a
    /// guest without a free export keeps the memory.
    pub fn guest_free(&mut self, ptr: u32, size: usize) {
        let free = self
            .caller
            .get_export(GUEST_FREE_EXPORT)
            .and_then(|e| e.into_func())
            .and_then(|f| f.typed::<(i32, i32), ()>(&*self.caller).ok());
        if let Some(free) = free {
            let _ = free.call(&mut *self.caller, (ptr as i32, size as i32));
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for registering host functions with a Linker.
///
/// Generic over `T` which is the store data type.
pub struct HostLinkerBuilder<'a, T> {
    linker: &'a mut Linker<T>,
    error_handler: Option<ErrorHandler>,
    _marker: PhantomData<T>,
}

impl<'a, T> HostLinkerBuilder<'a, T> {
    pub fn new(linker: &'a mut Linker<T>) -> Self {
        Self {
            linker,
            error_handler: None,
            _marker: PhantomData,
        }
    }

    /// Set a custom error handler for host function errors.
    ///
    /// Without one, errors are logged with `tracing::warn!`.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&HostFunctionError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_error_handler(&mut self, handler: Option<ErrorHandler>) -> &mut Self {
        self.error_handler = handler;
        self
    }

    /// Start defining functions in the import module `name`.
    pub fn interface(&mut self, name: &str) -> Result<InterfaceBuilder<'_, 'a, T>, LinkerError> {
        let error_handler = self.error_handler.clone();
        Ok(InterfaceBuilder {
            linker: self,
            module_name: name.to_string(),
            error_handler,
        })
    }

    pub fn register_provider<P: HostFunctionProvider<T>>(
        &mut self,
        provider: &P,
    ) -> Result<&mut Self, LinkerError> {
        provider.register(self)?;
        Ok(self)
    }
}

/// Builder for registering functions within one import module.
pub struct InterfaceBuilder<'a, 'b, T> {
    linker: &'a mut HostLinkerBuilder<'b, T>,
    module_name: String,
    error_handler: Option<ErrorHandler>,
}

impl<'a, 'b, T: 'static> InterfaceBuilder<'a, 'b, T> {
    /// Error reporter for the function `name` in this module.
    pub fn reporter(&self, name: &str) -> Reporter {
        Reporter {
            interface: self.module_name.clone(),
            function: name.to_string(),
            handler: self.error_handler.clone(),
        }
    }

    /// Register a host function with direct wasm-level parameters.
    pub fn func_raw<Params, Results>(
        &mut self,
        name: &str,
        func: impl wasmtime::IntoFunc<T, Params, Results>,
    ) -> Result<&mut Self, LinkerError> {
        self.linker
            .linker
            .func_wrap(&self.module_name, name, func)
            .map_err(|e| LinkerError::FunctionRegistration(e.to_string()))?;
        Ok(self)
    }
}

/// Trait for types that provide host functions.
pub trait HostFunctionProvider<T> {
    fn register(&self, builder: &mut HostLinkerBuilder<'_, T>) -> Result<(), LinkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wasmtime::Engine;

    #[test]
    fn func_raw_registration() -> Result<(), LinkerError> {
        let engine = Engine::default();
        let mut linker = Linker::<()>::new(&engine);
        let mut builder = HostLinkerBuilder::new(&mut linker);

        builder
            .interface("env")?
            .func_raw("add", |_caller: Caller<'_, ()>, a: i32, b: i32| a + b)?;

        Ok(())
    }

    #[test]
    fn duplicate_registration_fails() {
        let engine = Engine::default();
        let mut linker = Linker::<()>::new(&engine);
        let mut builder = HostLinkerBuilder::new(&mut linker);
        let mut env = builder.interface("env").unwrap();
        env.func_raw("noop", |_: Caller<'_, ()>| {}).unwrap();
        assert!(matches!(
            env.func_raw("noop", |_: Caller<'_, ()>| {}),
            Err(LinkerError::FunctionRegistration(_))
        ));
    }

    #[test]
    fn reporter_uses_custom_handler() {
        let engine = Engine::default();
        let mut linker = Linker::<()>::new(&engine);
        let mut builder = HostLinkerBuilder::new(&mut linker);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        builder.on_error(move |err| sink.lock().unwrap().push(err.to_string()));

        let env = builder.interface("env").unwrap();
        env.reporter("slot__get_name")
            .report(HostFunctionErrorKind::Allocation("null".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("env::slot__get_name"));
    }

    struct TestProvider;

    impl HostFunctionProvider<()> for TestProvider {
        fn register(&self, builder: &mut HostLinkerBuilder<'_, ()>) -> Result<(), LinkerError> {
            builder
                .interface("test")?
                .func_raw("noop", |_: Caller<'_, ()>| {})?;
            Ok(())
        }
    }

    #[test]
    fn provider_registration() {
        let engine = Engine::default();
        let mut linker = Linker::<()>::new(&engine);
        let mut builder = HostLinkerBuilder::new(&mut linker);
        assert!(builder.register_provider(&TestProvider).is_ok());
    }
}
