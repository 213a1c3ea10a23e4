//! Runtime registry for selecting evaluation backends by name.
//!
//! Backends register a constructor under a string key; callers resolve the
//! key at runtime without naming concrete backend types. Handles cross the
//! erased boundary as `Box<dyn Any>` and are downcast internally.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use super::spec::{
    BackendError, BackendResult, Instruction, PortableBackend, Program, TensorInit, TensorLiteral,
};

/// Type-erased tensor handle.
pub type BackendHandle = Box<dyn Any + Send + Sync>;

/// Factory producing fresh erased backend instances.
pub type BackendConstructor = Box<dyn Fn() -> Box<dyn ErasedBackend> + Send + Sync>;

/// Object-safe facade over [`PortableBackend`] for dynamic dispatch.
pub trait ErasedBackend: Send + Sync {
    fn backend_name(&self) -> &str;

    fn materialize(&self, init: TensorInit) -> BackendResult<BackendHandle>;

    fn to_literal(&self, handle: &BackendHandle) -> BackendResult<TensorLiteral>;

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[BackendHandle],
    ) -> BackendResult<Vec<BackendHandle>>;

    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[BackendHandle],
    ) -> BackendResult<Vec<BackendHandle>>;

    fn clone_backend(&self) -> Box<dyn ErasedBackend>;

    fn as_any(&self) -> &dyn Any;
}

struct BackendWrapper<B: PortableBackend> {
    inner: Arc<B>,
}

impl<B: PortableBackend + 'static> BackendWrapper<B> {
    fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    fn downcast_handle<'a>(&self, handle: &'a BackendHandle) -> BackendResult<&'a B::TensorHandle> {
        handle.downcast_ref::<B::TensorHandle>().ok_or_else(|| {
            BackendError::execution(format!(
                "handle type mismatch for backend {}",
                self.inner.backend_name()
            ))
        })
    }

    fn downcast_handles(&self, handles: &[BackendHandle]) -> BackendResult<Vec<B::TensorHandle>> {
        handles
            .iter()
            .map(|handle| self.downcast_handle(handle).cloned())
            .collect()
    }
}

fn erase_handles<H: Send + Sync + 'static>(handles: Vec<H>) -> Vec<BackendHandle> {
    handles
        .into_iter()
        .map(|handle| Box::new(handle) as BackendHandle)
        .collect()
}

impl<B: PortableBackend + 'static> ErasedBackend for BackendWrapper<B> {
    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }

    fn materialize(&self, init: TensorInit) -> BackendResult<BackendHandle> {
        let handle = self.inner.materialize(init)?;
        Ok(Box::new(handle) as BackendHandle)
    }

    fn to_literal(&self, handle: &BackendHandle) -> BackendResult<TensorLiteral> {
        let typed = self.downcast_handle(handle)?;
        self.inner.to_literal(typed)
    }

    fn execute_instruction(
        &self,
        instruction: &Instruction,
        inputs: &[BackendHandle],
    ) -> BackendResult<Vec<BackendHandle>> {
        let typed_inputs = self.downcast_handles(inputs)?;
        let outputs = self.inner.execute_instruction(instruction, &typed_inputs)?;
        Ok(erase_handles(outputs))
    }

    fn run_program(
        &self,
        program: &Program,
        entry_inputs: &[BackendHandle],
    ) -> BackendResult<Vec<BackendHandle>> {
        let typed_inputs = self.downcast_handles(entry_inputs)?;
        let outputs = self.inner.run_program(program, &typed_inputs)?;
        Ok(erase_handles(outputs))
    }

    fn clone_backend(&self) -> Box<dyn ErasedBackend> {
        Box::new(BackendWrapper {
            inner: Arc::clone(&self.inner),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct BackendRegistry {
    backends: RwLock<HashMap<String, BackendConstructor>>,
}

impl BackendRegistry {
    fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
        }
    }
}

static GLOBAL_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

fn global_registry() -> &'static BackendRegistry {
    GLOBAL_REGISTRY.get_or_init(BackendRegistry::new)
}

/// Registers an erased backend constructor under `name`.
///
/// The constructor runs on every [`create_backend`] call for that name.
pub fn register_backend<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Box<dyn ErasedBackend> + Send + Sync + 'static,
{
    global_registry()
        .backends
        .write()
        .unwrap()
        .insert(name.into(), Box::new(constructor));
}

/// Registers a concrete [`PortableBackend`], wrapping it for erased dispatch.
pub fn register_portable_backend<B, F>(name: impl Into<String>, constructor: F)
where
    B: PortableBackend + 'static,
    F: Fn() -> B + Send + Sync + 'static,
{
    register_backend(name, move || Box::new(BackendWrapper::new(constructor())));
}

/// Creates a backend instance by name, or `None` if unregistered.
pub fn create_backend(name: &str) -> Option<Box<dyn ErasedBackend>> {
    let registry = global_registry().backends.read().unwrap();
    let constructor = registry.get(name)?;
    Some(constructor())
}

/// Lists every registered backend name.
pub fn list_backends() -> Vec<String> {
    global_registry()
        .backends
        .read()
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

/// Reports whether a backend with the given name is registered.
pub fn has_backend(name: &str) -> bool {
    global_registry().backends.read().unwrap().contains_key(name)
}

/// Recovers the concrete backend behind an erased one.
///
/// Needed when constructing typed device tensors from a runtime-selected
/// backend.
pub fn get_typed_backend<B: PortableBackend + 'static>(
    backend: &dyn ErasedBackend,
) -> Option<Arc<B>> {
    backend
        .as_any()
        .downcast_ref::<BackendWrapper<B>>()
        .map(|wrapper| Arc::clone(&wrapper.inner))
}
