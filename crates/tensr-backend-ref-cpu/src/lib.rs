pub mod cpu;

pub use cpu::{CpuTensor, RefCpuBackend, TensorData};

/// Register the reference CPU backend with the global backend registry.
///
/// Called automatically via a static initializer; calling it again is
/// harmless.
pub fn register_ref_cpu_backend() {
    tensr::backend::registry::register_portable_backend("ref-cpu", RefCpuBackend::new);
}

#[cfg(not(target_family = "wasm"))]
#[used]
#[link_section = ".init_array"]
static REGISTER_REF_CPU_BACKEND: extern "C" fn() = {
    extern "C" fn register() {
        register_ref_cpu_backend();
    }
    register
};
