use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("requesting the GPU device failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// Kernels are not optional - when one fails to build, the render cannot
    /// proceed and the failure surfaces with the kernel's name attached.
    #[error("compiling kernel `{kernel}` failed: {source}")]
    KernelCompilation {
        kernel: String,
        #[source]
        source: KernelCompilationError,
    },

    #[error("reading back `{label}` failed; the device was probably lost")]
    Readback { label: String },
}

#[derive(Debug, Error)]
pub enum KernelCompilationError {
    #[error("couldn't read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid SPIR-V module: {0}")]
    Validation(String),

    #[error("the compilation thread panicked")]
    Panicked,
}
