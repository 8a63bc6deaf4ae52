use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use fxhash::FxHashMap;
use log::{debug, info, warn};

use crate::{Error, KernelCompilationError};

/// Compile-time configuration of a kernel: preprocessor-style macros plus
/// include directories, both folded into the cache key.
///
/// Macros live in an ordered map so that two configurations assembled in a
/// different order still produce the same key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelOptions {
    macros: BTreeMap<String, String>,
    include_dirs: Vec<PathBuf>,
}

impl KernelOptions {
    pub fn set_macro(
        &mut self,
        name: impl ToString,
        value: impl ToString,
    ) -> &mut Self {
        self.macros.insert(name.to_string(), value.to_string());
        self
    }

    pub fn remove_macro(&mut self, name: &str) -> &mut Self {
        self.macros.remove(name);
        self
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Returns the key this configuration of given kernel gets cached under.
    pub fn cache_key(&self, kernel: &str) -> u64 {
        let mut repr = kernel.to_owned();

        for (name, value) in &self.macros {
            _ = write!(repr, " -D{name}={value}");
        }

        for dir in &self.include_dirs {
            _ = write!(repr, " -I{}", dir.display());
        }

        fxhash::hash64(&repr)
    }
}

/// Where a kernel's SPIR-V comes from.
#[derive(Clone, Debug)]
pub enum KernelSource {
    /// Artifact produced by the shader builder, loaded lazily so that a
    /// missing file surfaces as a compilation error, not a panic.
    File(PathBuf),

    /// SPIR-V embedded by the caller.
    Bytes(Vec<u8>),
}

impl KernelSource {
    fn load(&self) -> Result<Vec<u8>, KernelCompilationError> {
        match self {
            Self::File(path) => std::fs::read(path).map_err(|source| {
                KernelCompilationError::Io {
                    path: path.clone(),
                    source,
                }
            }),

            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug)]
pub struct CompiledKernel {
    name: String,
    module: wgpu::ShaderModule,
    word_count: u32,
}

impl CompiledKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub fn word_count(&self) -> u32 {
        self.word_count
    }
}

/// Cache of compiled kernels, keyed by [`KernelOptions::cache_key`]; toggling
/// a macro back and forth reuses the entries instead of recompiling.
#[derive(Debug, Default)]
pub struct KernelCache {
    kernels: FxHashMap<u64, CompiledKernel>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.kernels.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&CompiledKernel> {
        self.kernels.get(&key)
    }

    pub fn insert(&mut self, key: u64, kernel: CompiledKernel) {
        debug!("Caching kernel `{}` under {key:#018x}", kernel.name());

        self.kernels.insert(key, kernel);
    }

    /// Size of given kernel's SPIR-V module, in 32-bit words; querying a
    /// kernel that hasn't been compiled is allowed and returns zero.
    pub fn word_count(&self, key: u64, name: &str) -> u32 {
        match self.kernels.get(&key) {
            Some(kernel) => kernel.word_count(),
            None => {
                warn!(
                    "Querying word count of kernel `{name}` which hasn't \
                     been compiled yet; returning 0"
                );

                0
            }
        }
    }
}

/// Handle to a kernel being compiled off-thread; the renderer starts those
/// eagerly and joins them right before the first launch that needs them.
#[derive(Debug)]
pub struct PendingKernel {
    name: String,
    key: u64,
    handle: JoinHandle<Result<CompiledKernel, KernelCompilationError>>,
}

impl PendingKernel {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn join(self) -> Result<CompiledKernel, Error> {
        match self.handle.join() {
            Ok(Ok(kernel)) => Ok(kernel),

            Ok(Err(source)) => Err(Error::KernelCompilation {
                kernel: self.name,
                source,
            }),

            Err(_) => Err(Error::KernelCompilation {
                kernel: self.name,
                source: KernelCompilationError::Panicked,
            }),
        }
    }
}

pub fn compile_in_background(
    device: &wgpu::Device,
    name: impl ToString,
    source: &KernelSource,
    options: &KernelOptions,
) -> PendingKernel {
    let name = name.to_string();
    let key = options.cache_key(&name);

    debug!("Compiling kernel `{name}` in the background; key={key:#018x}");

    let handle = {
        let device = device.clone();
        let name = name.clone();
        let source = source.clone();

        thread::spawn(move || compile(&device, &name, &source))
    };

    PendingKernel { name, key, handle }
}

fn compile(
    device: &wgpu::Device,
    name: &str,
    source: &KernelSource,
) -> Result<CompiledKernel, KernelCompilationError> {
    let started = Instant::now();
    let bytes = source.load()?;

    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(KernelCompilationError::Validation(format!(
            "module size ({}) is not a positive multiple of four bytes",
            bytes.len(),
        )));
    }

    // `create_shader_module` reports problems through the error-scope
    // mechanism, not a return value
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::util::make_spirv(&bytes),
    });

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(KernelCompilationError::Validation(error.to_string()));
    }

    info!("Compiled kernel `{name}` in {:?}", started.elapsed());

    Ok(CompiledKernel {
        name: name.to_owned(),
        module,
        word_count: (bytes.len() / 4) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_macro_insertion_order() {
        let mut a = KernelOptions::default();
        let mut b = KernelOptions::default();

        a.set_macro("FOO", 1).set_macro("BAR", 2);
        b.set_macro("BAR", 2).set_macro("FOO", 1);

        assert_eq!(a.cache_key("path_tracing"), b.cache_key("path_tracing"));
    }

    #[test]
    fn cache_key_tracks_macros() {
        let mut options = KernelOptions::default();
        let base = options.cache_key("path_tracing");

        options.set_macro("USE_HW_ACCELERATION", 1);
        let accelerated = options.cache_key("path_tracing");

        assert_ne!(base, accelerated);

        // Toggling the macro off restores the original key, so the cache
        // entry compiled for it gets reused
        options.remove_macro("USE_HW_ACCELERATION");

        assert_eq!(base, options.cache_key("path_tracing"));
    }

    #[test]
    fn cache_key_tracks_macro_values() {
        let mut a = KernelOptions::default();
        let mut b = KernelOptions::default();

        a.set_macro("SAMPLES", 4);
        b.set_macro("SAMPLES", 8);

        assert_ne!(a.cache_key("path_tracing"), b.cache_key("path_tracing"));
    }

    #[test]
    fn cache_key_tracks_include_dirs() {
        let mut a = KernelOptions::default();
        let mut b = KernelOptions::default();

        a.add_include_dir("kernels/include");

        assert_ne!(a.cache_key("path_tracing"), b.cache_key("path_tracing"));

        b.add_include_dir("kernels/include");

        assert_eq!(a.cache_key("path_tracing"), b.cache_key("path_tracing"));
    }

    #[test]
    fn word_count_of_uncompiled_kernel_is_zero() {
        let cache = KernelCache::new();

        assert_eq!(cache.word_count(0x1234, "path_tracing"), 0);
    }

    #[test]
    fn cache_key_tracks_kernel_name() {
        let options = KernelOptions::default();

        assert_ne!(
            options.cache_key("path_tracing"),
            options.cache_key("post_processing"),
        );
    }
}
