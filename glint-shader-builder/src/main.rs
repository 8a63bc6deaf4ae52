//! Compiles the kernels into SPIR-V and drops the artifacts into `kernels/`,
//! where the renderer picks them up at runtime.
//!
//! Pass `--hw` to build the hardware-accelerated variant as well.

use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use spirv_builder::{Capability, MetadataPrintout, SpirvBuilder};

fn main() -> Result<(), Box<dyn Error>> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crate lives inside the repository");

    let out_dir = root.join("kernels");

    fs::create_dir_all(&out_dir)?;

    build(root, &out_dir, false)?;

    if env::args().any(|arg| arg == "--hw") {
        build(root, &out_dir, true)?;
    }

    Ok(())
}

fn build(
    root: &Path,
    out_dir: &Path,
    hardware_acceleration: bool,
) -> Result<(), Box<dyn Error>> {
    let mut builder = SpirvBuilder::new(
        root.join("glint-shaders"),
        "spirv-unknown-spv1.3",
    )
    .print_metadata(MetadataPrintout::None);

    if hardware_acceleration {
        builder = builder
            .capability(Capability::RayQueryKHR)
            .extension("SPV_KHR_ray_query");
    }

    let result = builder.build()?;
    let artifact = result.module.unwrap_single();

    let name = if hardware_acceleration {
        "path_tracing_hw.spv"
    } else {
        "path_tracing.spv"
    };

    let target = out_dir.join(name);

    fs::copy(artifact, &target)?;

    println!("{}", target.display());

    Ok(())
}
