use std::{env, fs, path::PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let shader_dir = PathBuf::from("glsl");

    println!("Shader directory: {shader_dir:?}");

    let compiler = shaderc::Compiler::new().expect("Failed to create shader compiler");

    let mut options = shaderc::CompileOptions::new().expect("Failed to create compile options");
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_2 as u32,
    );
    options.set_target_spirv(shaderc::SpirvVersion::V1_5);
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);
    options.set_include_callback(|requested_source, _include_type, _source_name, _depth| {
        let include_path = shader_dir.join(requested_source);
        let content = fs::read_to_string(&include_path)
            .map_err(|e| format!("Failed to include file {}: {}", include_path.display(), e))?;
        Ok(shaderc::ResolvedInclude {
            resolved_name: include_path.display().to_string(),
            content,
        })
    });

    for entry in fs::read_dir(&shader_dir).expect("Failed to read shader directory") {
        let path = entry.expect("Failed to read directory entry").path();

        let Some(file_name) = path.file_name().and_then(|e| e.to_str()) else {
            continue;
        };

        let shader_kind = match file_name {
            "raytrace.glsl" => shaderc::ShaderKind::Compute,
            _ => continue,
        };

        println!("Compiling {path:?}");

        let source = fs::read_to_string(&path).expect("Failed to read shader source");
        let compiled_result = compiler
            .compile_into_spirv(&source, shader_kind, file_name, "main", Some(&options))
            .unwrap_or_else(|e| panic!("Failed to compile {file_name}: {e}"));

        let output_path = out_dir.join(file_name).with_extension("spv");
        fs::write(output_path, compiled_result.as_binary_u8())
            .expect("Failed to write SPIR-V output");
    }

    println!("cargo:rerun-if-changed=glsl");
}
