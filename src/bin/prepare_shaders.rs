use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use shadercompiler::build_tasks::{self, Config};
use shadercompiler::logging;
use shadercompiler::shaders::compile_job::CompilerSettings;
use shadercompiler::shaders::process::OsProcessRunner;
use shadercompiler::util::manifest_path;

/// Generates shader headers and compiles every shader permutation.
#[derive(Debug, Parser)]
#[command(name = "prepare_shaders", version, about)]
struct Args {
    /// Directory of json shader descriptions and hlsl sources.
    #[arg(long, env = "SHADERS_SOURCE_DIR")]
    shaders_source_dir: Option<PathBuf>,

    /// Directory the C++ headers are written to.
    #[arg(long, env = "GENERATED_CPP_DIR")]
    generated_cpp_dir: Option<PathBuf>,

    /// Directory the HLSL headers are written to, also passed to the compiler as an include dir.
    #[arg(long, env = "GENERATED_HLSL_DIR")]
    generated_hlsl_dir: Option<PathBuf>,

    /// Directory the compiled byte-code headers are written to.
    #[arg(long, env = "COMPILED_SHADERS_DIR")]
    compiled_shaders_dir: Option<PathBuf>,

    /// The shader compiler executable.
    #[arg(long, env = "SHADER_COMPILER", default_value = "dxc")]
    compiler: PathBuf,

    /// Shader model, ie `6_0`.
    #[arg(long, env = "SHADER_MODEL", default_value = "6_0")]
    shader_model: String,

    /// Embed debug info and disable optimizations.
    #[arg(long, env = "SHADER_DEBUG_INFO")]
    debug_info: bool,

    /// Seconds before a compiler process is killed, 0 waits forever.
    #[arg(long, env = "SHADER_COMPILE_TIMEOUT", default_value_t = 120)]
    timeout_secs: u64,

    /// Maximum number of concurrent compiler processes, defaults to the available parallelism.
    #[arg(long, env = "SHADER_PARALLEL_JOBS")]
    parallel_jobs: Option<usize>,

    /// Treat compiler output with a zero exit code as a warning instead of a failure.
    #[arg(long, env = "SHADER_ALLOW_WARNINGS")]
    allow_warnings: bool,

    /// Only generate headers, without running the compiler.
    #[arg(long)]
    no_compile: bool,

    /// Log file, truncated on every run.
    #[arg(long, env = "SHADER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Config {
        let shaders_source_dir = self
            .shaders_source_dir
            .unwrap_or_else(|| manifest_path(["shaders", "source"]));
        let generated_hlsl_dir = self
            .generated_hlsl_dir
            .unwrap_or_else(|| manifest_path(["shaders", "generated"]));

        let defaults = CompilerSettings::default();
        let compiler = CompilerSettings {
            compiler: self.compiler,
            shader_model: self.shader_model,
            shaders_source_dir: shaders_source_dir.clone(),
            include_dir: generated_hlsl_dir.clone(),
            output_dir: self
                .compiled_shaders_dir
                .unwrap_or_else(|| manifest_path(["shaders", "compiled"])),
            debug_info: self.debug_info,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            parallel_jobs: self.parallel_jobs.unwrap_or(defaults.parallel_jobs),
            output_is_failure: !self.allow_warnings,
        };

        Config {
            shaders_source_dir,
            generated_cpp_dir: self
                .generated_cpp_dir
                .unwrap_or_else(|| manifest_path(["generated"])),
            generated_hlsl_dir,
            compiler,
            compile: !self.no_compile,
        }
    }
}

pub fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| manifest_path(["target", "prepare_shaders.log"]));
    logging::init(Some(&log_file))?;

    let config = args.into_config();
    let summary = build_tasks::write_shader_sources(&config, &OsProcessRunner)?;

    if summary.succeeded() {
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("{} shader failure(s):", summary.failures.len());
    for failure in &summary.failures {
        eprintln!("  {failure}");
    }

    Ok(ExitCode::FAILURE)
}
