use std::path::{Path, PathBuf};

use log::info;
use rayon::prelude::*;

use crate::error::Result;

use super::codegen::{self, GeneratedFile};
use super::compile_job::CompilerSettings;
use super::driver::{CompileReport, run_compile_jobs};
use super::file_writer::{WriteOutcome, write_if_changed};
use super::json::ShaderInputFile;
use super::model::{GlobalStructure, Shader, ShaderInputs};
use super::populators::{JOB_POPULATORS, run_job_populators};
use super::process::ProcessRunner;
use super::session::CompilationSession;
use super::type_traits::TypeTable;

pub struct Config {
    /// the directory to read json shader descriptions from
    pub shaders_source_dir: PathBuf,
    /// the directory to write C++ headers into
    pub generated_cpp_dir: PathBuf,
    /// the directory to write HLSL headers into
    pub generated_hlsl_dir: PathBuf,
    pub compiler: CompilerSettings,
    /// whether to run the compiler (or only generate headers)
    pub compile: bool,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    /// `None` when compiling was disabled
    pub report: Option<CompileReport>,
    pub failures: Vec<String>,
}

impl BuildSummary {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

const SHADER_JSON_EXTENSION: &str = "json";

pub fn write_shader_sources(
    config: &Config,
    runner: &dyn ProcessRunner,
) -> anyhow::Result<BuildSummary> {
    let session = CompilationSession::new();

    run_job_populators(&session, JOB_POPULATORS);

    let json_paths = shader_json_paths(&config.shaders_source_dir)?;
    info!(
        "found {} shader descriptions in {}",
        json_paths.len(),
        config.shaders_source_dir.display()
    );
    let types = read_shader_descriptions(&session, &json_paths);

    let mut cpp_files = vec![];
    let mut hlsl_files = vec![];

    for structure in session.global_structures() {
        cpp_files.push(codegen::cpp_global_structure(&structure, &types)?);
        hlsl_files.push(codegen::hlsl_global_structure(&structure, &types)?);
    }

    for inputs in session.shader_inputs() {
        cpp_files.push(codegen::cpp_shader_inputs(&inputs)?);
        hlsl_files.push(codegen::hlsl_shader_inputs(&inputs)?);
    }

    cpp_files.push(codegen::permutation_keys(
        &session.permutation_print_jobs(),
    )?);

    let mut summary = BuildSummary::default();
    write_generated_files(&config.generated_cpp_dir, cpp_files, &mut summary)?;
    write_generated_files(&config.generated_hlsl_dir, hlsl_files, &mut summary)?;

    if config.compile {
        let jobs = session.compile_jobs();
        std::fs::create_dir_all(&config.compiler.output_dir)?;
        let report = run_compile_jobs(&session, &jobs, &config.compiler, runner)?;

        // the registry includes every byte-code header, so it is only valid
        // once all of them exist
        if !session.failure_detected() {
            let registry = codegen::shader_bytecodes(&jobs)?;
            write_generated_files(&config.compiler.output_dir, vec![registry], &mut summary)?;
        }

        summary.report = Some(report);
    }

    summary.failures = session.failures();
    info!(
        "{} files written, {} unchanged, {} failures",
        summary.written.len(),
        summary.unchanged.len(),
        summary.failures.len()
    );

    Ok(summary)
}

/// every json file directly in `dir`, sorted by name
fn shader_json_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry_res| entry_res.ok())
        .map(|dir_entry| dir_entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == SHADER_JSON_EXTENSION)
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Parses every description, registers its structures, then builds its inputs and shader.
///
/// A file that fails at any step is recorded on the session and skipped;
/// the other files are unaffected.
/// Returns the type table with every successfully registered structure.
fn read_shader_descriptions(session: &CompilationSession, paths: &[PathBuf]) -> TypeTable {
    let parsed: Vec<(&PathBuf, ShaderInputFile)> = paths
        .par_iter()
        .filter_map(|path| match ShaderInputFile::read(path) {
            Ok(file) => Some((path, file)),
            Err(e) => {
                session.record_failure(e.to_string());
                None
            }
        })
        .collect();

    // structures may embed structures declared in earlier files
    let mut types = TypeTable::new();
    let mut registered = vec![];
    for (path, file) in parsed {
        match register_global_structures(session, &mut types, &file) {
            Ok(()) => registered.push((path, file)),
            Err(e) => session.record_failure(format!("{}: {e}", path.display())),
        }
    }

    registered.par_iter().for_each(|(path, file)| {
        info!("processing {}", path.display());
        if let Err(e) = add_shader_description(session, &types, file) {
            session.record_failure(format!("{}: {e}", path.display()));
        }
    });

    types
}

fn register_global_structures(
    session: &CompilationSession,
    types: &mut TypeTable,
    file: &ShaderInputFile,
) -> Result<()> {
    // a file's structures may embed each other, so they are staged on a copy of the table
    let mut staged = types.clone();
    let mut structures = vec![];
    for json in &file.global_structures {
        let structure = GlobalStructure::from_json(&staged, json)?;
        staged.register_structure(&structure.name, structure.byte_size())?;
        structures.push(structure);
    }

    session.add_global_structures(structures)?;
    *types = staged;

    Ok(())
}

fn add_shader_description(
    session: &CompilationSession,
    types: &TypeTable,
    file: &ShaderInputFile,
) -> Result<()> {
    let inputs = file
        .shader_inputs
        .iter()
        .map(|json| ShaderInputs::from_json(types, json))
        .collect::<Result<Vec<_>>>()?;

    let shader = file.shader.as_ref().map(Shader::from_json).transpose()?;

    session.add_shader_description(inputs, shader)
}

fn write_generated_files(
    dir: &Path,
    mut files: Vec<GeneratedFile>,
    summary: &mut BuildSummary,
) -> anyhow::Result<()> {
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    for file in files {
        let absolute_path = dir.join(&file.relative_path);
        match write_if_changed(&absolute_path, &file.content)? {
            WriteOutcome::Written => summary.written.push(absolute_path),
            WriteOutcome::Unchanged => summary.unchanged.push(absolute_path),
        }
    }

    Ok(())
}
