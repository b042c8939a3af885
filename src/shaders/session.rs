use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{error, info};

use crate::error::{Result, ShaderError};

use super::codegen::{BYTE_CODES_FILE_NAME, PERMUTATIONS_FILE_NAME};
use super::compile_job::{CompileJob, PermutationPrintJob};
use super::model::{GlobalStructure, Shader, ShaderInputs};

/// Everything one compiler run accumulates.
///
/// Populators, JSON parsing and compile jobs may all run on worker threads,
/// so every collection is behind its own lock.
#[derive(Debug, Default)]
pub struct CompilationSession {
    shader_inputs: Mutex<Vec<ShaderInputs>>,
    global_structures: Mutex<Vec<GlobalStructure>>,
    shaders: Mutex<Vec<Shader>>,
    compile_jobs: Mutex<Vec<CompileJob>>,
    permutation_print_jobs: Mutex<Vec<PermutationPrintJob>>,
    failures: Mutex<Vec<String>>,
    failure_detected: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Structures and shader inputs share one header namespace, `<name>.h`,
/// with the two registry headers. Compared case-insensitively for Windows file systems.
fn check_header_name(
    kind: &'static str,
    name: &str,
    structures: &[GlobalStructure],
    shader_inputs: &[ShaderInputs],
) -> Result<()> {
    let reserved = [PERMUTATIONS_FILE_NAME, BYTE_CODES_FILE_NAME]
        .into_iter()
        .filter_map(|file_name| file_name.strip_suffix(".h"));

    let taken = reserved
        .chain(structures.iter().map(|s| s.name.as_str()))
        .chain(shader_inputs.iter().map(|i| i.name.as_str()))
        .any(|existing| existing.eq_ignore_ascii_case(name));

    if taken {
        return Err(ShaderError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }

    Ok(())
}

impl CompilationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shader_inputs(&self, inputs: ShaderInputs) -> Result<()> {
        self.add_shader_description(vec![inputs], None)
    }

    pub fn add_global_structure(&self, structure: GlobalStructure) -> Result<()> {
        self.add_global_structures(vec![structure])
    }

    pub fn add_shader(&self, shader: Shader) -> Result<()> {
        self.add_shader_description(vec![], Some(shader))
    }

    /// Adds all of the structures or none of them.
    pub fn add_global_structures(&self, new_structures: Vec<GlobalStructure>) -> Result<()> {
        let mut structures = lock(&self.global_structures);
        let shader_inputs = lock(&self.shader_inputs);

        let committed = structures.len();
        for structure in new_structures {
            let checked =
                check_header_name("structure", &structure.name, &structures, &shader_inputs);
            if let Err(e) = checked {
                structures.truncate(committed);
                return Err(e);
            }
            structures.push(structure);
        }

        Ok(())
    }

    /// Adds the inputs and shader of one description, or nothing if any name is taken.
    ///
    /// The shader gets one compile job per stage and permutation, and one print job per stage.
    pub fn add_shader_description(
        &self,
        new_inputs: Vec<ShaderInputs>,
        shader: Option<Shader>,
    ) -> Result<()> {
        let structures = lock(&self.global_structures);
        let mut shader_inputs = lock(&self.shader_inputs);
        let mut shaders = lock(&self.shaders);

        let committed = shader_inputs.len();
        for inputs in new_inputs {
            let checked =
                check_header_name("shader inputs", &inputs.name, &structures, &shader_inputs);
            if let Err(e) = checked {
                shader_inputs.truncate(committed);
                return Err(e);
            }
            shader_inputs.push(inputs);
        }

        let Some(shader) = shader else {
            return Ok(());
        };

        if shaders.iter().any(|s| s.name == shader.name) {
            shader_inputs.truncate(committed);
            return Err(ShaderError::DuplicateName {
                kind: "shader",
                name: shader.name,
            });
        }

        let compile_jobs = CompileJob::for_shader(&shader);
        info!(
            "{}: {} compile jobs",
            shader.name,
            compile_jobs.len()
        );

        lock(&self.compile_jobs).extend(compile_jobs);
        lock(&self.permutation_print_jobs).extend(PermutationPrintJob::for_shader(&shader));
        shaders.push(shader);

        Ok(())
    }

    /// sorted by name
    pub fn shader_inputs(&self) -> Vec<ShaderInputs> {
        let mut inputs = lock(&self.shader_inputs).clone();
        inputs.sort_by(|a, b| a.name.cmp(&b.name));
        inputs
    }

    /// sorted by name
    pub fn global_structures(&self) -> Vec<GlobalStructure> {
        let mut structures = lock(&self.global_structures).clone();
        structures.sort_by(|a, b| a.name.cmp(&b.name));
        structures
    }

    /// sorted by name
    pub fn shaders(&self) -> Vec<Shader> {
        let mut shaders = lock(&self.shaders).clone();
        shaders.sort_by(|a, b| a.name.cmp(&b.name));
        shaders
    }

    /// sorted by shader, stage, then key
    pub fn compile_jobs(&self) -> Vec<CompileJob> {
        let mut jobs = lock(&self.compile_jobs).clone();
        jobs.sort_by(|a, b| {
            (&a.shader_name, a.stage, a.key).cmp(&(&b.shader_name, b.stage, b.key))
        });
        jobs
    }

    /// sorted by shader, then stage
    pub fn permutation_print_jobs(&self) -> Vec<PermutationPrintJob> {
        let mut jobs = lock(&self.permutation_print_jobs).clone();
        jobs.sort_by(|a, b| (&a.shader_name, a.stage).cmp(&(&b.shader_name, b.stage)));
        jobs
    }

    /// Records a failure and sets the flag that stops new compile jobs from starting.
    pub fn record_failure(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        lock(&self.failures).push(message);
        self.failure_detected.store(true, Ordering::SeqCst);
    }

    pub fn failure_detected(&self) -> bool {
        self.failure_detected.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> Vec<String> {
        lock(&self.failures).clone()
    }
}
