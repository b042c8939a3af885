//! Renders C++ and HLSL headers from the shader model.
//!
//! Every function here is a pure function of its inputs;
//! writing the results is left to [`super::file_writer`].

use std::path::PathBuf;

use askama::Template;
use heck::ToShoutySnakeCase;

use crate::error::Result;
use crate::util::relative_path;

use super::compile_job::{CompileJob, PermutationPrintJob};
use super::constant_buffer::ConstantBufferVariable;
use super::model::{GlobalStructure, ResourceBinding, ShaderInputs, ShaderStage};
use super::type_traits::{ResourceKind, TypeTable};

pub const PERMUTATIONS_FILE_NAME: &str = "shaderpermutations.h";
pub const BYTE_CODES_FILE_NAME: &str = "shaderbytecodes.h";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// the path relative to the output dir
    pub relative_path: PathBuf,
    pub content: String,
}

impl GeneratedFile {
    fn new(file_name: &str, content: String) -> Self {
        Self {
            relative_path: relative_path([file_name]),
            content,
        }
    }
}

#[derive(Template)]
#[template(path = "shader_inputs.h.askama", escape = "none")]
struct CppShaderInputsHeader<'a> {
    inputs: &'a ShaderInputs,
    srvs: Vec<&'a ResourceBinding>,
    uavs: Vec<&'a ResourceBinding>,
}

#[derive(Template)]
#[template(path = "shader_inputs.hlsl.askama", escape = "none")]
struct HlslShaderInputsHeader<'a> {
    inputs: &'a ShaderInputs,
    guard: String,
    /// every constant buffer variable except padding
    accessors: Vec<&'a ConstantBufferVariable>,
}

#[derive(Template)]
#[template(path = "global_structure.h.askama", escape = "none")]
struct CppGlobalStructureHeader<'a> {
    structure: &'a GlobalStructure,
    dependencies: Vec<String>,
}

#[derive(Template)]
#[template(path = "global_structure.hlsl.askama", escape = "none")]
struct HlslGlobalStructureHeader<'a> {
    structure: &'a GlobalStructure,
    guard: String,
    dependencies: Vec<String>,
}

#[derive(Template)]
#[template(path = "shaderpermutations.h.askama", escape = "none")]
struct PermutationKeysHeader<'a> {
    stages: Vec<ShaderStage>,
    jobs: &'a [PermutationPrintJob],
}

#[derive(Template)]
#[template(path = "shaderbytecodes.h.askama", escape = "none")]
struct ShaderByteCodesHeader {
    records: Vec<ByteCodeRecord>,
}

struct ByteCodeRecord {
    output_file_name: String,
    byte_code_name: String,
    key: String,
    shader_id: String,
    stage: &'static str,
}

fn include_guard(name: &str, language: &str) -> String {
    format!("{}_{language}_H", name.to_shouty_snake_case())
}

/// the C++ mirror of a constant buffer and its bindings
pub fn cpp_shader_inputs(inputs: &ShaderInputs) -> Result<GeneratedFile> {
    let content = CppShaderInputsHeader {
        inputs,
        srvs: inputs.resources_of(ResourceKind::ShaderResource).collect(),
        uavs: inputs.resources_of(ResourceKind::UnorderedAccess).collect(),
    }
    .render()?;

    Ok(GeneratedFile::new(&format!("{}.h", inputs.name), content))
}

/// the HLSL bindings and public interface of a constant buffer
pub fn hlsl_shader_inputs(inputs: &ShaderInputs) -> Result<GeneratedFile> {
    let content = HlslShaderInputsHeader {
        inputs,
        guard: include_guard(&inputs.name, "HLSL"),
        accessors: inputs
            .constant_buffer
            .variables()
            .iter()
            .filter(|v| !v.is_padding())
            .collect(),
    }
    .render()?;

    Ok(GeneratedFile::new(&format!("{}.h", inputs.name), content))
}

pub fn cpp_global_structure(structure: &GlobalStructure, types: &TypeTable) -> Result<GeneratedFile> {
    let content = CppGlobalStructureHeader {
        structure,
        dependencies: structure.dependencies(types),
    }
    .render()?;

    Ok(GeneratedFile::new(&format!("{}.h", structure.name), content))
}

pub fn hlsl_global_structure(
    structure: &GlobalStructure,
    types: &TypeTable,
) -> Result<GeneratedFile> {
    let content = HlslGlobalStructureHeader {
        structure,
        guard: include_guard(&structure.name, "HLSL"),
        dependencies: structure.dependencies(types),
    }
    .render()?;

    Ok(GeneratedFile::new(&format!("{}.h", structure.name), content))
}

/// the permutation-selector bitfield struct of every shader stage
pub fn permutation_keys(jobs: &[PermutationPrintJob]) -> Result<GeneratedFile> {
    let content = PermutationKeysHeader {
        stages: ShaderStage::ALL.to_vec(),
        jobs,
    }
    .render()?;

    Ok(GeneratedFile::new(PERMUTATIONS_FILE_NAME, content))
}

/// the master registry of every compiled permutation
pub fn shader_bytecodes(jobs: &[CompileJob]) -> Result<GeneratedFile> {
    let records = jobs
        .iter()
        .map(|job| ByteCodeRecord {
            output_file_name: job.output_file_name.clone(),
            byte_code_name: job.byte_code_name.clone(),
            key: format!("{:#x}", job.key.0),
            shader_id: format!("{:#010x}", job.shader_id),
            stage: job.stage.name(),
        })
        .collect();

    let content = ShaderByteCodesHeader { records }.render()?;

    Ok(GeneratedFile::new(BYTE_CODES_FILE_NAME, content))
}
