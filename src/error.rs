use std::path::PathBuf;

use crate::shaders::permutations::MAX_PERMUTATION_DEFINES;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("unknown shader type: '{0}'")]
    UnknownType(String),

    #[error("unknown resource type: '{0}'")]
    UnknownResourceType(String),

    #[error("unknown shader stage: '{0}'")]
    UnknownStage(String),

    #[error(
        "shader '{shader}' declares {count} permutation defines for {stage}, \
         at most {max} are supported",
        max = MAX_PERMUTATION_DEFINES
    )]
    TooManyPermutationDefines {
        shader: String,
        stage: String,
        count: usize,
    },

    #[error("permutation rule affects bit {bit}, but only {define_count} defines exist")]
    RuleBitOutOfRange { bit: u32, define_count: usize },

    #[error("'{name}' has a size of {size} bytes which cannot be padded to 16 with uints")]
    UnalignedSize { name: String, size: usize },

    #[error("structured resource '{resource}' is missing its UAVStructureType")]
    MissingStructureType { resource: String },

    #[error("shader '{shader}' has permutations for {stage} but no entry point")]
    PermutationsWithoutEntryPoint { shader: String, stage: String },

    #[error("duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("failed to parse '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] askama::Error),
}

impl ShaderError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T, E = ShaderError> = std::result::Result<T, E>;
