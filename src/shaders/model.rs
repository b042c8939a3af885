use std::fmt;
use std::str::FromStr;

use heck::ToShoutySnakeCase;
use log::info;

use crate::error::{Result, ShaderError};

use super::constant_buffer::ConstantBuffer;
use super::json::*;
use super::permutations::*;
use super::type_traits::{ResourceKind, TypeTable, resource_trait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "Vertex",
            Self::Hull => "Hull",
            Self::Domain => "Domain",
            Self::Geometry => "Geometry",
            Self::Pixel => "Pixel",
            Self::Compute => "Compute",
        }
    }

    /// the prefix of per-permutation byte-code headers
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::Vertex => "VS",
            Self::Hull => "HS",
            Self::Domain => "DS",
            Self::Geometry => "GS",
            Self::Pixel => "PS",
            Self::Compute => "CS",
        }
    }

    pub fn profile_prefix(self) -> String {
        self.file_prefix().to_lowercase()
    }

    /// ie `VERTEX_SHADER`
    pub fn define(self) -> String {
        format!("{}_SHADER", self.name().to_shouty_snake_case())
    }

    /// the value of the generated C++ `ShaderStage` enum
    pub fn enum_value(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShaderStage {
    type Err = ShaderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| ShaderError::UnknownStage(s.to_string()))
    }
}

/// One compiled variant of a shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    pub key: PermutationKey,
    /// the active defines joined with '_', or `BASE`
    pub name: String,
    /// `<ShaderName>_<name>`
    pub full_name: String,
    pub defines: Vec<String>,
    /// `<StagePrefix>_<ShaderName>_<name>.h`
    pub output_file_name: String,
    /// the C identifier of the compiled byte-code array
    pub byte_code_name: String,
}

const BASE_PERMUTATION_NAME: &str = "BASE";

impl Permutation {
    pub fn new(
        shader_name: &str,
        stage: ShaderStage,
        key: PermutationKey,
        stage_defines: &[String],
    ) -> Self {
        let defines: Vec<String> = key
            .active_bits()
            .filter_map(|bit| stage_defines.get(bit).cloned())
            .collect();

        let name = if key.is_base() {
            BASE_PERMUTATION_NAME.to_string()
        } else {
            defines.join("_")
        };

        let prefix = stage.file_prefix();
        Self {
            key,
            full_name: format!("{shader_name}_{name}"),
            output_file_name: format!("{prefix}_{shader_name}_{name}.h"),
            byte_code_name: format!("g_{prefix}_{shader_name}_{name}"),
            defines,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageDescription {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// permutation define names, by bit index
    pub defines: Vec<String>,
    /// the base permutation first, then valid keys ascending
    pub permutations: Vec<Permutation>,
}

impl ShaderStageDescription {
    /// the bitfield name of each define: its single-define permutation
    /// name without the shader name prefix
    pub fn define_field_names(&self, shader_name: &str) -> Vec<String> {
        (0..self.defines.len())
            .map(|bit| {
                let single = Permutation::new(
                    shader_name,
                    self.stage,
                    PermutationKey(1 << bit),
                    &self.defines,
                );
                single
                    .full_name
                    .strip_prefix(shader_name)
                    .unwrap_or(&single.full_name)
                    .trim_start_matches('_')
                    .to_string()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    pub name: String,
    /// the HLSL source, relative to the shaders source dir
    pub file_name: String,
    pub id: u32,
    pub stages: Vec<ShaderStageDescription>,
}

impl Shader {
    pub fn builder(name: impl Into<String>, file_name: impl Into<String>) -> ShaderBuilder {
        ShaderBuilder {
            name: name.into(),
            file_name: file_name.into(),
            stages: vec![],
        }
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderStageDescription> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn permutation_count(&self) -> usize {
        self.stages.iter().map(|s| s.permutations.len()).sum()
    }

    pub fn from_json(json: &ShaderJson) -> Result<Self> {
        let entry_points = [
            (ShaderStage::Vertex, &json.vertex_entry_point),
            (ShaderStage::Hull, &json.hull_entry_point),
            (ShaderStage::Domain, &json.domain_entry_point),
            (ShaderStage::Geometry, &json.geometry_entry_point),
            (ShaderStage::Pixel, &json.pixel_entry_point),
            (ShaderStage::Compute, &json.compute_entry_point),
        ];

        for stage_name in json.shader_permutations.keys() {
            let stage: ShaderStage = stage_name.parse()?;
            let has_entry_point = entry_points
                .iter()
                .any(|(s, entry_point)| *s == stage && entry_point.is_some());
            if !has_entry_point {
                return Err(ShaderError::PermutationsWithoutEntryPoint {
                    shader: json.shader_name.clone(),
                    stage: stage_name.clone(),
                });
            }
        }

        let mut builder = Shader::builder(&json.shader_name, &json.file_name);
        for (stage, entry_point) in entry_points {
            let Some(entry_point) = entry_point else {
                continue;
            };

            let config = match json.shader_permutations.get(stage.name()) {
                None => StagePermutationConfig::default(),
                Some(permutations) => {
                    let define_count = permutations.permutations.len();
                    let rules = permutations
                        .rules
                        .iter()
                        .map(|r| PermutationRule::from_bits(r.rule, &r.affected_bits, define_count))
                        .collect::<Result<Vec<_>>>()?;

                    StagePermutationConfig {
                        defines: permutations.permutations.clone(),
                        rules,
                        key_filter: None,
                    }
                }
            };

            builder = builder.stage(stage, entry_point, config);
        }

        builder.build()
    }
}

/// The permutation space of one stage
#[derive(Debug, Clone, Default)]
pub struct StagePermutationConfig {
    pub defines: Vec<String>,
    pub rules: Vec<PermutationRule>,
    pub key_filter: Option<KeyFilter>,
}

impl StagePermutationConfig {
    pub fn with_defines<const N: usize>(defines: [&str; N]) -> Self {
        Self {
            defines: defines.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn rule(mut self, rule: PermutationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn key_filter(mut self, key_filter: KeyFilter) -> Self {
        self.key_filter = Some(key_filter);
        self
    }
}

pub struct ShaderBuilder {
    name: String,
    file_name: String,
    stages: Vec<(ShaderStage, String, StagePermutationConfig)>,
}

impl ShaderBuilder {
    pub fn stage(
        mut self,
        stage: ShaderStage,
        entry_point: impl Into<String>,
        config: StagePermutationConfig,
    ) -> Self {
        self.stages.push((stage, entry_point.into(), config));
        self
    }

    pub fn build(self) -> Result<Shader> {
        let mut stages: Vec<ShaderStageDescription> = vec![];
        for (stage, entry_point, config) in self.stages {
            if stages.iter().any(|s| s.stage == stage) {
                return Err(ShaderError::DuplicateName {
                    kind: "stage",
                    name: format!("{} {stage}", self.name),
                });
            }

            if config.defines.len() > MAX_PERMUTATION_DEFINES {
                return Err(ShaderError::TooManyPermutationDefines {
                    shader: self.name.clone(),
                    stage: stage.to_string(),
                    count: config.defines.len(),
                });
            }

            let mut keys = valid_permutation_keys(config.defines.len(), &config.rules)?;
            if let Some(key_filter) = config.key_filter {
                keys.retain(|&key| key_filter(key));
            }

            let permutations: Vec<Permutation> = std::iter::once(PermutationKey::BASE)
                .chain(keys)
                .map(|key| Permutation::new(&self.name, stage, key, &config.defines))
                .collect();

            info!(
                "{} {stage}: {} defines, {} permutations",
                self.name,
                config.defines.len(),
                permutations.len()
            );

            stages.push(ShaderStageDescription {
                stage,
                entry_point,
                defines: config.defines,
                permutations,
            });
        }

        Ok(Shader {
            id: shader_id(&self.name),
            name: self.name,
            file_name: self.file_name,
            stages,
        })
    }
}

/// a stable numeric id for a shader name
pub fn shader_id(name: &str) -> u32 {
    let hash = blake3::hash(name.as_bytes());
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// ie `Texture2D`
    pub resource_type: String,
    pub kind: ResourceKind,
    pub structured: bool,
    pub element_type: Option<String>,
    pub register: u32,
    pub name: String,
}

impl ResourceBinding {
    pub fn new(
        resource_type: &str,
        element_type: Option<&str>,
        register: u32,
        name: &str,
    ) -> Result<Self> {
        let resource = resource_trait(resource_type)?;
        if resource.structured && element_type.is_none() {
            return Err(ShaderError::MissingStructureType {
                resource: name.to_string(),
            });
        }

        Ok(Self {
            resource_type: resource.name.to_string(),
            kind: resource.kind,
            structured: resource.structured,
            element_type: element_type.map(str::to_string),
            register,
            name: name.to_string(),
        })
    }

    /// the HLSL type, with its element type parameter if any
    pub fn hlsl_type(&self) -> String {
        match &self.element_type {
            Some(element_type) => format!("{}<{element_type}>", self.resource_type),
            None => self.resource_type.clone(),
        }
    }

    pub fn register_name(&self) -> String {
        format!("{}{}", self.kind.register_prefix(), self.register)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedConstant {
    pub declared_type: String,
    pub target_type: String,
    pub name: String,
    pub value: String,
}

impl NamedConstant {
    pub fn new(types: &TypeTable, declared_type: &str, name: &str, value: &str) -> Result<Self> {
        let type_trait = types.lookup(declared_type)?;
        Ok(Self {
            declared_type: type_trait.declared,
            target_type: type_trait.target,
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// A constant buffer with its resource bindings and compile-time constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInputs {
    pub name: String,
    pub constant_buffer: ConstantBuffer,
    pub resources: Vec<ResourceBinding>,
    pub consts: Vec<NamedConstant>,
    /// shared structures this depends on, in first-use order
    pub dependencies: Vec<String>,
}

impl ShaderInputs {
    pub fn new(name: impl Into<String>, register: u32) -> Self {
        let name = name.into();
        Self {
            constant_buffer: ConstantBuffer::new(name.clone(), register),
            name,
            resources: vec![],
            consts: vec![],
            dependencies: vec![],
        }
    }

    pub fn add_constant(&mut self, types: &TypeTable, declared_type: &str, name: &str) -> Result<()> {
        self.constant_buffer.add_variable(types, declared_type, name)?;
        self.add_dependency(types, declared_type);
        Ok(())
    }

    pub fn add_resource(
        &mut self,
        types: &TypeTable,
        resource_type: &str,
        element_type: Option<&str>,
        register: u32,
        name: &str,
    ) -> Result<()> {
        let binding = ResourceBinding::new(resource_type, element_type, register, name)?;
        if let Some(element_type) = element_type {
            types.lookup(element_type)?;
            self.add_dependency(types, element_type);
        }
        self.resources.push(binding);
        Ok(())
    }

    pub fn add_const(
        &mut self,
        types: &TypeTable,
        declared_type: &str,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.consts
            .push(NamedConstant::new(types, declared_type, name, value)?);
        Ok(())
    }

    fn add_dependency(&mut self, types: &TypeTable, type_name: &str) {
        if types.is_structure(type_name) && !self.dependencies.iter().any(|d| d == type_name) {
            self.dependencies.push(type_name.to_string());
        }
    }

    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceBinding> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// pads the constant buffer; call once every constant is added
    pub fn finish(mut self) -> Result<Self> {
        self.constant_buffer.sanity_check()?;
        Ok(self)
    }

    pub fn from_json(types: &TypeTable, json: &ShaderInputsJson) -> Result<Self> {
        let mut inputs = ShaderInputs::new(&json.name, json.constant_buffer.register);

        for constant in &json.constant_buffer.constants {
            inputs.add_constant(types, &constant.type_name, &constant.name)?;
        }

        for resource in &json.resources {
            inputs.add_resource(
                types,
                &resource.type_name,
                resource.uav_structure_type.as_deref(),
                resource.register,
                &resource.name,
            )?;
        }

        for constant in &json.consts {
            inputs.add_const(types, &constant.type_name, &constant.name, &constant.literal())?;
        }

        inputs.finish()
    }
}

/// A named structure shared across shaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStructure {
    pub name: String,
    pub layout: ConstantBuffer,
}

impl GlobalStructure {
    pub fn from_json(types: &TypeTable, json: &GlobalStructureJson) -> Result<Self> {
        let mut layout = ConstantBuffer::new(&json.name, 0);
        for constant in &json.constants {
            layout.add_variable(types, &constant.type_name, &constant.name)?;
        }
        layout.sanity_check()?;

        Ok(Self {
            name: json.name.clone(),
            layout,
        })
    }

    pub fn byte_size(&self) -> usize {
        self.layout.byte_size()
    }

    /// structures this one embeds
    pub fn dependencies(&self, types: &TypeTable) -> Vec<String> {
        let mut dependencies: Vec<String> = vec![];
        for variable in self.layout.variables() {
            if types.is_structure(&variable.declared_type)
                && !dependencies.contains(&variable.declared_type)
            {
                dependencies.push(variable.declared_type.clone());
            }
        }
        dependencies
    }
}
