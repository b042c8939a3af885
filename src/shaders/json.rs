//! The declarative shader-input file format.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ShaderError};

use super::permutations::RuleKind;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShaderInputFile {
    #[serde(default)]
    pub shader: Option<ShaderJson>,
    #[serde(default)]
    pub global_structures: Vec<GlobalStructureJson>,
    #[serde(default)]
    pub shader_inputs: Vec<ShaderInputsJson>,
}

impl ShaderInputFile {
    pub fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(ShaderError::io(path))?;
        serde_json::from_str(&json).map_err(|source| ShaderError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShaderJson {
    pub shader_name: String,
    pub file_name: String,
    #[serde(default)]
    pub vertex_entry_point: Option<String>,
    #[serde(default)]
    pub hull_entry_point: Option<String>,
    #[serde(default)]
    pub domain_entry_point: Option<String>,
    #[serde(default)]
    pub geometry_entry_point: Option<String>,
    #[serde(default)]
    pub pixel_entry_point: Option<String>,
    #[serde(default)]
    pub compute_entry_point: Option<String>,
    /// keyed by stage name, ie "Vertex"
    #[serde(default)]
    pub shader_permutations: BTreeMap<String, StagePermutationsJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StagePermutationsJson {
    #[serde(default)]
    pub permutations: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleJson {
    pub rule: RuleKind,
    pub affected_bits: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalStructureJson {
    pub name: String,
    #[serde(default)]
    pub constants: Vec<VariableJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariableJson {
    #[serde(rename = "Type")]
    pub type_name: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShaderInputsJson {
    pub name: String,
    pub constant_buffer: ConstantBufferJson,
    #[serde(default)]
    pub resources: Vec<ResourceJson>,
    #[serde(default)]
    pub consts: Vec<ConstJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConstantBufferJson {
    pub register: u32,
    #[serde(default)]
    pub constants: Vec<VariableJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceJson {
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(rename = "UAVStructureType", default)]
    pub uav_structure_type: Option<String>,
    pub register: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConstJson {
    #[serde(rename = "Type")]
    pub type_name: String,
    pub name: String,
    pub value: serde_json::Value,
}

impl ConstJson {
    /// the value as it should appear in generated source
    pub fn literal(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_section() {
        let json = r#"{
            "Shader": {
                "ShaderName": "Blur",
                "FileName": "Blur.hlsl",
                "ComputeEntryPoint": "CSMain",
                "ShaderPermutations": {
                    "Compute": {
                        "Permutations": ["HORIZONTAL", "VERTICAL"],
                        "Rules": [{ "Rule": "OnlyOneBitSet", "AffectedBits": [0, 1] }]
                    }
                }
            },
            "GlobalStructures": [
                { "Name": "Sample", "Constants": [{ "Type": "float4", "Name": "Color" }] }
            ],
            "ShaderInputs": [{
                "Name": "BlurInputs",
                "ConstantBuffer": {
                    "Register": 1,
                    "Constants": [{ "Type": "float2", "Name": "TexelSize" }]
                },
                "Resources": [
                    { "Type": "Texture2D", "Register": 0, "Name": "Source" },
                    { "Type": "RWStructuredBuffer", "UAVStructureType": "Sample", "Register": 0, "Name": "Samples" }
                ],
                "Consts": [
                    { "Type": "uint", "Name": "Radius", "Value": 4 },
                    { "Type": "float", "Name": "Sigma", "Value": "1.5f" }
                ]
            }]
        }"#;

        let file: ShaderInputFile = serde_json::from_str(json).unwrap();

        let shader = file.shader.unwrap();
        assert_eq!(shader.shader_name, "Blur");
        assert_eq!(shader.compute_entry_point.as_deref(), Some("CSMain"));
        assert!(shader.vertex_entry_point.is_none());

        let compute = &shader.shader_permutations["Compute"];
        assert_eq!(compute.permutations, vec!["HORIZONTAL", "VERTICAL"]);
        assert_eq!(compute.rules[0].rule, RuleKind::OnlyOneBitSet);
        assert_eq!(compute.rules[0].affected_bits, vec![0, 1]);

        assert_eq!(file.global_structures[0].constants[0].type_name, "float4");

        let inputs = &file.shader_inputs[0];
        assert_eq!(inputs.constant_buffer.register, 1);
        assert_eq!(inputs.resources[1].uav_structure_type.as_deref(), Some("Sample"));
        assert_eq!(inputs.consts[0].literal(), "4");
        assert_eq!(inputs.consts[1].literal(), "1.5f");
    }

    #[test]
    fn every_section_is_optional() {
        let file: ShaderInputFile = serde_json::from_str("{}").unwrap();
        assert!(file.shader.is_none());
        assert!(file.global_structures.is_empty());
        assert!(file.shader_inputs.is_empty());
    }

    #[test]
    fn unknown_rules_are_rejected() {
        let json = r#"{ "Rule": "NoBitsSet", "AffectedBits": [0] }"#;
        assert!(serde_json::from_str::<RuleJson>(json).is_err());
    }
}
