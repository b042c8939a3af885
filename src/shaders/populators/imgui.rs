use crate::error::Result;
use crate::shaders::model::{Shader, ShaderInputs, ShaderStage, StagePermutationConfig};
use crate::shaders::session::CompilationSession;
use crate::shaders::type_traits::TypeTable;

const NAME: &str = "IMGUI";

pub fn populate(session: &CompilationSession) -> Result<()> {
    let types = TypeTable::new();

    let mut inputs = ShaderInputs::new(NAME, 0);
    inputs.add_constant(&types, "float4x4", "ProjectionMatrix")?;
    inputs.add_resource(&types, "Texture2D", None, 0, "FontTexture")?;
    let inputs = inputs.finish()?;

    let shader = Shader::builder(NAME, "IMGUI.hlsl")
        .stage(ShaderStage::Vertex, "VSMain", StagePermutationConfig::default())
        .stage(ShaderStage::Pixel, "PSMain", StagePermutationConfig::default())
        .build()?;
    session.add_shader_description(vec![inputs], Some(shader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_permutations_only() {
        let session = CompilationSession::new();
        populate(&session).unwrap();

        let jobs: Vec<String> = session
            .compile_jobs()
            .iter()
            .map(|job| job.description())
            .collect();
        assert_eq!(jobs, vec!["VS IMGUI_BASE", "PS IMGUI_BASE"]);

        let inputs = &session.shader_inputs()[0];
        assert_eq!(inputs.constant_buffer.byte_size(), 64);
        assert_eq!(inputs.resources[0].register_name(), "t0");
    }
}
