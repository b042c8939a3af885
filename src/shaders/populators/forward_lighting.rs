use crate::error::Result;
use crate::shaders::model::{Shader, ShaderInputs, ShaderStage, StagePermutationConfig};
use crate::shaders::permutations::{PermutationKey, only_one_of};
use crate::shaders::session::CompilationSession;
use crate::shaders::type_traits::TypeTable;

const NAME: &str = "ForwardLighting";

const VERTEX_FORMAT_P: u32 = 1 << 0;
const VERTEX_FORMAT_PN: u32 = 1 << 1;
const VERTEX_FORMAT_PNT: u32 = 1 << 2;

fn one_vertex_format(key: PermutationKey) -> bool {
    only_one_of(key, &[VERTEX_FORMAT_P, VERTEX_FORMAT_PN, VERTEX_FORMAT_PNT])
}

fn shader_inputs() -> Result<ShaderInputs> {
    let types = TypeTable::new();
    let mut inputs = ShaderInputs::new(NAME, 0);

    inputs.add_constant(&types, "float4x4", "ViewProjection")?;
    inputs.add_constant(&types, "float4x4", "World")?;
    inputs.add_constant(&types, "float3", "CameraPosition")?;
    inputs.add_constant(&types, "float", "Time")?;
    inputs.add_constant(&types, "float3", "LightDirection")?;

    inputs.add_resource(&types, "Texture2D", None, 0, "DiffuseTexture")?;
    inputs.add_resource(&types, "StructuredBuffer", Some("float4"), 1, "Lights")?;

    inputs.finish()
}

fn shader() -> Result<Shader> {
    Shader::builder(NAME, "ForwardLighting.hlsl")
        .stage(
            ShaderStage::Vertex,
            "VSMain",
            StagePermutationConfig::with_defines([
                "VERTEX_FORMAT_P",
                "VERTEX_FORMAT_PN",
                "VERTEX_FORMAT_PNT",
                "ALPHA_TEST",
            ])
            .key_filter(one_vertex_format),
        )
        .stage(
            ShaderStage::Pixel,
            "PSMain",
            StagePermutationConfig::with_defines(["ALPHA_TEST", "NORMAL_MAP"]),
        )
        .build()
}

pub fn populate(session: &CompilationSession) -> Result<()> {
    session.add_shader_description(vec![shader_inputs()?], Some(shader()?))
}
