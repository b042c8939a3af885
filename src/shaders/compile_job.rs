use std::path::{Path, PathBuf};
use std::time::Duration;

use super::model::{Shader, ShaderStage};
use super::permutations::PermutationKey;

const DEFAULT_SHADER_MODEL: &str = "6_0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything the driver needs to invoke the external compiler.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    /// the compiler executable, ie `dxc`
    pub compiler: PathBuf,
    /// ie `6_0`, combined with the stage into the target profile
    pub shader_model: String,
    /// the directory shader source files are relative to
    pub shaders_source_dir: PathBuf,
    pub include_dir: PathBuf,
    /// the directory compiled byte-code headers are written to
    pub output_dir: PathBuf,
    pub debug_info: bool,
    /// `None` waits forever
    pub timeout: Option<Duration>,
    /// how many compiler processes may run at once
    pub parallel_jobs: usize,
    /// whether any captured compiler output fails the job, even with a zero exit code
    pub output_is_failure: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("dxc"),
            shader_model: DEFAULT_SHADER_MODEL.to_string(),
            shaders_source_dir: PathBuf::from("shaders/source"),
            include_dir: PathBuf::from("shaders/source"),
            output_dir: PathBuf::from("shaders/compiled"),
            debug_info: false,
            timeout: Some(DEFAULT_TIMEOUT),
            parallel_jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            output_is_failure: true,
        }
    }
}

/// One external compiler invocation: a single permutation of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub shader_name: String,
    pub shader_id: u32,
    pub stage: ShaderStage,
    pub key: PermutationKey,
    pub entry_point: String,
    /// relative to the shaders source dir
    pub source_file: String,
    /// the permutation's full name
    pub permutation_name: String,
    pub output_file_name: String,
    pub byte_code_name: String,
    pub defines: Vec<String>,
}

impl CompileJob {
    /// one job per stage and valid permutation
    pub fn for_shader(shader: &Shader) -> Vec<Self> {
        shader
            .stages
            .iter()
            .flat_map(|stage| {
                stage.permutations.iter().map(|permutation| Self {
                    shader_name: shader.name.clone(),
                    shader_id: shader.id,
                    stage: stage.stage,
                    key: permutation.key,
                    entry_point: stage.entry_point.clone(),
                    source_file: shader.file_name.clone(),
                    permutation_name: permutation.full_name.clone(),
                    output_file_name: permutation.output_file_name.clone(),
                    byte_code_name: permutation.byte_code_name.clone(),
                    defines: permutation.defines.clone(),
                })
            })
            .collect()
    }

    /// ie `PS ForwardLighting_ALPHA_TEST`
    pub fn description(&self) -> String {
        format!("{} {}", self.stage.file_prefix(), self.permutation_name)
    }

    /// ie `vs_6_0`
    pub fn target_profile(&self, settings: &CompilerSettings) -> String {
        format!(
            "{}_{}",
            self.stage.profile_prefix(),
            settings.shader_model
        )
        .to_lowercase()
    }

    pub fn output_path(&self, settings: &CompilerSettings) -> PathBuf {
        settings.output_dir.join(&self.output_file_name)
    }

    pub fn command_line(&self, settings: &CompilerSettings) -> Vec<String> {
        let source_path = settings.shaders_source_dir.join(&self.source_file);

        let mut args = vec![
            path_arg(&source_path),
            "-E".to_string(),
            self.entry_point.clone(),
            "-T".to_string(),
            self.target_profile(settings),
            "-Fh".to_string(),
            path_arg(&self.output_path(settings)),
            "-Vn".to_string(),
            self.byte_code_name.clone(),
            "-nologo".to_string(),
            "-WX".to_string(),
            format!("-I{}", path_arg(&settings.include_dir)),
        ];

        args.extend(self.defines.iter().map(|define| format!("-D{define}")));
        args.push(format!("-D{}", self.stage.define()));

        if settings.debug_info {
            args.extend(["-Zi", "-Qembed_debug", "-Od"].map(String::from));
        }

        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// What the permutation-key header needs to know about one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationPrintJob {
    pub shader_name: String,
    pub shader_id: u32,
    pub stage: ShaderStage,
    /// one bitfield name per define, by bit index
    pub fields: Vec<String>,
}

impl PermutationPrintJob {
    pub fn for_shader(shader: &Shader) -> Vec<Self> {
        shader
            .stages
            .iter()
            .map(|stage| Self {
                shader_name: shader.name.clone(),
                shader_id: shader.id,
                stage: stage.stage,
                fields: stage.define_field_names(&shader.name),
            })
            .collect()
    }

    pub fn struct_name(&self) -> String {
        format!("{}{}PermutationKey", self.shader_name, self.stage.name())
    }

    pub fn shader_id_literal(&self) -> String {
        format!("{:#010x}", self.shader_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shaders::model::StagePermutationConfig;

    fn settings() -> CompilerSettings {
        CompilerSettings {
            compiler: PathBuf::from("dxc"),
            shader_model: "6_0".to_string(),
            shaders_source_dir: PathBuf::from("shaders/source"),
            include_dir: PathBuf::from("shaders/include"),
            output_dir: PathBuf::from("shaders/compiled"),
            debug_info: false,
            timeout: None,
            parallel_jobs: 1,
            output_is_failure: true,
        }
    }

    fn lit_shader() -> Shader {
        Shader::builder("Lit", "Lit.hlsl")
            .stage(
                ShaderStage::Pixel,
                "PSMain",
                StagePermutationConfig::with_defines(["NORMAL_MAP", "ALPHA_TEST"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn one_job_per_permutation() {
        let shader = lit_shader();
        let jobs = CompileJob::for_shader(&shader);

        let names: Vec<String> = jobs.iter().map(CompileJob::description).collect();
        assert_eq!(
            names,
            vec![
                "PS Lit_BASE",
                "PS Lit_NORMAL_MAP",
                "PS Lit_ALPHA_TEST",
                "PS Lit_NORMAL_MAP_ALPHA_TEST"
            ]
        );
        assert!(jobs.iter().all(|job| job.shader_id == shader.id));
    }

    #[cfg(not(windows))]
    #[test]
    fn command_line() {
        let jobs = CompileJob::for_shader(&lit_shader());
        let args = jobs[3].command_line(&settings());

        insta::assert_snapshot!(
            args.join(" "),
            @"shaders/source/Lit.hlsl -E PSMain -T ps_6_0 -Fh shaders/compiled/PS_Lit_NORMAL_MAP_ALPHA_TEST.h -Vn g_PS_Lit_NORMAL_MAP_ALPHA_TEST -nologo -WX -Ishaders/include -DNORMAL_MAP -DALPHA_TEST -DPIXEL_SHADER"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn debug_command_line() {
        let jobs = CompileJob::for_shader(&lit_shader());
        let settings = CompilerSettings {
            debug_info: true,
            shader_model: "6_6".to_string(),
            ..settings()
        };
        let args = jobs[0].command_line(&settings);

        insta::assert_snapshot!(
            args.join(" "),
            @"shaders/source/Lit.hlsl -E PSMain -T ps_6_6 -Fh shaders/compiled/PS_Lit_BASE.h -Vn g_PS_Lit_BASE -nologo -WX -Ishaders/include -DPIXEL_SHADER -Zi -Qembed_debug -Od"
        );
    }

    #[test]
    fn profiles_are_lower_case() {
        let jobs = CompileJob::for_shader(&lit_shader());
        let settings = CompilerSettings {
            shader_model: "6_5".to_string(),
            ..settings()
        };
        assert_eq!(jobs[0].target_profile(&settings), "ps_6_5");
    }

    #[test]
    fn print_jobs() {
        let shader = lit_shader();
        let jobs = PermutationPrintJob::for_shader(&shader);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].struct_name(), "LitPixelPermutationKey");
        assert_eq!(jobs[0].fields, vec!["NORMAL_MAP", "ALPHA_TEST"]);
        assert_eq!(jobs[0].shader_id_literal().len(), 10);
    }
}
