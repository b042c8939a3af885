use log::{debug, error, info, warn};
use rayon::prelude::*;

use super::compile_job::{CompileJob, CompilerSettings};
use super::process::ProcessRunner;
use super::session::CompilationSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
    /// not started because an earlier failure was already recorded
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub description: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    /// in job order
    pub outcomes: Vec<JobOutcome>,
}

impl CompileReport {
    fn count(&self, matches: impl Fn(&JobStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| matches(&o.status)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| *s == JobStatus::Succeeded)
    }

    pub fn failed(&self) -> Vec<&JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed(_)))
            .collect()
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == JobStatus::Skipped)
    }
}

/// Runs every job through the external compiler.
///
/// A job is only started while the session has no recorded failure;
/// jobs already running when a failure is recorded still finish.
pub fn run_compile_jobs(
    session: &CompilationSession,
    jobs: &[CompileJob],
    settings: &CompilerSettings,
    runner: &dyn ProcessRunner,
) -> anyhow::Result<CompileReport> {
    info!(
        "compiling {} permutations with {} worker(s)",
        jobs.len(),
        settings.parallel_jobs.max(1)
    );

    let run = |job: &CompileJob| JobOutcome {
        description: job.description(),
        status: run_compile_job(session, job, settings, runner),
    };

    let outcomes: Vec<JobOutcome> = if settings.parallel_jobs <= 1 {
        jobs.iter().map(run).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.parallel_jobs)
            .build()?;
        pool.install(|| jobs.par_iter().map(run).collect())
    };

    let report = CompileReport { outcomes };
    info!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed().len(),
        report.skipped()
    );

    Ok(report)
}

fn run_compile_job(
    session: &CompilationSession,
    job: &CompileJob,
    settings: &CompilerSettings,
    runner: &dyn ProcessRunner,
) -> JobStatus {
    if session.failure_detected() {
        debug!("skipping {}", job.description());
        return JobStatus::Skipped;
    }

    let args = job.command_line(settings);
    debug!("{} {}", settings.compiler.display(), args.join(" "));

    let output = match runner.run(&settings.compiler, &args, settings.timeout) {
        Ok(output) => output,
        Err(e) => return fail(session, job, e.to_string()),
    };

    if output.timed_out {
        return fail(session, job, "compiler timed out".to_string());
    }

    let captured = output.captured.trim();
    if output.exit_code != Some(0) {
        let reason = match output.exit_code {
            Some(code) => format!("compiler exited with {code}: {captured}"),
            None => format!("compiler was terminated: {captured}"),
        };
        return fail(session, job, reason);
    }

    // any byte of output counts, whitespace included
    if !output.captured.is_empty() {
        if settings.output_is_failure {
            let reason = match captured {
                "" => "compiler printed only whitespace".to_string(),
                captured => captured.to_string(),
            };
            return fail(session, job, reason);
        }
        warn!("{}: {captured}", job.description());
    }

    info!("compiled {}", job.description());
    JobStatus::Succeeded
}

fn fail(session: &CompilationSession, job: &CompileJob, reason: String) -> JobStatus {
    error!("failed to compile {}", job.description());
    session.record_failure(format!("{}: {reason}", job.description()));
    JobStatus::Failed(reason)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    use crate::error::Result;
    use crate::shaders::model::{Shader, ShaderStage, StagePermutationConfig};
    use crate::shaders::process::ProcessOutput;

    /// Answers each invocation by looking up the `-Vn` byte-code name.
    struct FakeRunner {
        output_for: fn(&str) -> ProcessOutput,
        started: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new(output_for: fn(&str) -> ProcessOutput) -> Self {
            Self {
                output_for,
                started: Mutex::new(vec![]),
            }
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(
            &self,
            _program: &Path,
            args: &[String],
            _timeout: Option<Duration>,
        ) -> Result<ProcessOutput> {
            let name_index = args.iter().position(|a| a == "-Vn").unwrap() + 1;
            let name = args[name_index].clone();
            self.started.lock().unwrap().push(name.clone());
            Ok((self.output_for)(&name))
        }
    }

    fn silent() -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            captured: String::new(),
            timed_out: false,
        }
    }

    fn settings(parallel_jobs: usize) -> CompilerSettings {
        CompilerSettings {
            compiler: PathBuf::from("dxc"),
            parallel_jobs,
            timeout: None,
            ..CompilerSettings::default()
        }
    }

    /// three jobs: PS_Lit_BASE, PS_Lit_FOO, PS_Lit_BAR
    fn three_jobs() -> Vec<CompileJob> {
        let shader = Shader::builder("Lit", "Lit.hlsl")
            .stage(
                ShaderStage::Pixel,
                "PSMain",
                StagePermutationConfig::with_defines(["FOO", "BAR"]).key_filter(|key| {
                    key.0.count_ones() == 1
                }),
            )
            .build()
            .unwrap();
        CompileJob::for_shader(&shader)
    }

    #[test]
    fn all_jobs_succeed() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|_| silent());

        let report = run_compile_jobs(&session, &three_jobs(), &settings(4), &runner).unwrap();

        assert_eq!(report.succeeded(), 3);
        assert!(report.failed().is_empty());
        assert!(!session.failure_detected());
        assert_eq!(runner.started().len(), 3);
    }

    #[test]
    fn fail_fast_skips_later_jobs() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|name| match name {
            "g_PS_Lit_FOO" => ProcessOutput {
                captured: "Lit.hlsl:12:5: error: undeclared identifier 'albedo'".to_string(),
                ..silent()
            },
            _ => silent(),
        });

        let report = run_compile_jobs(&session, &three_jobs(), &settings(1), &runner).unwrap();

        let statuses: Vec<&JobStatus> = report.outcomes.iter().map(|o| &o.status).collect();
        assert_eq!(statuses[0], &JobStatus::Succeeded);
        assert!(matches!(statuses[1], JobStatus::Failed(reason) if reason.contains("undeclared")));
        assert_eq!(statuses[2], &JobStatus::Skipped);

        assert_eq!(runner.started(), vec!["g_PS_Lit_BASE", "g_PS_Lit_FOO"]);
        assert!(session.failure_detected());
        assert_eq!(session.failures().len(), 1);
    }

    #[test]
    fn earlier_failures_skip_everything() {
        let session = CompilationSession::new();
        session.record_failure("broken.json: bad");
        let runner = FakeRunner::new(|_| silent());

        let report = run_compile_jobs(&session, &three_jobs(), &settings(2), &runner).unwrap();

        assert_eq!(report.skipped(), 3);
        assert!(runner.started().is_empty());
    }

    #[test]
    fn whitespace_output_fails() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|_| ProcessOutput {
            captured: "\r\n".to_string(),
            ..silent()
        });

        let report = run_compile_jobs(&session, &three_jobs(), &settings(1), &runner).unwrap();

        assert!(matches!(
            &report.outcomes[0].status,
            JobStatus::Failed(reason) if reason == "compiler printed only whitespace"
        ));
        assert_eq!(report.skipped(), 2);
        assert!(session.failure_detected());
    }

    #[test]
    fn warnings_can_be_tolerated() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|_| ProcessOutput {
            captured: "warning: implicit truncation of vector type".to_string(),
            ..silent()
        });
        let settings = CompilerSettings {
            output_is_failure: false,
            ..settings(1)
        };

        let report = run_compile_jobs(&session, &three_jobs(), &settings, &runner).unwrap();

        assert_eq!(report.succeeded(), 3);
        assert!(!session.failure_detected());
    }

    #[test]
    fn non_zero_exit_codes_fail() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|_| ProcessOutput {
            exit_code: Some(1),
            ..silent()
        });
        let settings = CompilerSettings {
            output_is_failure: false,
            ..settings(1)
        };

        let report = run_compile_jobs(&session, &three_jobs(), &settings, &runner).unwrap();

        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.skipped(), 2);
    }

    #[test]
    fn timeouts_fail() {
        let session = CompilationSession::new();
        let runner = FakeRunner::new(|_| ProcessOutput {
            exit_code: None,
            timed_out: true,
            ..silent()
        });

        let report = run_compile_jobs(&session, &three_jobs(), &settings(1), &runner).unwrap();

        assert!(matches!(
            &report.outcomes[0].status,
            JobStatus::Failed(reason) if reason == "compiler timed out"
        ));
    }
}
