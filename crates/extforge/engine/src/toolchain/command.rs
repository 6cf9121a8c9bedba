//! Generic command-line toolchain
//!
//! Runs an arbitrary program per unit. Arguments may contain placeholders:
//!
//! | placeholder   | value                                   |
//! |---------------|-----------------------------------------|
//! | `{source}`    | source file path                        |
//! | `{workspace}` | scratch workspace of the job            |
//! | `{stem}`      | file name without extension             |
//! | `{module}`    | dotted module path, e.g. `pkg.b`        |
//! | `{relative}`  | path relative to the scanned root       |
//! | `{opt}`       | optimization level                      |

use super::{apply_acceleration, run_captured, Toolchain, ToolchainFailure, ToolchainRun};
use async_trait::async_trait;
use extforge_types::{CompileJob, ToolchainOptions};
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToolchain {
    program: String,
    args: Vec<String>,
}

impl CommandToolchain {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with placeholders substituted for `job`.
    pub fn expand_args(&self, job: &CompileJob, options: &ToolchainOptions) -> Vec<String> {
        let source = job.unit.path.to_string_lossy();
        let workspace = job.workspace.to_string_lossy();
        let stem = job.unit.stem();
        let module = job.unit.module_name();
        let relative = job.unit.relative_display();
        let opt = options.optimization_level.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{workspace}", &workspace)
                    .replace("{stem}", &stem)
                    .replace("{module}", &module)
                    .replace("{relative}", &relative)
                    .replace("{opt}", &opt)
            })
            .collect()
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    fn name(&self) -> &str {
        &self.program
    }

    async fn build(
        &self,
        job: &CompileJob,
        options: &ToolchainOptions,
    ) -> Result<ToolchainRun, ToolchainFailure> {
        let mut command = Command::new(&self.program);
        command
            .args(self.expand_args(job, options))
            .current_dir(&job.workspace);
        apply_acceleration(&mut command, &options.acceleration);

        run_captured(command, &self.program).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extforge_types::{JobId, SourceUnit};
    use std::path::PathBuf;

    fn job(workspace: PathBuf) -> CompileJob {
        CompileJob::new(
            JobId::new(0),
            SourceUnit::new("/src/pkg/b.c", "pkg/b.c"),
            workspace,
            PathBuf::from("pkg/b.so"),
        )
    }

    #[test]
    fn placeholders_are_expanded() {
        let toolchain = CommandToolchain::new(
            "cc",
            vec![
                "-O{opt}".into(),
                "-o".into(),
                "{workspace}/{stem}.so".into(),
                "{source}".into(),
                "-DMODULE={module}".into(),
                "{relative}".into(),
            ],
        );
        let args = toolchain.expand_args(&job(PathBuf::from("/ws")), &ToolchainOptions::default());
        assert_eq!(
            args,
            vec!["-O2", "-o", "/ws/b.so", "/src/pkg/b.c", "-DMODULE=pkg.b", "pkg/b.c"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_inside_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = CommandToolchain::new(
            "sh",
            vec!["-c".into(), "touch {stem}.so && echo built {module}".into()],
        );
        let run = toolchain
            .build(&job(dir.path().to_path_buf()), &ToolchainOptions::default())
            .await
            .unwrap();
        assert_eq!(run.output, "built pkg.b\n");
        assert!(dir.path().join("b.so").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn acceleration_wraps_the_c_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = CommandToolchain::new("sh", vec!["-c".into(), "echo \"$CC\"".into()]);
        let options = ToolchainOptions {
            acceleration: extforge_types::Acceleration::Explicit(PathBuf::from("/opt/ccache")),
            ..ToolchainOptions::default()
        };
        let run = toolchain
            .build(&job(dir.path().to_path_buf()), &options)
            .await
            .unwrap();
        assert!(run.output.starts_with("/opt/ccache "));
    }
}
