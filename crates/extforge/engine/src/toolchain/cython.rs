//! Cython + setuptools toolchain
//!
//! Each unit gets its own build script in its workspace; the C sources,
//! object files and the extension module all stay under that workspace.

use super::{apply_acceleration, run_captured, Toolchain, ToolchainFailure, ToolchainRun};
use async_trait::async_trait;
use extforge_types::{CompileJob, ToolchainOptions};
use tokio::process::Command;

const BUILD_SCRIPT: &str = r#"import os
import platform
from setuptools import Extension, setup
from Cython.Build import cythonize

MODULE = @MODULE@
SOURCE = @SOURCE@
C_DIR = @C_DIR@
LANGUAGE_LEVEL = @LANGUAGE_LEVEL@
OPT_LEVEL = @OPT_LEVEL@
DEBUG_SYMBOLS = @DEBUG_SYMBOLS@

compile_args = []
link_args = []
if platform.system() != "Windows":
    compile_args.append("-O%d" % OPT_LEVEL)
    if not DEBUG_SYMBOLS:
        compile_args.append("-g0")
        link_args.append("-Wl,-S")

os.chdir(os.path.dirname(SOURCE))
extension = Extension(
    MODULE,
    [os.path.basename(SOURCE)],
    extra_compile_args=compile_args,
    extra_link_args=link_args,
)
extension.cython_c_in_temp = True

setup(
    packages=[],
    zip_safe=False,
    ext_modules=cythonize(
        [extension],
        build_dir=C_DIR,
        quiet=True,
        compiler_directives={"language_level": LANGUAGE_LEVEL, "annotation_typing": False},
    ),
)
"#;

/// Compiles a unit by running a generated setuptools script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CythonToolchain {
    program: String,
    language_level: String,
}

impl CythonToolchain {
    /// `python_version` selects the interpreter, e.g. `3.11` runs `python3.11`.
    pub fn new(python_version: Option<&str>) -> Self {
        let program = match python_version {
            Some(v) if !v.is_empty() => format!("python{v}"),
            _ => "python3".to_string(),
        };
        Self {
            program,
            language_level: "3".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_language_level(mut self, level: impl Into<String>) -> Self {
        self.language_level = level.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Render the build script for one job.
    pub fn render_script(&self, job: &CompileJob, options: &ToolchainOptions) -> String {
        let source = std::path::absolute(&job.unit.path).unwrap_or_else(|_| job.unit.path.clone());
        BUILD_SCRIPT
            .replace("@MODULE@", &py_str(&job.unit.module_name()))
            .replace("@SOURCE@", &py_str(&source.to_string_lossy()))
            .replace("@C_DIR@", &py_str(&job.workspace.join("c").to_string_lossy()))
            .replace("@LANGUAGE_LEVEL@", &py_str(&self.language_level))
            .replace("@OPT_LEVEL@", &options.optimization_level.to_string())
            .replace(
                "@DEBUG_SYMBOLS@",
                if options.debug_symbols { "True" } else { "False" },
            )
    }
}

impl Default for CythonToolchain {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Quote a string as a Python literal. JSON string syntax is a subset.
fn py_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl Toolchain for CythonToolchain {
    fn name(&self) -> &str {
        "cython"
    }

    async fn build(
        &self,
        job: &CompileJob,
        options: &ToolchainOptions,
    ) -> Result<ToolchainRun, ToolchainFailure> {
        let script = job.workspace.join("build.py");
        tokio::fs::write(&script, self.render_script(job, options))
            .await
            .map_err(|e| {
                ToolchainFailure::new(
                    None,
                    format!("failed to write build script {}: {e}", script.display()),
                )
            })?;

        let mut command = Command::new(&self.program);
        command
            .arg(&script)
            .arg("build_ext")
            .arg("--build-lib")
            .arg(job.workspace.join("lib"))
            .arg("--build-temp")
            .arg(job.workspace.join("tmp"))
            .current_dir(&job.workspace);
        apply_acceleration(&mut command, &options.acceleration);

        run_captured(command, &self.program).await
    }
}
