//! End-to-end runs of the orchestrator with the in-process toolchain.

use extforge_engine::{
    scan_with_observer, BuildConfig, BuildPlan, EngineError, ExclusionSet, Orchestrator,
    SimulatedToolchain, WalkOptions,
};
use extforge_types::{FailureStage, RunReport};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

struct Tree {
    dir: tempfile::TempDir,
}

impl Tree {
    fn new(files: &[&str]) -> Self {
        let tree = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        for rel in files {
            tree.write(rel, &format!("body of {rel}\n"));
        }
        tree
    }

    fn write(&self, rel: &str, body: &str) {
        let path = self.src().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn src(&self) -> PathBuf {
        self.root().join("src")
    }

    fn out(&self) -> PathBuf {
        self.root().join("out")
    }

    fn scratch(&self) -> PathBuf {
        self.root().join("scratch")
    }

    fn config(&self) -> BuildConfig {
        let mut config = BuildConfig {
            source_dir: Some(self.src()),
            output_dir: self.out(),
            scratch_dir: self.scratch(),
            ..BuildConfig::default()
        };
        config.layout.source_extension = "src".into();
        config.layout.artifact_extension = "bin".into();
        config.layout.skip_file_names = Vec::new();
        config
    }

    async fn run(&self, config: &BuildConfig) -> RunReport {
        orchestrator(config).run().await.unwrap()
    }
}

fn orchestrator(config: &BuildConfig) -> Orchestrator {
    let plan = BuildPlan::resolve(config).unwrap();
    Orchestrator::new(plan, Arc::new(SimulatedToolchain::new("bin")))
}

/// Files under `root`, relative and `/`-joined.
fn files_under(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn unit_paths(report: &RunReport) -> Vec<String> {
    report
        .outcomes
        .iter()
        .map(|o| o.unit().relative_display())
        .collect()
}

#[tokio::test]
async fn excluded_directory_is_pruned() {
    let tree = Tree::new(&["a.src", "pkg/b.src", "pkg/tests/c.src"]);
    let mut config = tree.config();
    config.exclude = vec!["pkg/tests".into()];

    let report = tree.run(&config).await;

    assert_eq!(unit_paths(&report), vec!["a.src", "pkg/b.src"]);
    assert_eq!(files_under(&tree.out()), set(&["a.bin", "pkg/b.bin"]));
    assert!(!report.failed());
}

#[tokio::test]
async fn excluded_file_leaves_siblings_alone() {
    let tree = Tree::new(&["pkg/b.src", "pkg/c.src"]);
    let mut config = tree.config();
    config.exclude = vec!["pkg/b.src".into()];

    let report = tree.run(&config).await;

    assert_eq!(unit_paths(&report), vec!["pkg/c.src"]);
    assert_eq!(files_under(&tree.out()), set(&["pkg/c.bin"]));
}

#[test]
fn excluded_directory_is_never_opened() {
    let tree = Tree::new(&["a.src", "pkg/b.src", "pkg/tests/c.src", "pkg/tests/deep/d.src"]);
    let exclusions = ExclusionSet::parse_list("pkg/tests", &[]);
    let options = WalkOptions {
        source_extension: "src".into(),
        skip_file_names: Vec::new(),
        include_resources: false,
    };

    let mut opened = Vec::new();
    let units = scan_with_observer(&tree.src(), &exclusions, options, |p| {
        opened.push(p.to_path_buf())
    })
    .unwrap()
    .units()
    .unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(opened, vec![PathBuf::new(), PathBuf::from("pkg")]);
    assert!(opened.iter().all(|p| !p.starts_with("pkg/tests")));
}

#[tokio::test]
async fn one_malformed_unit_is_isolated() {
    let names: Vec<String> = (0..10).map(|i| format!("m{i}.src")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = Tree::new(&refs);
    tree.write("m4.src", "def broken(:  #error\n");
    let mut config = tree.config();
    config.workers = 4;

    let report = tree.run(&config).await;

    assert_eq!(report.attempted, 10);
    assert_eq!(report.succeeded(), 9);
    assert_eq!(report.failed_count(), 1);
    assert!(report.failed());
    let failure = &report.failures[0];
    assert_eq!(failure.relative_path, "m4.src");
    assert_eq!(failure.stage, FailureStage::Compile);
    assert_eq!(failure.diagnostics, "m4.src:1: def broken(:  #error\n");
    assert_eq!(files_under(&tree.out()).len(), 9);
    assert!(!tree.out().join("m4.bin").exists());
}

#[tokio::test]
async fn worker_count_does_not_change_the_report() {
    let names: Vec<String> = (0..20).map(|i| format!("d{}/m{i:02}.src", i % 4)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = Tree::new(&refs);
    tree.write("d1/m05.src", "#error here\n");

    let mut config = tree.config();
    config.workers = 1;
    let sequential = tree.run(&config).await;
    let sequential_out = files_under(&tree.out());

    config.workers = 8;
    config.clean_output = true;
    let pooled = tree.run(&config).await;

    assert_eq!(unit_paths(&sequential), unit_paths(&pooled));
    assert_eq!(sequential.placed, pooled.placed);
    assert_eq!(sequential.failures, pooled.failures);
    assert_eq!(sequential.succeeded(), 19);
    assert_eq!(sequential_out, files_under(&tree.out()));
}

#[tokio::test]
async fn release_runs_are_idempotent() {
    let tree = Tree::new(&["a.src", "pkg/b.src", "pkg/sub/c.src"]);
    let mut config = tree.config();
    config.release = true;

    tree.run(&config).await;
    let first = files_under(&tree.out());
    tree.run(&config).await;
    let second = files_under(&tree.out());

    assert_eq!(first, second);
    assert_eq!(first, set(&["a.bin", "pkg/b.bin", "pkg/sub/c.bin"]));
}

#[tokio::test]
async fn workspaces_are_kept_unless_release() {
    let tree = Tree::new(&["a.src", "pkg/b.src"]);
    tree.write("bad.src", "#error\n");
    let config = tree.config();

    let orchestrator = orchestrator(&config);
    let report = orchestrator.run().await.unwrap();
    assert!(report.failed());
    let run_root = orchestrator.run_root();
    assert!(run_root.is_dir());
    assert_eq!(fs::read_dir(&run_root).unwrap().count(), 3);

    let mut config = tree.config();
    config.release = true;
    config.clean_output = true;
    let orchestrator = self::orchestrator(&config);
    orchestrator.run().await.unwrap();
    assert!(!orchestrator.run_root().exists());
    // only the earlier non-release run is left behind
    assert_eq!(fs::read_dir(tree.scratch()).unwrap().count(), 1);
}

#[tokio::test]
async fn release_leaves_only_the_output_root() {
    let tree = Tree::new(&["a.src"]);
    tree.write("bad.src", "#error\n");
    let mut config = tree.config();
    config.release = true;

    tree.run(&config).await;

    assert!(!tree.scratch().exists());
    assert_eq!(files_under(&tree.out()), set(&["a.bin"]));
}

#[tokio::test]
async fn single_file_mode_compiles_one_unit() {
    let tree = Tree::new(&["a.src", "pkg/b.src"]);
    let mut config = tree.config();
    config.source_dir = None;
    config.source_file = Some(tree.src().join("pkg/b.src"));

    let report = tree.run(&config).await;

    assert_eq!(unit_paths(&report), vec!["b.src"]);
    assert_eq!(files_under(&tree.out()), set(&["b.bin"]));
}

#[tokio::test]
async fn resources_are_copied_when_enabled() {
    let tree = Tree::new(&["a.src", "pkg/data.json", "pkg/tests/fixture.json"]);
    let mut config = tree.config();
    config.exclude = vec!["pkg/tests".into()];

    tree.run(&config).await;
    assert_eq!(files_under(&tree.out()), set(&["a.bin"]));

    config.copy_resources = true;
    let report = tree.run(&config).await;
    assert_eq!(report.resources, vec![PathBuf::from("pkg/data.json")]);
    assert_eq!(files_under(&tree.out()), set(&["a.bin", "pkg/data.json"]));
}

#[tokio::test]
async fn clean_output_removes_stale_artifacts() {
    let tree = Tree::new(&["a.src"]);
    fs::create_dir_all(tree.out()).unwrap();
    fs::write(tree.out().join("stale.bin"), "old").unwrap();
    let mut config = tree.config();

    tree.run(&config).await;
    assert!(tree.out().join("stale.bin").exists());

    config.clean_output = true;
    tree.run(&config).await;
    assert_eq!(files_under(&tree.out()), set(&["a.bin"]));
}

#[tokio::test]
async fn output_inside_source_is_not_rescanned() {
    let tree = Tree::new(&["a.src", "pkg/b.src"]);
    let mut config = tree.config();
    config.output_dir = tree.src().join("dist");
    config.scratch_dir = tree.src().join(".scratch");

    tree.run(&config).await;
    let report = tree.run(&config).await;

    assert_eq!(unit_paths(&report), vec!["a.src", "pkg/b.src"]);
}

#[tokio::test]
async fn tree_without_units_is_rejected_before_output() {
    let tree = Tree::new(&["README.md", "pkg/data.json"]);
    let mut config = tree.config();
    config.copy_resources = true;

    let err = orchestrator(&config).run().await.unwrap_err();

    assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("no files to compile")));
    assert!(!tree.out().exists());
    assert!(!tree.scratch().exists());
}

#[tokio::test]
async fn package_markers_are_carried_by_default() {
    let tree = Tree::new(&["pkg/__init__.src", "pkg/b.src", "pkg/data.json"]);
    let mut config = tree.config();
    config.layout.skip_file_names = vec!["__init__.src".into()];

    let report = tree.run(&config).await;

    assert_eq!(unit_paths(&report), vec!["pkg/b.src"]);
    assert_eq!(report.resources, vec![PathBuf::from("pkg/__init__.src")]);
    assert_eq!(
        files_under(&tree.out()),
        set(&["pkg/__init__.src", "pkg/b.bin"])
    );
    assert_eq!(
        fs::read_to_string(tree.out().join("pkg/__init__.src")).unwrap(),
        "body of pkg/__init__.src\n"
    );
}

#[tokio::test]
async fn missing_root_is_a_discovery_error() {
    let tree = Tree::new(&["a.src"]);
    let mut config = tree.config();
    config.source_dir = Some(tree.root().join("missing"));

    assert!(matches!(
        BuildPlan::resolve(&config),
        Err(EngineError::Discovery { .. })
    ));
}

#[tokio::test]
async fn invalid_inputs_are_configuration_errors() {
    let tree = Tree::new(&["a.src"]);

    let mut config = tree.config();
    config.workers = 0;
    assert!(matches!(
        Orchestrator::from_config(&config),
        Err(EngineError::Configuration(_))
    ));

    let mut config = tree.config();
    config.source_file = Some(tree.src().join("a.src"));
    assert!(matches!(
        Orchestrator::from_config(&config),
        Err(EngineError::Configuration(_))
    ));

    let mut config = tree.config();
    config.toolchain.kind = extforge_engine::ToolchainKind::Command;
    assert!(matches!(
        Orchestrator::from_config(&config),
        Err(EngineError::Configuration(_))
    ));
    // nothing was written
    assert!(!tree.out().exists());
    assert!(!tree.scratch().exists());
}
