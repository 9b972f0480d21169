use futures_util::future::join_all;
use openclaw_core::{ConfigLoader, SandboxConfig, SandboxRunner};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::tempdir;

fn runner_in(root: &std::path::Path) -> SandboxRunner {
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();
    let config = SandboxConfig {
        scratch_dir: root.join("scratch"),
        working_dir: work,
        ..Default::default()
    };
    SandboxRunner::new(&config).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_never_share_a_scratch_file() {
    let root = tempdir().unwrap();
    let runner = Arc::new(runner_in(root.path()));
    let requests = 32;

    // bash reports the script path it was started with as $0.
    let runs = (0..requests).map(|_| {
        let runner = Arc::clone(&runner);
        async move { runner.run("bash", "echo $0").await.unwrap() }
    });
    let results = join_all(runs).await;

    let scratch = root.path().join("scratch");
    let mut names = HashSet::new();
    for result in &results {
        assert!(result.success, "{}", result.output);
        let script = std::path::Path::new(&result.output);
        assert_eq!(script.parent().unwrap(), scratch.as_path());
        let name = script.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run_") && name.ends_with(".sh"), "{}", name);
        names.insert(name);
    }
    assert_eq!(names.len(), requests);
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
}

#[tokio::test]
async fn test_runner_built_from_yaml_config() {
    let root = tempdir().unwrap();
    let work = root.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    let yaml = format!(
        "sandbox:\n  scratch_dir: {}\n  working_dir: {}\n  max_output_chars: 4\n  allowed_languages: [bash]\n",
        root.path().join("scratch").display(),
        work.display()
    );
    let config = ConfigLoader::from_str_with_env(&yaml, |_| None).unwrap();
    let runner = SandboxRunner::new(&config.sandbox).unwrap();

    let result = runner.run("sh", "echo abcdefgh").await.unwrap();
    assert!(result.truncated);
    assert!(result.output.starts_with("abcd\n"));

    assert!(runner.run("python", "print(1)").await.is_err());
}
