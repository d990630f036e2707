use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use branch_archiver::{
    backend::{Backend, FilesystemBackend, TriggerStore},
    ArchiveBuilder, EventRouter, ExtraMembers, RefOutcome, RepositoryRef, RouterSettings,
};
use tempfile::TempDir;

const COMMIT: &str = "4c9a1e7";

/// Lay out a filesystem backend root with one snapshot of `repo` at COMMIT
fn create_backend_root(dir: &Path) -> PathBuf {
    let root = dir.join("root");
    let snapshot = root.join("repositories/repo").join(COMMIT);
    fs::create_dir_all(snapshot.join("src")).unwrap();
    fs::write(snapshot.join("README.md"), "# repo\n").unwrap();
    fs::write(snapshot.join("src/main.go"), "package main\n").unwrap();
    fs::write(
        root.join(format!("repositories/repo/{}.commit.json", COMMIT)),
        format!(r#"{{"commit": {{"commitId": "{}", "message": "initial"}}}}"#, COMMIT),
    )
    .unwrap();
    root
}

fn write_config(dir: &Path, root: &Path) -> PathBuf {
    let config_path = dir.join("config.yaml");
    fs::write(
        &config_path,
        format!(
            "backend: filesystem\nfilesystem_root: {}\nprotected_branches: [master]\n",
            root.display()
        ),
    )
    .unwrap();
    config_path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_branch-archiver"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run branch-archiver")
}

fn event(reference: &str, created: bool, deleted: bool) -> String {
    serde_json::json!({
        "Records": [{
            "eventSourceARN": "arn:aws:codecommit:us-east-1:123456789012:repo",
            "eventTime": "2024-03-01T10:00:00.000+0000",
            "customData": r#"{"pipeline_exec_function": "arn:aws:lambda:us-east-1:123456789012:function:exec", "pipeline_name": "pipe", "bucket": "bkt"}"#,
            "codecommit": {
                "references": [{
                    "commit": COMMIT,
                    "ref": reference,
                    "created": created,
                    "deleted": deleted
                }]
            }
        }]
    })
    .to_string()
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Member names and (version made by, external attributes) from the central directory
fn central_directory(zip: &[u8]) -> Vec<(String, u16, u32)> {
    let eocd = zip.len() - 22;
    assert_eq!(u32_at(zip, eocd), 0x0605_4b50);
    let count = u16_at(zip, eocd + 10) as usize;
    let mut at = u32_at(zip, eocd + 16) as usize;

    let mut entries = Vec::new();
    for _ in 0..count {
        assert_eq!(u32_at(zip, at), 0x0201_4b50);
        let name_len = u16_at(zip, at + 28) as usize;
        let extra_len = u16_at(zip, at + 30) as usize;
        let comment_len = u16_at(zip, at + 32) as usize;
        let name = String::from_utf8(zip[at + 46..at + 46 + name_len].to_vec()).unwrap();
        entries.push((name, u16_at(zip, at + 4), u32_at(zip, at + 38)));
        at += 46 + name_len + extra_len + comment_len;
    }
    entries
}

#[test]
fn test_archive_command_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let root = create_backend_root(temp.path());
    let config = write_config(temp.path(), &root);
    let extra = temp.path().join("info.json");
    fs::write(&extra, "{}").unwrap();
    let member = format!("commit_info.json={}", extra.display());

    let first = temp.path().join("first.zip");
    let second = temp.path().join("second.zip");
    for out in [&first, &second] {
        let output = run(
            &config,
            &[
                "archive",
                "--repository",
                "repo",
                "--specifier",
                COMMIT,
                "--output",
                out.to_str().unwrap(),
                "--member",
                &member,
            ],
        );
        assert!(
            output.status.success(),
            "archive failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(String::from_utf8_lossy(&output.stdout).contains("3 members"));
    }

    let first = fs::read(first).unwrap();
    assert_eq!(first, fs::read(second).unwrap());

    let entries = central_directory(&first);
    let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(names, vec!["README.md", "src/main.go", "commit_info.json"]);
    for (name, made_by, attributes) in &entries {
        assert_eq!(made_by >> 8, 0, "{} not marked as MS-DOS", name);
        assert_eq!(*attributes, 0, "{} carries permissions", name);
    }
}

#[test]
fn test_create_then_delete_event_lifecycle() {
    let temp = TempDir::new().unwrap();
    let root = create_backend_root(temp.path());
    let config = write_config(temp.path(), &root);

    let create = temp.path().join("create.json");
    fs::write(&create, event("refs/heads/feature", true, false)).unwrap();
    let output = run(&config, &["handle-event", "--event", create.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("published repo:feature to artifacts/pipe"), "{}", stdout);

    let blob = fs::read(root.join("buckets/bkt/artifacts/pipe")).unwrap();
    let names: Vec<String> = central_directory(&blob).into_iter().map(|e| e.0).collect();
    assert_eq!(names, vec!["README.md", "src/main.go", "commit_info.json"]);

    let executions = fs::read_to_string(root.join("pipelines/executions.log")).unwrap();
    assert_eq!(executions.lines().count(), 1);
    assert!(executions.trim_end().ends_with("\tpipe"));

    let backend = FilesystemBackend::new(&root).unwrap();
    let triggers = backend.get_triggers("repo").unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].name, "trigger-feature-updates");

    let delete = temp.path().join("delete.json");
    fs::write(&delete, event("refs/heads/feature", false, true)).unwrap();
    let output = run(&config, &["handle-event", "--event", delete.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(backend.get_triggers("repo").unwrap().is_empty());
}

#[test]
fn test_failed_event_still_exits_successfully() {
    let temp = TempDir::new().unwrap();
    let root = create_backend_root(temp.path());
    let config = write_config(temp.path(), &root);

    // Snapshot for this commit does not exist
    let update = event("refs/heads/feature", false, false).replace(COMMIT, "deadbeef");
    let path = temp.path().join("update.json");
    fs::write(&path, update).unwrap();

    let output = run(&config, &["handle-event", "--event", path.to_str().unwrap()]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("failed refs/heads/feature"));
    assert!(!root.join("buckets/bkt/artifacts/pipe").exists());
}

#[test]
fn test_triggers_commands_round_trip() {
    let temp = TempDir::new().unwrap();
    let root = create_backend_root(temp.path());
    let config = write_config(temp.path(), &root);

    for branch in ["a", "b"] {
        let output = run(
            &config,
            &[
                "triggers",
                "put",
                "--repository",
                "repo",
                "--branch",
                branch,
                "--destination",
                "arn:exec",
                "--pipeline-name",
                "pipe",
                "--bucket",
                "bkt",
            ],
        );
        assert!(output.status.success());
    }

    let output = run(&config, &["triggers", "remove", "--repository", "repo", "--branch", "a"]);
    assert!(output.status.success());

    let output = run(&config, &["triggers", "list", "--repository", "repo"]);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "trigger-b-updates\tarn:exec\tb\n"
    );
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp = TempDir::new().unwrap();
    let output = run(
        &temp.path().join("absent.yaml"),
        &["triggers", "list", "--repository", "repo"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_library_router_against_filesystem_backend() {
    let temp = TempDir::new().unwrap();
    let root = create_backend_root(temp.path());
    let backend = FilesystemBackend::new(&root).unwrap();
    backend.initialize().unwrap();

    let router = EventRouter::new(&backend, RouterSettings::default());
    let outcomes = router.handle_event(&event("refs/heads/master", false, false));
    assert!(matches!(outcomes.as_slice(), [RefOutcome::Skipped { .. }]));

    let outcomes = router.handle_event(&event("refs/heads/topic", false, false));
    assert!(matches!(outcomes.as_slice(), [RefOutcome::Published { .. }]));

    // The published blob matches a direct build with the same extra member
    let published = fs::read(root.join("buckets/bkt/artifacts/pipe")).unwrap();
    let names: Vec<String> = central_directory(&published)
        .into_iter()
        .map(|e| e.0)
        .collect();
    assert_eq!(names.last().map(String::as_str), Some("commit_info.json"));

    let direct = ArchiveBuilder::new(&backend)
        .build(&RepositoryRef::new("repo", COMMIT), &ExtraMembers::new())
        .unwrap();
    assert_eq!(direct.members(), ["README.md", "src/main.go"]);
}
