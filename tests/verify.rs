mod common;

use common::{generation_files, seal_clean, treeseal_cmd, write_file};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn sealed_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "file.txt", "hello");
    write_file(temp.path(), "docs/a.md", "alpha");
    write_file(temp.path(), "docs/b.md", "beta");
    seal_clean(temp.path(), &[]);
    temp
}

#[test]
fn verify_success_when_clean() {
    let temp = sealed_tree();

    treeseal_cmd(temp.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(generation_files(temp.path()).len(), 1);
}

#[test]
fn verify_never_writes() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "file.txt", "hello");

    treeseal_cmd(temp.path()).arg("verify").assert().success();

    assert!(!temp.path().join(".treeseal").exists());
}

#[test]
fn verify_content_mismatch_exits_1() {
    let temp = sealed_tree();
    write_file(temp.path(), "docs/a.md", "alpha, corrupted");

    treeseal_cmd(temp.path())
        .arg("verify")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("M  docs/a.md"))
        .stdout(predicate::str::contains("D  docs"))
        .stderr(predicate::str::contains("Verification failed"));
}

#[test]
fn verify_renamed_file_exits_3() {
    let temp = sealed_tree();
    fs::rename(
        temp.path().join("docs/b.md"),
        temp.path().join("docs/c.md"),
    )
    .unwrap();

    treeseal_cmd(temp.path())
        .arg("verify")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("R  docs/b.md"))
        .stdout(predicate::str::contains("A  docs/c.md"));
}

#[test]
fn verify_missing_file_exits_4() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "file.txt", "hello");
    write_file(temp.path(), "gone.txt", "bye");
    seal_clean(temp.path(), &["--no-directory-hashes"]);

    fs::remove_file(temp.path().join("gone.txt")).unwrap();

    treeseal_cmd(temp.path())
        .arg("verify")
        .arg("--no-directory-hashes")
        .assert()
        .code(4)
        .stdout(predicate::str::diff("R  gone.txt\n"));
}

#[test]
fn verify_unexpected_file_exits_5() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "file.txt", "hello");
    seal_clean(temp.path(), &["--no-directory-hashes"]);

    write_file(temp.path(), "new.txt", "new");

    treeseal_cmd(temp.path())
        .arg("verify")
        .arg("--no-directory-hashes")
        .assert()
        .code(5)
        .stdout(predicate::str::diff("A  new.txt\n"));
}

#[test]
fn verify_detects_tampered_generation() {
    let temp = sealed_tree();
    let path = temp.path().join(".treeseal/generation-000001.toml");
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("original", "verified")).unwrap();

    treeseal_cmd(temp.path())
        .arg("verify")
        .assert()
        .code(255)
        .stderr(predicate::str::contains(
            "generation-000001.toml does not match its chain entry",
        ));
}

#[test]
fn verify_rejects_unknown_format() {
    let temp = sealed_tree();

    treeseal_cmd(temp.path())
        .arg("verify")
        .arg("--format")
        .arg("md5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported hash format: md5"));
}

#[test]
fn verify_with_parallel_jobs() {
    let temp = TempDir::new().unwrap();
    for i in 0..30 {
        write_file(temp.path(), &format!("d{}/f{i}.txt", i % 3), &"z".repeat(i * 311));
    }
    seal_clean(temp.path(), &["--jobs", "1"]);

    treeseal_cmd(temp.path())
        .arg("verify")
        .arg("--jobs")
        .arg("6")
        .assert()
        .success();
}
