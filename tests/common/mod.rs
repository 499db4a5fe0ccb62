use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::Path;

pub fn treeseal_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("treeseal");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// Seals `cwd` and expects a clean exit.
pub fn seal_clean(cwd: &Path, args: &[&str]) {
    treeseal_cmd(cwd).arg("seal").args(args).assert().success();
}

// Each integration test file is compiled as its own crate, and not all of
// them build trees with nested files.
#[allow(dead_code)]
pub fn write_file(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[allow(dead_code)]
pub fn generation_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root.join(".treeseal"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.starts_with("generation-"))
        .collect();
    names.sort();
    names
}
