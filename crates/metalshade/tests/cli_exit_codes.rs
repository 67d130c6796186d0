use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn metalshade(home: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_metalshade"))
        .args(args)
        .env("METALSHADE_CONFIG_DIR", home.path().join("config"))
        .env("METALSHADE_DATA_DIR", home.path().join("data"))
        .env_remove("METALSHADE_CONFIG")
        .env("RUST_LOG", "off")
        .output()
        .expect("run metalshade")
}

fn add_program(root: &Path, name: &str) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join(format!("{name}.vert.spv")), b"").unwrap();
    fs::write(root.join(format!("{name}.frag.spv")), b"").unwrap();
}

#[test]
fn empty_catalog_exits_with_one_and_names_search_roots() {
    let home = TempDir::new().unwrap();
    let shaders = home.path().join("empty");
    fs::create_dir_all(&shaders).unwrap();

    let output = metalshade(&home, &["--shader-dir", shaders.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no compiled shaders found"), "stderr: {stderr}");
    assert!(stderr.contains(shaders.to_str().unwrap()), "stderr: {stderr}");
}

#[test]
fn unknown_shader_exits_with_one_and_lists_names() {
    let home = TempDir::new().unwrap();
    let shaders = home.path().join("shaders");
    add_program(&shaders, "plasma");
    add_program(&shaders, "tunnel");

    let output = metalshade(
        &home,
        &["--shader-dir", shaders.to_str().unwrap(), "missing"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'missing'"), "stderr: {stderr}");
    assert!(stderr.contains("plasma, tunnel"), "stderr: {stderr}");
}

#[test]
fn list_prints_catalog_and_exits_cleanly() {
    let home = TempDir::new().unwrap();
    let shaders = home.path().join("shaders");
    add_program(&shaders, "plasma");
    fs::write(shaders.join("orphan.frag.spv"), b"").unwrap();

    let output = metalshade(&home, &["--shader-dir", shaders.to_str().unwrap(), "--list"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Found 1 compiled shader(s)"), "stdout: {stdout}");
    assert!(stdout.contains("  [0] plasma"), "stdout: {stdout}");
    assert!(!stdout.contains("orphan"), "stdout: {stdout}");
}

#[test]
fn invalid_config_exits_with_two() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "version = 7\n").unwrap();

    let output = metalshade(&home, &["--config", config.to_str().unwrap(), "--list"]);

    assert_eq!(output.status.code(), Some(2));
}
