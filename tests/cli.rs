#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const ARTIFACT: &str = "packer_virtualbox-iso_virtualbox.box";

fn vmagent(dir: &Path) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("vmagent").into();
    cmd.current_dir(dir).env("XDG_DATA_HOME", dir.join("data"));
    cmd
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Fake `packer` and `vagrant` that append their arguments to `calls.log`
/// in the working directory. `vagrant box list` prints `boxes.txt`.
fn setup(dir: &tempfile::TempDir) -> PathBuf {
    let bin = dir.path().join("bin");
    std::fs::create_dir(&bin).unwrap();

    write_script(
        &bin.join("packer"),
        &format!(
            r#"echo "packer $*" >> calls.log
if [ -e {ARTIFACT} ]; then echo "stale artifact present" >> calls.log; fi
echo "==> virtualbox-iso: Exporting box"
echo box > {ARTIFACT}
"#
        ),
    );
    write_script(
        &bin.join("vagrant"),
        r#"echo "vagrant $*" >> calls.log
if [ "$1 $2" = "box list" ] && [ -f boxes.txt ]; then cat boxes.txt; fi
exit 0
"#,
    );

    let config = dir.path().join("vmagent.toml");
    std::fs::write(
        &config,
        format!(
            "[tools]\npacker = \"{}\"\nvagrant = \"{}\"\n",
            bin.join("packer").display(),
            bin.join("vagrant").display()
        ),
    )
    .unwrap();
    config
}

fn calls(dir: &tempfile::TempDir) -> Vec<String> {
    std::fs::read_to_string(dir.path().join("calls.log"))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

const REQUIRED: [&str; 6] = [
    "--token",
    "abc123",
    "--vm_number",
    "2",
    "--google_credential",
    "/keys/sa.json",
];

#[test]
fn help_works() {
    let dir = tempfile::tempdir().unwrap();
    vmagent(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Set up Buildkite agents"))
        .stdout(predicate::str::contains("--vm_number"));
}

#[test]
fn missing_required_flags() {
    let dir = tempfile::tempdir().unwrap();
    vmagent(dir.path())
        .args(["--token", "abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--vm_number"));
}

#[test]
fn full_run_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir);

    vmagent(dir.path())
        .args(REQUIRED)
        .assert()
        .success()
        .stdout(predicate::str::contains("Vagrant box successfully generated."))
        .stdout(predicate::str::contains("2 agent VM(s) from box 'buildkite_agent' are up."));

    let expected = vec![
        "packer build -var agent_token=abc123 -var memory=1024 -var google_credential=/keys/sa.json build.json".to_string(),
        "vagrant box list".to_string(),
        format!("vagrant box add --name buildkite_agent {ARTIFACT}"),
        "vagrant up".to_string(),
    ];
    assert_eq!(calls(&dir), expected);

    let vagrantfile = std::fs::read_to_string(dir.path().join("Vagrantfile")).unwrap();
    assert!(vagrantfile.contains(r#"config.vm.box = "buildkite_agent""#));
    assert!(vagrantfile.contains("(1..2).each"));
    assert!(vagrantfile.contains("vb.memory = 1024"));
    assert!(vagrantfile.contains("vb.cpus = 1"));
}

#[test]
fn stale_artifact_and_existing_box_replaced() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir);
    std::fs::write(dir.path().join(ARTIFACT), "old").unwrap();
    std::fs::write(dir.path().join("boxes.txt"), "ci_agent (virtualbox, 0)\n").unwrap();

    vmagent(dir.path())
        .args(REQUIRED)
        .args(["--name", "ci_agent", "--memory", "4096", "--cpus", "4"])
        .assert()
        .success();

    let calls = calls(&dir);
    assert!(!calls.iter().any(|c| c == "stale artifact present"));
    assert_eq!(
        &calls[1..],
        &[
            "vagrant box list".to_string(),
            "vagrant box remove ci_agent".into(),
            format!("vagrant box add --name ci_agent {ARTIFACT}"),
            "vagrant up".into(),
        ]
    );
    assert_eq!(std::fs::read_to_string(dir.path().join(ARTIFACT)).unwrap(), "box\n");

    let vagrantfile = std::fs::read_to_string(dir.path().join("Vagrantfile")).unwrap();
    assert!(vagrantfile.contains("vb.memory = 4096"));
    assert!(vagrantfile.contains("vb.cpus = 4"));
}

#[test]
fn token_not_echoed() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir);

    vmagent(dir.path())
        .args(REQUIRED)
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123").not())
        .stderr(predicate::str::contains("agent_token=****"));
}

#[test]
fn custom_template() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(&dir);
    std::fs::write(
        dir.path().join("agents.j2"),
        "{{ name }}:{{ number }}:{{ memory }}:{{ cpus }}\n",
    )
    .unwrap();
    let mut contents = std::fs::read_to_string(&config).unwrap();
    contents.push_str("\n[vagrant]\ntemplate = \"agents.j2\"\n");
    std::fs::write(&config, contents).unwrap();

    vmagent(dir.path()).args(REQUIRED).assert().success();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("Vagrantfile")).unwrap(),
        "buildkite_agent:2:1024:1\n"
    );
}

#[test]
fn failing_tool_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir);
    write_script(
        &dir.path().join("bin").join("vagrant"),
        "echo \"vagrant $*\" >> calls.log\nexit 1\n",
    );

    vmagent(dir.path())
        .args(REQUIRED)
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished with failing tool steps"));

    assert_eq!(calls(&dir).last().map(String::as_str), Some("vagrant up"));
}

#[test]
fn missing_tool_is_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("vmagent.toml"),
        "[tools]\npacker = \"/nonexistent/packer\"\n",
    )
    .unwrap();

    vmagent(dir.path())
        .args(REQUIRED)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to run /nonexistent/packer"));
}

#[test]
fn missing_explicit_config_shows_error() {
    let dir = tempfile::tempdir().unwrap();
    vmagent(dir.path())
        .args(REQUIRED)
        .args(["--config", "/nonexistent/vmagent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn explicit_default_named_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    vmagent(dir.path())
        .args(REQUIRED)
        .args(["--config", "vmagent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn tool_output_logged() {
    let dir = tempfile::tempdir().unwrap();
    setup(&dir);

    vmagent(dir.path()).args(REQUIRED).assert().success();

    let logs = dir.path().join("data").join("vmagent").join("logs");
    let names: Vec<String> = std::fs::read_dir(&logs)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n == "vmagent.log"));
    let build_log = names
        .iter()
        .find(|n| n.ends_with("_packer-build_ok.log"))
        .unwrap();
    let contents = std::fs::read_to_string(logs.join(build_log)).unwrap();
    assert!(contents.contains("Exporting box"));
}
