//! End-to-end tests that drive the `fsh` binary through piped stdin.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use fleet_shell_core::vault::{envelope, Secret};
use tempfile::TempDir;

fn run_fsh(arguments: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fsh"))
        .args(arguments)
        .arg("--no-color")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();

    child.wait_with_output().unwrap()
}

fn write(directory: &Path, relative: &str, contents: &str) {
    let path = directory.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn test_setup_on_localhost() {
    let directory = TempDir::new().unwrap();
    write(directory.path(), "hosts", "localhost ansible_connection=local\n");
    let inventory = directory.path().join("hosts");

    let output = run_fsh(&["-i", inventory.to_str().unwrap()], "cd all\nsetup\n");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("localhost | SUCCESS >>"));
    assert!(stdout.contains("\"ansible_hostname\""));
}

#[test]
fn test_vaulted_variable_is_decrypted_in_memory_only() {
    let directory = TempDir::new().unwrap();
    let secret = Secret::new("s3cret-pass".to_string());
    write(
        directory.path(),
        "hosts",
        "[secret]\nvaulted ansible_connection=local\n",
    );
    write(
        directory.path(),
        "group_vars/secret.yml",
        &envelope::encrypt(b"db_password: plaintext-value-42\n", &secret).unwrap(),
    );
    write(directory.path(), "vault_pass.txt", "s3cret-pass\n");

    let inventory = directory.path().join("hosts");
    let password_file = directory.path().join("vault_pass.txt");
    let output = run_fsh(
        &[
            "-i",
            inventory.to_str().unwrap(),
            "--vault-password-file",
            password_file.to_str().unwrap(),
        ],
        "cd secret\n!echo {{ db_password }}\nexit\n",
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("plaintext-value-42"));

    let on_disk = fs::read_to_string(directory.path().join("group_vars/secret.yml")).unwrap();
    assert!(!on_disk.contains("plaintext-value-42"));
}

#[test]
fn test_unknown_scope_keeps_current_scope() {
    let directory = TempDir::new().unwrap();
    write(
        directory.path(),
        "hosts",
        "[web]\nweb1 ansible_connection=local\n[db]\ndb1 ansible_connection=local\n",
    );
    let inventory = directory.path().join("hosts");

    let output = run_fsh(
        &["-i", inventory.to_str().unwrap()],
        "cd web\ncd wb\n!echo still {{ inventory_hostname }}\n",
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("ERROR: Unknown scope `wb` (did you mean: "));
    assert!(stdout.contains("still web1"));
    assert!(!stdout.contains("still db1"));
}

#[test]
fn test_missing_inventory_fails_to_start() {
    let output = run_fsh(&["-i", "/nonexistent/fleet/hosts"], "");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/fleet/hosts"));
}
