//! Integration tests for CLI commands that need no cluster

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run helmet command
fn helmet(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_helmet"))
        .args(args)
        .env_remove("HELMET_CONFIG")
        .env_remove("HELMET_LOG")
        .output()
        .expect("Failed to execute helmet")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

mod help {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let output = helmet(&["--help"]);
        assert!(output.status.success());

        let text = stdout(&output);
        for command in [
            "update",
            "install",
            "uninstall",
            "whitelist",
            "blacklist",
            "ensure-whitelisted",
            "digest",
        ] {
            assert!(text.contains(command), "missing {} in help", command);
        }
    }

    #[test]
    fn test_install_requires_a_bundle() {
        let output = helmet(&["install"]);
        assert!(!output.status.success());
    }
}

mod digest_command {
    use super::*;

    #[test]
    fn test_identical_trees_share_a_digest() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for dir in [a.path(), b.path()] {
            write(&dir.join("rendered/one.yaml"), "kind: A\n");
            write(&dir.join("rendered/two.yaml"), "kind: B\n");
        }

        let first = helmet(&["digest", a.path().to_str().unwrap()]);
        let second = helmet(&["digest", b.path().to_str().unwrap()]);

        assert!(first.status.success());
        assert!(stdout(&first).starts_with("sha256:"));
        assert_eq!(stdout(&first), stdout(&second));

        write(&b.path().join("rendered/two.yaml"), "kind: C\n");
        let changed = helmet(&["digest", b.path().to_str().unwrap()]);
        assert_ne!(stdout(&first), stdout(&changed));
    }

    #[test]
    fn test_missing_directory() {
        let output = helmet(&["digest", "/definitely/not/here"]);
        assert_eq!(output.status.code(), Some(2));
    }
}

mod update_command {
    use super::*;

    #[test]
    fn test_missing_charts_directory() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("charts.yaml");
        write(&manifest, "{}\n");

        let output = helmet(&[
            "update",
            "--manifest",
            manifest.to_str().unwrap(),
            "--charts",
            dir.path().join("charts").to_str().unwrap(),
            "--types",
            dir.path().to_str().unwrap(),
        ]);

        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("charts.yaml");
        write(&manifest, "alpha:\n  source: carrierPigeon\n");

        let output = helmet(&[
            "update",
            "--manifest",
            manifest.to_str().unwrap(),
            "--charts",
            dir.path().to_str().unwrap(),
            "--types",
            dir.path().to_str().unwrap(),
        ]);

        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_nothing_selected() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("charts.yaml");
        write(
            &manifest,
            "alpha:\n  source: ociRegistry\n  ociRef: oci://registry.invalid/alpha\n  version: 1.0.0\n",
        );

        let output = helmet(&[
            "update",
            "--manifest",
            manifest.to_str().unwrap(),
            "--charts",
            dir.path().to_str().unwrap(),
            "--types",
            dir.path().to_str().unwrap(),
            "--only",
            "beta",
        ]);

        assert!(output.status.success());
        assert!(stdout(&output).contains("No chart matches"));
    }
}

mod whitelist_command {
    use super::*;

    #[test]
    fn test_invalid_bundle_fails_before_connecting() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("meta.json"), r#"{"name":"Not_Valid","namespace":"ns"}"#);

        let output = helmet(&["whitelist", dir.path().to_str().unwrap()]);
        assert_eq!(output.status.code(), Some(2));
    }
}
