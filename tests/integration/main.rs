//! Integration tests for Ferry

mod fetch;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use ferry::{Algorithm, Digest};
    use predicates::prelude::*;
    use tempfile::TempDir;

    const INDEX: &str = r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[]}"#;

    /// Binary isolated from the user's config, pointed at a temp store
    fn ferry(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("ferry");
        cmd.arg("--config")
            .arg(dir.path().join("config.toml"))
            .arg("--store")
            .arg(dir.path().join("store"));
        cmd
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("ferry")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fetch-and-cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("ferry")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ferry"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        ferry(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        ferry(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[fetch]"));
    }

    #[test]
    fn list_empty_store() {
        let dir = TempDir::new().unwrap();
        ferry(&dir)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached artifacts"));
    }

    #[test]
    fn exists_absent_digest_fails_quietly() {
        let dir = TempDir::new().unwrap();
        let digest = Digest::of_bytes(Algorithm::Sha256, b"absent");
        ferry(&dir)
            .args(["exists", &digest.to_string()])
            .assert()
            .failure()
            .stderr(predicate::str::is_empty());
    }

    #[test]
    fn exists_rejects_malformed_digest() {
        let dir = TempDir::new().unwrap();
        ferry(&dir)
            .args(["exists", "sha256:nothex"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid digest"));
    }

    #[test]
    fn fetch_rejects_bad_request_file() {
        let dir = TempDir::new().unwrap();
        let requests = dir.path().join("requests.json");
        std::fs::write(&requests, r#"{"sha256:short": {"origin": "remote-registry", "name": "x"}}"#)
            .unwrap();

        ferry(&dir)
            .arg("fetch")
            .arg(&requests)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid request set"));
    }

    #[test]
    fn fetch_of_cached_digest_needs_no_retriever() {
        let dir = TempDir::new().unwrap();
        let digest = Digest::of_bytes(Algorithm::Sha256, INDEX.as_bytes());

        let entry = dir.path().join("store").join(digest.to_string());
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("manifest.json"), INDEX).unwrap();

        let requests = dir.path().join("requests.json");
        std::fs::write(
            &requests,
            format!(r#"{{"{digest}": {{"origin": "remote-registry", "name": "example/img"}}}}"#),
        )
        .unwrap();

        // A skopeo that cannot run proves nothing was retrieved
        std::fs::write(
            dir.path().join("config.toml"),
            "[retriever]\nskopeo = \"/nonexistent/skopeo\"\n",
        )
        .unwrap();

        ferry(&dir)
            .args(["fetch", "--format", "plain"])
            .arg(&requests)
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("{} cached", digest)));

        ferry(&dir)
            .args(["exists", &digest.to_string()])
            .assert()
            .success();

        ferry(&dir)
            .arg("verify")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 checked, 0 problem(s)"));
    }

    #[test]
    fn verify_flags_corrupt_entry() {
        let dir = TempDir::new().unwrap();
        let digest = Digest::of_bytes(Algorithm::Sha256, INDEX.as_bytes());

        let entry = dir.path().join("store").join(digest.to_string());
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("manifest.json"), "tampered").unwrap();

        ferry(&dir)
            .arg("verify")
            .assert()
            .failure()
            .stdout(predicate::str::contains("[CORRUPT]"));
    }

    #[test]
    fn verify_reports_entry_without_manifest_and_continues() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("store");

        let good = Digest::of_bytes(Algorithm::Sha256, INDEX.as_bytes());
        std::fs::create_dir_all(store.join(good.to_string())).unwrap();
        std::fs::write(store.join(good.to_string()).join("manifest.json"), INDEX).unwrap();

        let empty = Digest::of_bytes(Algorithm::Sha256, b"lost its manifest");
        std::fs::create_dir_all(store.join(empty.to_string())).unwrap();

        ferry(&dir)
            .arg("verify")
            .assert()
            .failure()
            .stdout(predicate::str::contains(format!("[CORRUPT] {}", empty)))
            .stdout(predicate::str::contains(format!("[OK] {}", good)))
            .stdout(predicate::str::contains("2 checked, 1 problem(s)"));
    }
}
