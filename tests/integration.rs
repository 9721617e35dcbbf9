use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn herald_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("herald");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[github]
owner = "acme"
repo = "widgets"
api_base = "http://127.0.0.1:9"

[llm]
base_url = "http://127.0.0.1:9"
{}
"#,
        extra
    );

    let config_path = config_dir.join("herald.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_herald(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = herald_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GITHUB_WEBHOOK_SECRET")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run herald binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, success) = run_herald(&config, &["--help"]);
    assert!(success);
    for cmd in ["generate", "window", "serve", "completions"] {
        assert!(stdout.contains(cmd), "missing {} in help:\n{}", cmd, stdout);
    }
}

#[test]
fn test_generate_without_credentials_fails_fast() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, success) = run_herald(&config, &["generate", "--dry-run"]);
    assert!(!success);
    assert!(
        stderr.contains("missing GitHub or OpenAI credentials"),
        "stderr: {}",
        stderr
    );
    assert!(stderr.contains("GITHUB_TOKEN"));
    assert!(stderr.contains("OPENAI_API_KEY"));
    assert!(!stdout.contains("release notes"));
}

#[test]
fn test_missing_only_llm_key_is_reported() {
    let (_tmp, config) = setup_test_env("");
    let binary = herald_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(&config)
        .args(["window"])
        .env("GITHUB_TOKEN", "ghp_not_a_real_token")
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("OPENAI_API_KEY"));
    assert!(!stderr.contains("ghp_not_a_real_token"));
}

#[test]
fn test_append_requires_output() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, success) = run_herald(&config, &["generate", "--append"]);
    assert!(!success);
    assert!(stderr.contains("--output"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_herald(&tmp.path().join("nope.toml"), &["generate"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config) = setup_test_env("[fetch]\nconcurrency = 0\n");
    let (_, stderr, success) = run_herald(&config, &["generate"]);
    assert!(!success);
    assert!(stderr.contains("fetch.concurrency"), "stderr: {}", stderr);
}

#[test]
fn test_completions_need_no_config() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) =
        run_herald(&tmp.path().join("absent.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("herald"));
}

#[test]
fn test_example_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/herald.example.toml");
    let cfg = release_herald::config::load_config(&path).unwrap();
    assert_eq!(cfg.github.owner, "acme");
    assert_eq!(cfg.fetch.patch_char_cap, 500);
    assert_eq!(cfg.compose.categories.len(), 1);
}
