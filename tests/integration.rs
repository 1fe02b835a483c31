use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gitkb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gitkb");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("decks")).unwrap();
    fs::write(
        files_dir.join("alpha-notes.md"),
        "# Alpha\n\nMigrated 420 hosts to OpenShift Virtualization with zero P1s.\n\nMore detail below.",
    )
    .unwrap();
    fs::write(
        files_dir.join("decks/pricing-sheet.md"),
        "# Pricing\n\nQ4 rate card for managed services.",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nNotes about deployment and infrastructure.",
    )
    .unwrap();
    fs::write(
        files_dir.join("eks_module.tf"),
        "# Terraform module for AWS EKS\nmodule \"eks\" {}\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
kind = "files"
root = "{}/kb"

[server]
bind = "127.0.0.1:8731"

[catalog]
stale_after_days = 90
default_author = "Test Runner"
default_owners = ["kb-tests@example.com"]

[import]
include_globs = ["**/*"]
exclude_globs = []
"#,
        root.display()
    );

    let config_path = config_dir.join("gitkb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .join("files")
        .to_string_lossy()
        .to_string()
}

fn run_gitkb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gitkb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gitkb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn import_all(config_path: &Path, extra: &[&str]) {
    let dir = files_dir(config_path);
    let mut args = vec!["import", dir.as_str()];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_gitkb(config_path, &args);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
}

fn search_json(config_path: &Path, args: &[&str]) -> Vec<serde_json::Value> {
    let mut full = vec!["search"];
    full.extend_from_slice(args);
    full.push("--json");
    let (stdout, stderr, success) = run_gitkb(config_path, &full);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap()
}

fn id_of(results: &[serde_json::Value], title: &str) -> String {
    results
        .iter()
        .find(|a| a["title"] == title)
        .unwrap_or_else(|| panic!("no asset titled {}", title))["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_import_directory() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);

    let (stdout, stderr, success) = run_gitkb(&config_path, &["import", &dir]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("4 files scanned, 4 imported, 0 skipped"));

    let all = search_json(&config_path, &[]);
    assert_eq!(all.len(), 4);
    let alpha = all.iter().find(|a| a["title"] == "alpha notes").unwrap();
    assert_eq!(
        alpha["summary"],
        "Migrated 420 hosts to OpenShift Virtualization with zero P1s."
    );
    assert_eq!(alpha["author"], "Test Runner");
    assert_eq!(alpha["owners"][0], "kb-tests@example.com");
    assert_eq!(alpha["confidentiality"], "internal-only");
    assert_eq!(alpha["commit_sha"].as_str().unwrap().len(), 7);
}

#[test]
fn test_import_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);

    let dir = files_dir(&config_path);
    let (stdout, _, success) = run_gitkb(&config_path, &["import", &dir]);
    assert!(success);
    assert!(stdout.contains("0 imported, 4 skipped"));
    assert_eq!(search_json(&config_path, &[]).len(), 4);
}

#[test]
fn test_import_dry_run_saves_nothing() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &["--dry-run"]);

    let (stdout, _, success) = run_gitkb(&config_path, &["search"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_text_filters_and_sort() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);

    let hits = search_json(&config_path, &["OPENSHIFT"]);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["title"], "alpha notes");

    let code = search_json(&config_path, &["--filter", "type=code_ref"]);
    assert_eq!(code.len(), 1);
    assert_eq!(code[0]["title"], "eks module");

    let decks = search_json(&config_path, &["--kind", "code"]);
    assert_eq!(decks.len(), 1);

    let az = search_json(&config_path, &["--sort", "az"]);
    let titles: Vec<&str> = az.iter().map(|a| a["title"].as_str().unwrap()).collect();
    assert_eq!(
        titles,
        vec!["alpha notes", "eks module", "gamma", "pricing sheet"]
    );

    let recent = search_json(&config_path, &["--date", "24h"]);
    assert_eq!(recent.len(), 4);
}

#[test]
fn test_search_briefcase() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);
    let all = search_json(&config_path, &[]);
    let gamma = id_of(&all, "gamma");

    let starred = search_json(&config_path, &["--starred", &gamma]);
    assert_eq!(starred.len(), 1);
    assert_eq!(starred[0]["id"], gamma.as_str());
}

#[test]
fn test_search_unknown_filter_errors() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_gitkb(&config_path, &["search", "--filter", "colour=red"]);
    assert!(!success);
    assert!(stderr.contains("unknown filter key"));
}

#[test]
fn test_get_asset() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);
    let id = id_of(&search_json(&config_path, &[]), "pricing sheet");

    let (stdout, stderr, success) = run_gitkb(&config_path, &["get", &id]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("pricing sheet"));
    assert!(stdout.contains("Q4 rate card"));
    assert!(stdout.contains("decks/pricing-sheet.md"));
}

#[test]
fn test_get_missing_asset() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_gitkb(&config_path, &["get", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("asset not found"));
}

#[test]
fn test_verify_and_stale() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);

    let (stdout, _, success) = run_gitkb(&config_path, &["stale"]);
    assert!(success);
    assert!(stdout.contains("4 asset(s) not verified in 90 days"));

    let id = id_of(&search_json(&config_path, &[]), "gamma");
    let (stdout, stderr, success) = run_gitkb(&config_path, &["verify", &id]);
    assert!(success, "verify failed: {}", stderr);
    assert!(stdout.contains("Verified gamma"));

    let (stdout, _, _) = run_gitkb(&config_path, &["stale"]);
    assert!(stdout.contains("3 asset(s)"));
    assert!(!stdout.contains(&id));

    // A verification a year back is stale again.
    run_gitkb(&config_path, &["verify", &id, "--date", "2001-01-01"]);
    let (stdout, _, _) = run_gitkb(&config_path, &["stale"]);
    assert!(stdout.contains("4 asset(s)"));
}

#[test]
fn test_stats_json() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);

    let (stdout, _, success) = run_gitkb(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_assets"], 4);
    assert_eq!(stats["by_type"]["code_ref"], 1);
    assert_eq!(stats["by_type"]["template"], 3);
    assert_eq!(stats["recent_contributions"], 4);
    assert_eq!(stats["distinct_authors"], 1);
}

#[test]
fn test_guide_buckets_by_stage() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &["--offering", "Cloud Platform"]);

    let (stdout, stderr, success) = run_gitkb(
        &config_path,
        &[
            "guide",
            "--deal-type",
            "new-logo",
            "--stage",
            "proposal",
            "--offering",
            "cloud",
            "--json",
        ],
    );
    assert!(success, "guide failed: {}", stderr);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let titles = |stage: &str| -> Vec<String> {
        result["buckets"][stage]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["title"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(titles("proposal"), vec!["pricing sheet"]);
    assert_eq!(titles("solutioning"), vec!["eks module"]);
    assert_eq!(titles("closing"), vec!["eks module"]);
    assert_eq!(titles("discovery").len(), 2);
    assert_eq!(result["stage"], "proposal");
}

#[test]
fn test_guide_requires_offering() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_gitkb(
        &config_path,
        &["guide", "--deal-type", "renewal", "--stage", "discovery"],
    );
    assert!(!success);
}

#[test]
fn test_facets() {
    let (_tmp, config_path) = setup_test_env();
    import_all(&config_path, &["--offering", "RHOV", "--tag", "field"]);

    let (stdout, _, success) = run_gitkb(&config_path, &["facets", "--json"]);
    assert!(success);
    let facets: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(facets["offering"][0]["value"], "RHOV");
    assert_eq!(facets["offering"][0]["count"], 4);
    assert_eq!(facets["tags"][0]["count"], 4);
}

#[test]
fn test_extract_without_config() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("sow-template_v2.md");
    fs::write(&file, "Statement of work for a two-week pilot.").unwrap();

    let missing = tmp.path().join("nope.toml");
    let (stdout, stderr, success) = run_gitkb(&missing, &["extract", file.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);
    let draft: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(draft["title"], "sow template v2");
    assert_eq!(draft["summary"], "Statement of work for a two-week pilot.");
    assert_eq!(draft["type"], "template");
    assert_eq!(draft["artifacts"][0]["kind"], "doc");
}

#[test]
fn test_schema_show() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_gitkb(&config_path, &["schema", "show", "--type", "win_story"]);
    assert!(success);
    assert!(stdout.contains("Win Story (win_story)"));
    assert!(stdout.contains("customer_anonymized"));
    assert!(!stdout.contains("Code Reference"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("gitkb.toml");
    fs::write(&config_path, "[store]\nkind = \"files\"\n").unwrap();
    let (_, stderr, success) = run_gitkb(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("store.root"));
}

#[test]
fn test_plays_link_and_list() {
    let (tmp, config_path) = setup_test_env();
    import_all(&config_path, &[]);
    let id = id_of(&search_json(&config_path, &[]), "pricing sheet");
    fs::write(
        tmp.path().join("kb/.gitkb/plays.json"),
        r#"[{"id": "play-1", "title": "Managed services", "offering": "Cloud"}]"#,
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_gitkb(&config_path, &["plays", "link", "play-1", &id, "--stage", "proposal"]);
    assert!(success, "plays link failed: {}", stderr);
    assert!(stdout.contains("[proposal] pricing sheet"));

    let (stdout, stderr, success) = run_gitkb(&config_path, &["plays", "list", "--json"]);
    assert!(success, "plays list failed: {}", stderr);
    let plays: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(plays[0]["links"][0]["asset_id"], id.as_str());
    assert_eq!(plays[0]["assets"][0]["phase"], "proposal");
    assert_eq!(plays[0]["assets"][0]["asset"]["title"], "pricing sheet");

    let (_, stderr, success) = run_gitkb(&config_path, &["plays", "link", "nope", &id]);
    assert!(!success);
    assert!(stderr.contains("play not found"));
}
