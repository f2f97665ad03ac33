use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

const PASSWORD: &str = "correct-horse";

fn ddxrate() -> Command {
    let mut cmd = Command::cargo_bin("ddxrate").unwrap();
    // Host environment must not leak into the tests
    cmd.env_remove("DDXRATE_ADMIN_TOKEN")
        .env_remove("OPENROUTER_API_KEY")
        .env("DDXRATE_ADMIN_PASSWORD", PASSWORD);
    cmd
}

fn obtain_token() -> String {
    let assert = ddxrate()
        .arg("login")
        .arg("--password")
        .arg(PASSWORD)
        .assert()
        .success();
    String::from_utf8_lossy(&assert.get_output().stdout)
        .trim()
        .to_string()
}

#[test]
fn test_init_creates_db_and_config() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data/study.db");
    let config = dir.path().join("study.yaml");

    ddxrate()
        .arg("init")
        .arg("--db")
        .arg(&db)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(contains("initialized"));

    assert!(db.exists());
    assert!(config.exists());
    let body = fs::read_to_string(&config).unwrap();
    assert!(body.contains("default_model"));
}

#[test]
fn test_login_rejects_wrong_password() {
    ddxrate()
        .arg("login")
        .arg("--password")
        .arg("nope")
        .assert()
        .failure()
        .stderr(contains("wrong admin password"));
}

#[test]
fn test_vignette_add_requires_token() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("study.db");

    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("add")
        .arg("--category")
        .arg("common")
        .arg("--initials")
        .arg("A.S.")
        .arg("--content")
        .arg("Fever for three days.")
        .assert()
        .failure()
        .stderr(contains("admin authorization required"));
}

#[test]
fn test_vignette_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("study.db");
    let token = obtain_token();

    // 1. Add
    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("--token")
        .arg(&token)
        .arg("add")
        .arg("--category")
        .arg("common")
        .arg("--initials")
        .arg("A.S.")
        .arg("--content")
        .arg("Fever for three days with petechial rash.")
        .assert()
        .success()
        .stderr(contains("vignette added: id=1"));

    // 2. List shows it, with no generated diagnoses yet
    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("A.S."));

    // 3. Show prints the content
    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("show")
        .arg("--id")
        .arg("1")
        .assert()
        .success()
        .stdout(contains("petechial rash"))
        .stdout(contains("no diagnoses generated yet"));

    // 4. Update changes the category
    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("--token")
        .arg(&token)
        .arg("update")
        .arg("--id")
        .arg("1")
        .arg("--category")
        .arg("emergent")
        .arg("--initials")
        .arg("A.S.")
        .arg("--content")
        .arg("Fever with hypotension.")
        .assert()
        .success();

    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("emergent"));

    // 5. Delete removes it
    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("--token")
        .arg(&token)
        .arg("delete")
        .arg("--id")
        .arg("1")
        .assert()
        .success()
        .stderr(contains("vignette deleted"));

    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("no vignettes yet"));
}

#[test]
fn test_vignette_import_bulk() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("study.db");
    let seed = dir.path().join("vignettes.yaml");
    let token = obtain_token();

    fs::write(
        &seed,
        r#"
vignettes:
  - category: common
    patient_initials: "A.S."
    content: "Fever for three days."
  - category: rare
    patient_initials: "B.T."
    content: "Progressive muscle weakness over weeks."
"#,
    )
    .unwrap();

    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("--token")
        .arg(&token)
        .arg("import")
        .arg("--input")
        .arg(&seed)
        .assert()
        .success()
        .stderr(contains("imported 2 vignettes"));

    ddxrate()
        .arg("vignette")
        .arg("--db")
        .arg(&db)
        .arg("list")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(contains("\"evaluation_count\": 0"));
}

#[test]
fn test_progress_on_empty_study() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("study.db");

    ddxrate()
        .arg("progress")
        .arg("--rater-id")
        .arg("rater-1")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(contains("0/0 vignettes evaluated"));
}

#[test]
fn test_generate_fails_fast_without_api_key() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("study.db");
    let token = obtain_token();

    ddxrate()
        .arg("generate")
        .arg("--vignette-id")
        .arg("1")
        .arg("--db")
        .arg(&db)
        .arg("--token")
        .arg(&token)
        .assert()
        .failure()
        .stderr(contains("no OpenRouter API key"));
}
