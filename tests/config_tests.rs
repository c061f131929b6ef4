//! tests/config_tests.rs

mod common;

use std::fs;
use std::path::PathBuf;

use records_vault::config::{from_toml_str, load_from};
use records_vault::consts::{DEFAULT_APP_UID, DEFAULT_BATCH_SIZE, DEFAULT_KDF_ITERATIONS};
use records_vault::{Config, CoreError};
use tempfile::tempdir;

#[test]
fn partial_document_falls_back_to_defaults() {
    let conf = from_toml_str(
        r#"
        [migration]
        batch_size = 10
        "#,
    )
    .unwrap();

    assert_eq!(conf.migration.batch_size, 10);
    assert_eq!(conf.identity.app_uid, DEFAULT_APP_UID);
    assert_eq!(conf.kdf.iterations, DEFAULT_KDF_ITERATIONS);
    assert_eq!(conf.paths, Config::default().paths);
}

#[test]
fn full_document_is_read() {
    let conf = from_toml_str(
        r#"
        [identity]
        app_uid = "example.schoolpsych"
        username = "frau-beispiel"

        [paths]
        database = "/srv/records/records.db"
        salt = "/srv/records/salt.bin"

        [kdf]
        iterations = 700000
        legacy_iterations = 480000

        [migration]
        batch_size = 200
        "#,
    )
    .unwrap();

    let identity = conf.identity();
    assert_eq!(identity.app_uid, "example.schoolpsych");
    assert_eq!(identity.username, "frau-beispiel");
    assert_eq!(conf.paths.database, PathBuf::from("/srv/records/records.db"));
    assert_eq!(conf.kdf.iterations, 700_000);
    assert_eq!(conf.migration.batch_size, 200);
}

#[test]
fn nonsense_values_are_rejected() {
    assert!(matches!(
        from_toml_str("[migration]\nbatch_size = 0\n"),
        Err(CoreError::Configuration(_))
    ));
    assert!(matches!(
        from_toml_str("[kdf]\niterations = 0\n"),
        Err(CoreError::Configuration(_))
    ));
    assert!(matches!(
        from_toml_str("[identity\nbroken"),
        Err(CoreError::Config(_))
    ));
}

// Only test touching the process environment
#[test]
fn file_loading_and_env_overrides() {
    common::setup();
    let dir = tempdir().unwrap();

    let missing = load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(missing.migration.batch_size, DEFAULT_BATCH_SIZE);

    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[identity]\napp_uid = \"from-file\"\nusername = \"file-user\"\n",
    )
    .unwrap();
    assert_eq!(load_from(&path).unwrap().identity.app_uid, "from-file");

    std::env::set_var("RV_USERNAME", "env-user");
    std::env::set_var("RV_SALT_PATH", dir.path().join("env-salt.bin"));
    let conf = load_from(&path);
    std::env::remove_var("RV_USERNAME");
    std::env::remove_var("RV_SALT_PATH");

    let conf = conf.unwrap();
    assert_eq!(conf.identity.app_uid, "from-file");
    assert_eq!(conf.identity.username, "env-user");
    assert_eq!(conf.paths.salt, dir.path().join("env-salt.bin"));
}
