use opsync::auth::{EnvFileStore, SecretStore, StoreError};
use std::io::Write;

#[test]
fn test_write_preserves_other_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# credentials").unwrap();
    writeln!(file, "export YEMEKSEPETI_USERNAME=user").unwrap();
    writeln!(file, "REFRESH_TOKEN=\"old\"").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "REGIONS=IST,ANK").unwrap();

    let store = EnvFileStore::open(file.path()).unwrap();
    assert_eq!(store.read("YEMEKSEPETI_USERNAME").as_deref(), Some("user"));
    assert_eq!(store.read("REFRESH_TOKEN").as_deref(), Some("old"));

    store.write("REFRESH_TOKEN", "abc$def ghi").unwrap();
    store.write("DATABASE_URL", "sqlite://data/opsync.db").unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# credentials");
    assert_eq!(lines[1], "export YEMEKSEPETI_USERNAME=user");
    assert_eq!(lines[2], "REFRESH_TOKEN='abc$def ghi'");
    assert_eq!(lines[4], "REGIONS=IST,ANK");
    assert_eq!(lines[5], "DATABASE_URL=sqlite://data/opsync.db");

    let reopened = EnvFileStore::open(file.path()).unwrap();
    assert_eq!(reopened.read("REFRESH_TOKEN").as_deref(), Some("abc$def ghi"));
    assert_eq!(reopened.read("DATABASE_URL").as_deref(), Some("sqlite://data/opsync.db"));
}

#[test]
fn test_write_replaces_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(&path, "CLIENT_ID=client\nREFRESH_TOKEN=r1\n").unwrap();
    let store = EnvFileStore::open(&path).unwrap();

    store.write("REFRESH_TOKEN", "r2").unwrap();
    store.write("REFRESH_TOKEN", "r3").unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(entries, vec![std::ffi::OsString::from(".env")]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "CLIENT_ID=client\nREFRESH_TOKEN=r3\n");
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EnvFileStore::open(dir.path().join("absent.env")).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}

#[test]
fn test_require_names_missing_key() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let store = EnvFileStore::open(file.path()).unwrap();
    let err = store.require("CLIENT_ID").unwrap_err();
    assert_eq!(err.to_string(), opsync::auth::AuthError::MissingSecret("CLIENT_ID".into()).to_string());
}
