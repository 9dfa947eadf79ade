use std::fs;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use strata::{Source, Value};

use crate::helpers;

#[test]
fn test_missing_without_create() {
    let _env = helpers::setup();
    assert!(Source::open("absent.json", false, false, None).is_none());
}

#[test]
fn test_create_builds_writable_map_root() {
    let env = helpers::setup();

    let source = Source::open("fresh.json", false, true, None).unwrap();
    let data = source.data();
    assert!(data.is_map());
    assert!(!data.is_read_only());

    // Nothing touches the disk until the first save.
    assert!(!env.user.path().join("fresh.json").exists());
}

#[test]
fn test_extension_inference_appends_default_tag() {
    let _env = helpers::setup();

    let source = Source::open("profile", false, true, None).unwrap();
    assert!(source
        .file_name()
        .to_string_lossy()
        .ends_with("profile.json"));
}

#[test]
fn test_empty_path_means_profile() {
    let _env = helpers::setup();

    let source = Source::open("", false, true, None).unwrap();
    assert!(source
        .file_name()
        .to_string_lossy()
        .ends_with("profile.json"));
}

#[test]
fn test_absolute_system_path_rejected() {
    let env = helpers::setup();
    let abs = env.system.path().join("s.json");
    fs::write(&abs, r#"{"k": 1}"#).unwrap();

    assert!(Source::open(&abs, true, true, None).is_none());
    // The same path opens fine through the user-path code path.
    assert!(Source::open(&abs, false, false, None).is_some());
}

#[test]
fn test_no_backends_registered() {
    // Deliberately not using helpers::setup: this thread has an empty
    // registry and no resolver would even be consulted for absolute paths.
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("t.json");
    fs::write(&path, "{}").unwrap();

    assert!(Source::open(&path, false, true, None).is_none());
}

#[test]
fn test_scalar_root_rejected_unless_created() {
    let env = helpers::setup();
    fs::write(env.user.path().join("t.json"), "42").unwrap();

    assert!(Source::open("t.json", false, false, None).is_none());

    let created = Source::open("t.json", false, true, None).unwrap();
    assert!(created.data().is_map());
}

#[test]
fn test_malformed_document_rejected_unless_created() {
    let env = helpers::setup();
    fs::write(env.user.path().join("t.json"), "{not json").unwrap();

    assert!(Source::open("t.json", false, false, None).is_none());

    let created = Source::open("t.json", false, true, None).unwrap();
    assert!(created.data().is_map());
}

#[test]
fn test_system_source_is_read_only() {
    let env = helpers::setup();
    fs::write(env.system.path().join("t.json"), r#"{"k": 1}"#).unwrap();

    let source = Source::open("t.json", true, false, None).unwrap();
    assert!(source.data().is_read_only());
}

#[test]
fn test_unwritable_file_is_read_only() {
    let env = helpers::setup();
    let path = env.user.path().join("t.json");
    fs::write(&path, r#"{"k": 1}"#).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&path, perms).unwrap();

    let source = Source::open("t.json", false, false, None).unwrap();
    assert!(source.data().is_read_only());
}

#[test]
fn test_cache_returns_same_source_while_fresh() {
    let _env = helpers::setup();

    let a = Source::open("t.json", false, true, None).unwrap();
    let b = Source::open("t.json", false, false, None).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn test_modified_file_reloads() {
    let env = helpers::setup();
    let path = env.user.path().join("t.json");
    fs::write(&path, r#"{"k": 1}"#).unwrap();

    let a = Source::open("t.json", false, false, None).unwrap();
    assert!(a.data().to_value().as_map().unwrap()["k"] == Value::from(1));

    fs::write(&path, r#"{"k": 2}"#).unwrap();
    // Push the stamp well past the cached one; two writes within the
    // filesystem's mtime granularity would otherwise look identical.
    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();

    let b = Source::open("t.json", false, false, None).unwrap();
    assert!(!Rc::ptr_eq(&a, &b));
    assert!(b.data().to_value().as_map().unwrap()["k"] == Value::from(2));
}

#[test]
fn test_sync_refreshes_validity() {
    let env = helpers::setup();

    let source = Source::open("t.json", false, true, None).unwrap();
    source.make_dirty();
    source.sync().unwrap();

    assert!(env.user.path().join("t.json").exists());
    assert!(!source.is_dirty());
    assert!(source.is_valid());
}
