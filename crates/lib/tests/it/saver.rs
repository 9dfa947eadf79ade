use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use strata::backend::{self, Backend, BackendError, JsonBackend};
use strata::{resolver, saver, Config, Value};
use tempfile::TempDir;

use crate::helpers;

/// JSON backend that counts save calls.
struct CountingBackend {
    saves: Rc<Cell<usize>>,
}

impl Backend for CountingBackend {
    fn name(&self) -> &'static str {
        "cnt"
    }

    fn load(&self, path: &Path) -> Result<Value, BackendError> {
        JsonBackend.load(path)
    }

    fn save(&self, path: &Path, value: &Value) -> Result<(), BackendError> {
        self.saves.set(self.saves.get() + 1);
        JsonBackend.save(path, value)
    }
}

fn counting_setup() -> (helpers::TestEnv, Rc<Cell<usize>>) {
    let env = helpers::setup();
    let saves = Rc::new(Cell::new(0));
    backend::register(Rc::new(CountingBackend {
        saves: saves.clone(),
    }));
    (env, saves)
}

#[test]
fn test_mutations_coalesce_into_one_save() {
    let (_env, saves) = counting_setup();

    let cfg = Config::open("t.cnt");
    for i in 0..10 {
        cfg.set_value("k", i);
        cfg.sync();
    }

    assert!(saver::has_pending());
    assert_eq!(saver::dispatch_pending(), 1);
    assert_eq!(saves.get(), 1);
    assert_eq!(saver::dispatch_pending(), 0);
}

#[test]
fn test_no_op_write_stays_clean() {
    let (_env, saves) = counting_setup();

    let cfg = Config::open("t.cnt");
    cfg.set_value("k", 7);
    cfg.sync();
    saver::dispatch_pending();
    assert_eq!(saves.get(), 1);

    // Writing back the value already stored must not dirty the source.
    let existing = cfg.value("k", 0);
    cfg.set_value("k", existing);
    cfg.sync();
    assert!(!saver::has_pending());
    assert_eq!(saver::dispatch_pending(), 0);
    assert_eq!(saves.get(), 1);
}

#[test]
fn test_dirty_source_requeues_after_dispatch() {
    let (_env, saves) = counting_setup();

    let cfg = Config::open("t.cnt");
    cfg.set_value("k", 1);
    cfg.sync();
    saver::dispatch_pending();

    cfg.set_value("k", 2);
    cfg.sync();
    assert_eq!(saver::dispatch_pending(), 1);
    assert_eq!(saves.get(), 2);
}

#[test]
fn test_drop_of_original_cursor_schedules_save() {
    let (_env, saves) = counting_setup();

    {
        let cfg = Config::open("t.cnt");
        cfg.set_value("k", 1);
        // No explicit sync: dropping the original cursor schedules it.
    }
    assert!(saver::has_pending());
    saver::dispatch_pending();
    assert_eq!(saves.get(), 1);
}

#[test]
fn test_derived_cursor_drop_does_not_schedule() {
    let (_env, saves) = counting_setup();

    let cfg = Config::open("t.cnt");
    {
        let group = cfg.group("a");
        group.set_value("k", 1);
    }
    assert!(!saver::has_pending());
    assert_eq!(saves.get(), 0);

    cfg.sync();
    assert_eq!(saver::dispatch_pending(), 1);
    assert_eq!(saves.get(), 1);
}

#[test]
fn test_shutdown_flush() {
    let (env, saves) = counting_setup();

    let cfg = Config::open("t.cnt");
    cfg.set_value("k", "v");
    cfg.sync();

    saver::flush_all();
    assert_eq!(saves.get(), 1);
    assert!(env.user.path().join("t.cnt").exists());
}

#[test]
fn test_dirty_source_flushes_when_thread_ends() {
    let user = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();
    let user_path = user.path().to_path_buf();
    let system_path = system.path().to_path_buf();

    std::thread::spawn(move || {
        resolver::install(Rc::new(resolver::StaticDirs::new(
            &user_path,
            &system_path,
        )));
        backend::register(Rc::new(JsonBackend));

        let cfg = Config::open("t.json");
        cfg.set_value("k", "v");
        // Neither sync nor dispatch: the cached source drops with the
        // thread and performs the last-chance flush.
    })
    .join()
    .unwrap();

    let raw = fs::read_to_string(user.path().join("t.json")).unwrap();
    assert!(raw.contains("v"));
}
