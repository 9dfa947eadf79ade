use std::rc::Rc;

use strata::{backend, resolver};
use tempfile::TempDir;

/// Temporary user and system configuration roots for one test.
pub struct TestEnv {
    pub user: TempDir,
    pub system: TempDir,
}

/// Installs a resolver over two fresh temp directories and makes sure the
/// JSON backend is registered on this thread.
pub fn setup() -> TestEnv {
    let user = TempDir::new().expect("failed to create user config dir");
    let system = TempDir::new().expect("failed to create system config dir");

    resolver::install(Rc::new(resolver::StaticDirs::new(
        user.path(),
        system.path(),
    )));

    if backend::find("json").is_none() {
        backend::register(Rc::new(backend::JsonBackend));
    }

    TestEnv { user, system }
}
