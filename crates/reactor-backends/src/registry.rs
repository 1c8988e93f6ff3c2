//! Process-wide name→backend-factory registry.
//!
//! A lazily-initialized global populated once by an explicit, idempotent
//! installer — no window exists where a reactor can observe a partially
//! populated table.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use reactor_core::{ReactorError, Result};

use crate::backend::{Backend, BackendFactory};
use crate::{poll, select};

#[cfg(target_os = "linux")]
use crate::epoll;

fn table() -> &'static Mutex<HashMap<&'static str, BackendFactory>> {
    static TABLE: OnceLock<Mutex<HashMap<&'static str, BackendFactory>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a backend factory under `name`. Rejects a duplicate name with
/// [`ReactorError::AlreadyExists`].
pub fn register(name: &'static str, factory: BackendFactory) -> Result<()> {
    let mut table = table().lock().expect("backend registry poisoned");
    if table.contains_key(name) {
        return Err(ReactorError::AlreadyExists);
    }
    table.insert(name, factory);
    Ok(())
}

/// Remove a backend by name. A no-op (not an error) if `name` is not
/// present — the registry never needs to distinguish "never installed" from
/// "already removed" for its callers.
pub fn unregister(name: &str) {
    table().lock().expect("backend registry poisoned").remove(name);
}

/// Instantiate the backend installed under `name`.
pub fn create(name: &str) -> Result<Box<dyn Backend>> {
    let factory = {
        let table = table().lock().expect("backend registry poisoned");
        *table.get(name).ok_or(ReactorError::NoSuchBackend)?
    };
    factory()
}

/// Install `select`, `poll`, and (on Linux) `epoll` under their canonical
/// names. Idempotent: safe to call from every `Reactor::create`, only the
/// first call does any work. Downstream users may still call
/// [`register`] directly to add further names to the same table.
pub fn install_builtin_backends() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let _ = register("select", select::create);
        let _ = register("poll", poll::create);
        #[cfg(target_os = "linux")]
        {
            let _ = register("epoll", epoll::create);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_backends_are_installed_exactly_once() {
        install_builtin_backends();
        install_builtin_backends();
        assert!(create("select").is_ok());
        assert!(create("poll").is_ok());
    }

    #[test]
    fn unknown_backend_name_is_reported() {
        install_builtin_backends();
        assert!(matches!(create("does-not-exist"), Err(ReactorError::NoSuchBackend)));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        fn dummy() -> Result<Box<dyn Backend>> {
            select::create()
        }
        let _ = register("dup-test-backend", dummy);
        assert!(matches!(register("dup-test-backend", dummy), Err(ReactorError::AlreadyExists)));
        unregister("dup-test-backend");
    }
}
