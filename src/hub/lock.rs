//! Lock acquisition that survives poisoning.
//!
//! A panicking subscriber callback must not wedge every later hub operation,
//! so guards are recovered from poisoned locks with a warning instead of
//! propagating the panic flag.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                source,
                op,
                result = "poisoned_recovered",
                "recovered a poisoned hub lock; state may reflect a partial update"
            );
            poisoned.into_inner()
        }
    }
}
