// Application layer - Collaborator seams and the stateful coordinators
pub mod auto_height;
pub mod debounce;
pub mod edit_mode;
pub mod ports;
pub mod query_runner;
pub mod remote;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked. No
/// lock in this crate is held across an `.await`.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
