//! Mutual exclusion between application threads, listener threads and interrupt handlers.
//!
//! Edge callbacks run isolated, so a panic inside one never happens while a lock is held. A
//! poisoned mutex can then only come from a panicking collaborator; the guarded state stays
//! consistent in that case, so the poison is ignored.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `m`, recovering the guard if the mutex is poisoned.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access to the value of a mutex that is no longer shared.
pub(crate) fn get_mut<T: ?Sized>(m: &mut Mutex<T>) -> &mut T {
    m.get_mut().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_survives_poison() {
        let m = Arc::new(Mutex::new(5));
        let poisoner = m.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        *lock(&m) += 1;
        assert_eq!(*lock(&m), 6);
    }
}
