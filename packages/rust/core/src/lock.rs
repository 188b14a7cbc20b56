//! Per-job-name serialization of compilations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per job name.
///
/// Holding a name's lock makes the "does the job exist, then create or
/// update it" sequence atomic with respect to other holders of the same
/// name in this process. Different names never block each other.
#[derive(Debug, Clone, Default)]
pub struct JobLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Run `f` while holding the lock for `name`.
    ///
    /// A panic in a previous holder does not poison the name.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn same_name_is_serialized() {
        let locks = JobLocks::new();
        let counter = Mutex::new(0usize);
        let in_flight = Mutex::new(0usize);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    locks.with_lock("demo", || {
                        {
                            let mut n = in_flight.lock().unwrap();
                            *n += 1;
                            assert_eq!(*n, 1, "two holders of the same name");
                        }
                        let value = *counter.lock().unwrap();
                        std::thread::sleep(Duration::from_millis(2));
                        *counter.lock().unwrap() = value + 1;
                        *in_flight.lock().unwrap() -= 1;
                    });
                });
            }
        });

        assert_eq!(*counter.lock().unwrap(), 8);
    }

    #[test]
    fn different_names_do_not_block() {
        let locks = JobLocks::new();
        let result = locks.with_lock("a", || locks.with_lock("b", || 42));
        assert_eq!(result, 42);
    }

    #[test]
    fn panicking_holder_does_not_poison() {
        let locks = JobLocks::new();
        let cloned = locks.clone();
        let _ = std::thread::spawn(move || {
            let _: () = cloned.with_lock("demo", || panic!("boom"));
        })
        .join();

        assert_eq!(locks.with_lock("demo", || 1), 1);
    }
}
