//! Non-blocking evaluation guard
//!
//! At most one evaluation per strategy runs at a time. A caller that finds
//! the guard held gets [`Outcome::Skipped`] straight away; overlapping
//! requests are dropped, never queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Result of a guarded run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Another evaluation held the guard
    Skipped,
    /// The evaluation ran to completion
    Evaluated(T),
}

impl<T> Outcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Try-lock guard around one strategy's evaluations.
///
/// Not part of any persisted state: every construction path, including
/// deserialization and cloning of the owning strategy, starts from
/// [`EvaluationGuard::default`].
#[derive(Debug, Default)]
pub struct EvaluationGuard {
    lock: Mutex<()>,
    in_flight: AtomicBool,
}

/// Held for the duration of one evaluation; clears the in-flight flag
/// before the lock is released.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    _lock: MutexGuard<'a, ()>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl EvaluationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an evaluation is currently in flight.
    ///
    /// Reads a flag only; polling this never contends with [`run`](Self::run).
    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `f` if no other evaluation is in flight.
    ///
    /// The guard is released when the returned future completes, is dropped,
    /// or unwinds from a panic.
    pub async fn run<F, Fut>(&self, f: F) -> Outcome<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let Ok(lock) = self.lock.try_lock() else {
            return Outcome::Skipped;
        };
        self.in_flight.store(true, Ordering::Release);
        let _held = InFlight {
            flag: &self.in_flight,
            _lock: lock,
        };
        Outcome::Evaluated(f().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn runs_when_free() {
        let guard = EvaluationGuard::new();
        let outcome = guard.run(|| async { 7 }).await;
        assert_eq!(outcome, Outcome::Evaluated(7));
        assert!(!guard.is_held());
    }

    #[tokio::test]
    async fn skips_while_held() {
        let guard = Arc::new(EvaluationGuard::new());
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let first = tokio::spawn({
            let guard = guard.clone();
            let entered = entered.clone();
            let release = release.clone();
            async move {
                guard
                    .run(|| async move {
                        entered.notify_one();
                        release.notified().await;
                        "first"
                    })
                    .await
            }
        });

        entered.notified().await;
        assert!(guard.is_held());

        let mut ran = false;
        let second = guard
            .run(|| {
                ran = true;
                async { "second" }
            })
            .await;
        assert!(second.is_skipped());
        assert!(!ran);

        release.notify_one();
        assert_eq!(first.await.unwrap(), Outcome::Evaluated("first"));
        assert!(!guard.is_held());
    }

    #[tokio::test]
    async fn released_after_panic() {
        let guard = Arc::new(EvaluationGuard::new());

        let task = tokio::spawn({
            let guard = guard.clone();
            async move {
                guard
                    .run(|| async {
                        let facts: Option<u8> = None;
                        facts.expect("evaluation blew up")
                    })
                    .await
            }
        });
        assert!(task.await.is_err());

        assert!(!guard.is_held());
        assert_eq!(guard.run(|| async { 1 }).await, Outcome::Evaluated(1));
    }

    #[tokio::test]
    async fn released_when_cancelled() {
        let guard = Arc::new(EvaluationGuard::new());
        let entered = Arc::new(Notify::new());

        let task = tokio::spawn({
            let guard = guard.clone();
            let entered = entered.clone();
            async move {
                guard
                    .run(|| async move {
                        entered.notify_one();
                        std::future::pending::<()>().await;
                    })
                    .await
            }
        });

        entered.notified().await;
        task.abort();
        let _ = task.await;

        assert!(!guard.is_held());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn polling_is_held_never_skips_a_run() {
        let guard = Arc::new(EvaluationGuard::new());
        let stop = Arc::new(AtomicBool::new(false));

        let observer = std::thread::spawn({
            let guard = guard.clone();
            let stop = stop.clone();
            move || {
                while !stop.load(Ordering::Relaxed) {
                    std::hint::black_box(guard.is_held());
                }
            }
        });

        let mut skipped = 0;
        for _ in 0..20_000 {
            if guard.run(|| async {}).await.is_skipped() {
                skipped += 1;
            }
        }

        stop.store(true, Ordering::Relaxed);
        observer.join().unwrap();
        assert_eq!(skipped, 0);
    }
}
