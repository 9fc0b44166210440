use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

/// Detached work that must outlive the request that started it, such as
/// cache population. Drained before the process exits.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = match self.inner.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        // reap whatever already finished so the set does not grow unbounded
        while let Some(res) = set.try_join_next() {
            if let Err(e) = res {
                tracing::warn!(error = ?e, "background task failed");
            }
        }
        set.spawn(fut);
    }

    pub fn pending(&self) -> usize {
        match self.inner.lock() {
            Ok(set) => set.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Waits for every outstanding task, including ones spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut set = {
                let mut guard = match self.inner.lock() {
                    Ok(set) => set,
                    Err(poisoned) => poisoned.into_inner(),
                };
                std::mem::take(&mut *guard)
            };
            if set.is_empty() {
                return;
            }
            while let Some(res) = set.join_next().await {
                if let Err(e) = res {
                    tracing::warn!(error = ?e, "background task failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn drain_waits_for_spawned_work() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        tasks.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }
}
