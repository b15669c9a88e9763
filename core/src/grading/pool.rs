use std::{future::Future, sync::Arc};

use tokio::{sync::Semaphore, task::JoinSet};

use super::control::{CancelToken, ProgressReporter};

/// Bounded worker slots shared by every fan-out of one run, together with the
/// run's cancellation token and progress sink.
#[derive(Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    cancel: Arc<dyn CancelToken>,
    progress: Arc<dyn ProgressReporter>,
}

#[derive(Debug)]
pub struct FanOut<T> {
    /// Results of units that finished before cancellation was observed.
    pub completed: Vec<T>,
    /// Units already running when cancellation was observed. They were allowed to
    /// finish, but their results are not part of the stage's result.
    pub abandoned: Vec<T>,
    pub dispatched: usize,
    pub cancelled: bool,
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            abandoned: Vec::new(),
            dispatched: 0,
            cancelled: false,
        }
    }
}

impl WorkerPool {
    pub fn new(
        jobs: usize,
        cancel: Arc<dyn CancelToken>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(jobs.max(1))),
            cancel,
            progress,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> &dyn ProgressReporter {
        self.progress.as_ref()
    }

    /// Runs `work` for every item, at most one unit per free slot.
    ///
    /// Progress is reported after each finished unit. Once cancellation is seen no
    /// further unit is started; running ones are awaited.
    pub async fn fan_out<I, T, F, Fut>(&self, label: &str, items: Vec<I>, mut work: F) -> FanOut<T>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = items.len();
        let mut pending = items.into_iter();
        let mut running = JoinSet::new();
        let mut out = FanOut::default();
        let mut done = 0;

        loop {
            out.cancelled |= self.cancel.is_cancelled();
            let can_dispatch = !out.cancelled && pending.len() > 0;

            tokio::select! {
                biased;

                Some(joined) = running.join_next(), if !running.is_empty() => {
                    done += 1;
                    match joined {
                        // The slot is held until the result is collected here, so that a
                        // finished unit is always counted before its slot is reused.
                        Ok((res, _permit)) if out.cancelled => out.abandoned.push(res),
                        Ok((res, _permit)) => out.completed.push(res),
                        Err(e) => log::error!("{}: worker task failed: {}", label, e),
                    }
                    self.progress.report(done, total, label);
                }

                permit = self.slots.clone().acquire_owned(), if can_dispatch => {
                    let Ok(permit) = permit else {
                        log::error!("{}: worker slots closed", label);
                        out.cancelled = true;
                        continue;
                    };
                    let Some(item) = pending.next() else {
                        continue;
                    };
                    let unit = work(item);
                    running.spawn(async move { (unit.await, permit) });
                    out.dispatched += 1;
                }

                else => break,
            }
        }

        if out.cancelled && pending.len() > 0 {
            log::warn!(
                "{}: cancelled, {} of {} units never started",
                label,
                pending.len(),
                total
            );
        }
        out
    }
}
