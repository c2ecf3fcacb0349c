//! Fixed-size worker pool that runs one parallel-for per frame.
//!
//! Threads are spawned once and parked between frames. A frame hands the
//! workers a job and a length; each worker claims indices from a shared
//! atomic counter until it runs past the end, then checks in. The caller
//! blocks until every worker has checked in, which is the only barrier
//! between "all items updated" and "caller may read them".

use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, trace};
use thiserror::Error;

/// Errors raised by misuse of the pool or by a failing job.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("work submitted to a worker pool that has been shut down")]
    ShutDown,

    #[error("a frame is already in flight on this worker pool")]
    FrameInFlight,

    #[error("{count} worker(s) panicked while running the frame")]
    WorkerPanicked { count: usize },
}

/// A frame job with its borrow lifetime erased. Only valid while the
/// dispatching call is blocked waiting for the frame to finish.
type Job = &'static (dyn Fn(usize) + Sync);

/// Everything the workers and the dispatcher agree on, guarded by one mutex.
struct FrameState {
    /// Bumped once per dispatched frame; workers compare against the last one they ran.
    generation: u64,
    job: Option<Job>,
    len: usize,
    workers: usize,
    checked_in: usize,
    panicked: usize,
    in_flight: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<FrameState>,
    frame_ready: Condvar,
    frame_done: Condvar,
    /// Index dispenser for the current frame.
    next_index: AtomicUsize,
}

impl Shared {
    // Only plain counters live under the lock, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, cv: &Condvar, guard: MutexGuard<'a, FrameState>) -> MutexGuard<'a, FrameState> {
        cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pool of OS threads reused across frames.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `worker_count` workers. Zero means one per available CPU.
    pub fn new(worker_count: usize) -> Result<Self, SchedulerError> {
        let worker_count = if worker_count == 0 {
            default_worker_count()
        } else {
            worker_count
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(FrameState {
                generation: 0,
                job: None,
                len: 0,
                workers: worker_count,
                checked_in: 0,
                panicked: 0,
                in_flight: false,
                shutdown: false,
            }),
            frame_ready: Condvar::new(),
            frame_done: Condvar::new(),
            next_index: AtomicUsize::new(0),
        });

        let mut pool = WorkerPool {
            shared,
            workers: Vec::with_capacity(worker_count),
            worker_count,
        };

        for id in 0..worker_count {
            let shared = Arc::clone(&pool.shared);
            // On failure `pool` drops here and joins the workers already spawned.
            let handle = thread::Builder::new()
                .name(format!("wallsim-worker-{id}"))
                .spawn(move || worker_loop(shared, id))?;
            pool.workers.push(handle);
        }

        debug!("Spawned worker pool with {} threads", worker_count);
        Ok(pool)
    }

    /// Number of worker threads, fixed at construction.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Run `job(i)` for every `i` in `0..len`, each index exactly once,
    /// and return only after all of them have completed.
    pub fn for_each_index<F>(&self, len: usize, job: F) -> Result<(), SchedulerError>
    where
        F: Fn(usize) + Sync,
    {
        self.dispatch(len, &job)
    }

    /// Apply `f` to every element of `items` in parallel, each element exactly once.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], f: F) -> Result<(), SchedulerError>
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        let slots = SharedSlice::new(items);
        self.dispatch(slots.len, &|i| {
            // SAFETY: `i < slots.len` and the pool hands each index to exactly
            // one worker per frame, so no two `&mut` to the same slot coexist.
            // The slice borrow outlives the frame because `dispatch` blocks.
            let item = unsafe { slots.get_mut(i) };
            f(item);
        })
    }

    fn dispatch(&self, len: usize, job: &(dyn Fn(usize) + Sync)) -> Result<(), SchedulerError> {
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(SchedulerError::ShutDown);
        }
        if state.in_flight {
            return Err(SchedulerError::FrameInFlight);
        }
        if len == 0 {
            return Ok(());
        }

        // SAFETY: the erased reference is only reachable through `state.job`.
        // We block below until every worker has checked in for this
        // generation and clear `job` before returning, so no worker can call
        // it after the borrow ends.
        let job: Job = unsafe { std::mem::transmute::<&(dyn Fn(usize) + Sync), Job>(job) };

        self.shared.next_index.store(0, Ordering::Relaxed);
        state.job = Some(job);
        state.len = len;
        state.checked_in = 0;
        state.panicked = 0;
        state.in_flight = true;
        state.generation = state.generation.wrapping_add(1);
        trace!("Dispatching frame {} over {} items", state.generation, len);
        self.shared.frame_ready.notify_all();

        while state.checked_in < state.workers {
            state = self.shared.wait(&self.shared.frame_done, state);
        }

        state.job = None;
        state.in_flight = false;
        let panicked = state.panicked;
        drop(state);

        if panicked > 0 {
            return Err(SchedulerError::WorkerPanicked { count: panicked });
        }
        Ok(())
    }

    /// Stop all workers and join them. Any frame already handed out is
    /// finished first. Further dispatches fail with [`SchedulerError::ShutDown`].
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.shutdown && self.workers.is_empty() {
                return;
            }
            state.shutdown = true;
        }
        self.shared.frame_ready.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread terminated abnormally during shutdown");
            }
        }
        debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn worker_loop(shared: Arc<Shared>, id: usize) {
    let mut seen = 0u64;
    loop {
        let (job, len) = {
            let mut state = shared.lock();
            while state.generation == seen && !state.shutdown {
                state = shared.wait(&shared.frame_ready, state);
            }
            if state.generation == seen {
                // Shutdown with no frame pending.
                break;
            }
            seen = state.generation;
            (state.job, state.len)
        };

        let outcome = match job {
            Some(job) => panic::catch_unwind(AssertUnwindSafe(|| {
                drain_indices(&shared.next_index, len, job)
            })),
            None => Ok(()),
        };

        let mut state = shared.lock();
        if outcome.is_err() {
            error!("Worker {} panicked during frame {}", id, seen);
            state.panicked += 1;
        }
        state.checked_in += 1;
        if state.checked_in == state.workers {
            shared.frame_done.notify_all();
        }
    }
    trace!("Worker {} exiting", id);
}

fn drain_indices(next_index: &AtomicUsize, len: usize, job: Job) {
    loop {
        let i = next_index.fetch_add(1, Ordering::Relaxed);
        if i >= len {
            break;
        }
        job(i);
    }
}

/// Raw view of a mutable slice that workers may index concurrently,
/// provided each index is touched by one worker at a time.
struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: sharing only hands out `&mut T` to disjoint indices (see `get_mut`),
// which is sound whenever `T` itself may be sent between threads.
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<'a, T> SharedSlice<'a, T> {
    fn new(items: &'a mut [T]) -> Self {
        Self {
            ptr: items.as_mut_ptr(),
            len: items.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `i` must be in bounds and no other reference to slot `i` may be live.
    #[allow(clippy::mut_from_ref)]
    unsafe fn get_mut(&self, i: usize) -> &mut T {
        debug_assert!(i < self.len);
        &mut *self.ptr.add(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::mpsc;

    #[test]
    fn every_item_updated_exactly_once_per_frame() {
        let pool = WorkerPool::new(4).unwrap();
        let mut counters = vec![0u32; 1000];

        for _ in 0..50 {
            pool.for_each_mut(&mut counters, |c| *c += 1).unwrap();
        }

        assert!(counters.iter().all(|&c| c == 50));
    }

    #[test]
    fn more_workers_than_items() {
        let pool = WorkerPool::new(8).unwrap();
        let hits: Vec<AtomicU32> = (0..3).map(|_| AtomicU32::new(0)).collect();

        pool.for_each_index(hits.len(), |i| {
            hits[i].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn empty_frame_returns_immediately() {
        let pool = WorkerPool::new(2).unwrap();
        let mut nothing: Vec<u8> = Vec::new();
        pool.for_each_mut(&mut nothing, |_| unreachable!()).unwrap();
    }

    #[test]
    fn zero_workers_means_available_parallelism() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.worker_count() >= 1);
    }

    #[test]
    fn dispatch_after_shutdown_fails_loudly() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());

        let mut items = vec![0u8; 4];
        let result = pool.for_each_mut(&mut items, |x| *x += 1);
        assert!(matches!(result, Err(SchedulerError::ShutDown)));
        // An empty frame is still misuse after shutdown.
        let result = pool.for_each_index(0, |_| {});
        assert!(matches!(result, Err(SchedulerError::ShutDown)));
        assert_eq!(items, vec![0u8; 4]);

        // Shutting down twice is harmless.
        pool.shutdown();
    }

    #[test]
    fn worker_panic_is_reported_and_pool_survives() {
        let pool = WorkerPool::new(3).unwrap();
        let result = pool.for_each_index(10, |i| {
            if i == 7 {
                panic!("boom");
            }
        });
        assert!(matches!(result, Err(SchedulerError::WorkerPanicked { count: 1 })));

        let mut counters = vec![0u32; 64];
        pool.for_each_mut(&mut counters, |c| *c += 1).unwrap();
        assert!(counters.iter().all(|&c| c == 1));
    }

    #[test]
    fn concurrent_dispatch_is_rejected() {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);

        let first = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                pool.for_each_index(1, |_| {
                    started_tx.lock().unwrap().send(()).unwrap();
                    release_rx.lock().unwrap().recv().unwrap();
                })
            })
        };

        started_rx.recv().unwrap();
        let second = pool.for_each_index(1, |_| {});
        assert!(matches!(second, Err(SchedulerError::FrameInFlight)));

        release_tx.send(()).unwrap();
        first.join().unwrap().unwrap();
    }
}
