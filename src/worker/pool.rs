//! Worker pool
//!
//! A fixed-size pool of OS threads draining the work queue. Each worker
//! owns a private store connection opened on thread start and closed on
//! exit; no state is shared between workers beyond the queue itself.
//!
//! ## Liveness
//! The admission path probes every worker before enqueueing and respawns
//! any thread that died (a hard store failure ends a worker deliberately).
//! If nothing can be respawned, admission fails and the caller drops the
//! connection.
//!
//! ## Shutdown
//! Cooperative: raise every worker's `finished` flag, wake the queue
//! waiters, and join. Workers drain to the next quiescent point — socket
//! timeouts bound how long a stuck client can delay them.

use std::net::TcpStream;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::db::Db;
use crate::error::{CineError, Result};

use super::queue::WorkQueue;
use super::request::handle_request;

/// One worker thread and the flag that stops it.
struct Worker {
    id: usize,
    finished: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// The pool of workers behind the accept loop.
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    workers: Vec<Worker>,
    next_worker_id: usize,
    database_path: PathBuf,
}

impl WorkerPool {
    /// Spawn the configured number of workers, each with its own store
    /// connection. Fails if any thread cannot be spawned.
    pub fn start(config: &Config) -> Result<Self> {
        let queue = Arc::new(WorkQueue::with_capacity(config.queue_capacity));
        let mut pool = WorkerPool {
            queue,
            workers: Vec::with_capacity(config.worker_count),
            next_worker_id: 0,
            database_path: config.database_path.clone(),
        };
        for _ in 0..config.worker_count {
            let id = pool.next_id();
            let worker = spawn_worker(&pool.queue, &pool.database_path, id)
                .map_err(|err| CineError::Network(format!("failed to spawn worker: {err}")))?;
            pool.workers.push(worker);
        }
        tracing::info!(workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    /// Hand an accepted client to a worker.
    ///
    /// Retries a full queue up to `retries` times with a pause hint in
    /// between. On rejection the socket is closed here and false is
    /// returned; a shutdown request also rejects.
    pub fn add_work(&mut self, stream: TcpStream, retries: u32, shutdown: &AtomicBool) -> bool {
        let fd = stream.into_raw_fd();

        let mut attempts = retries.max(1);
        while !shutdown.load(Ordering::Relaxed) && attempts > 0 {
            if !self.respawn_dead_workers() {
                break;
            }
            if self.queue.push(fd) {
                return true;
            }
            attempts -= 1;
            std::hint::spin_loop();
        }

        // not enqueued; reclaim the descriptor so it closes
        // SAFETY: `fd` came from `into_raw_fd` above and was not handed to
        // any worker.
        drop(unsafe { TcpStream::from_raw_fd(fd) });
        false
    }

    /// Probe every worker and replace dead ones. Returns false when no
    /// worker is alive and none could be respawned.
    fn respawn_dead_workers(&mut self) -> bool {
        let mut alive = 0;
        for slot in 0..self.workers.len() {
            if !self.workers[slot].handle.is_finished() {
                alive += 1;
                continue;
            }
            let id = self.next_id();
            match spawn_worker(&self.queue, &self.database_path, id) {
                Ok(worker) => {
                    let dead = std::mem::replace(&mut self.workers[slot], worker);
                    tracing::warn!(dead = dead.id, respawned = id, "replaced dead worker");
                    if dead.handle.join().is_err() {
                        tracing::error!(worker_id = dead.id, "worker thread panicked");
                    }
                    alive += 1;
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to respawn worker");
                }
            }
        }
        alive > 0
    }

    /// Stop every worker and drain the queue. Blocks until all threads
    /// joined.
    pub fn shutdown(mut self) {
        tracing::info!("stopping worker pool");
        for worker in &self.workers {
            worker.finished.store(true, Ordering::Relaxed);
        }
        self.queue.wake_all();
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                tracing::error!(worker_id = worker.id, "worker thread panicked");
            }
        }
        // close any sockets that were never claimed
        while let Some(fd) = self.queue.pop() {
            // SAFETY: every descriptor in the queue was transferred in by
            // `add_work` and is owned by the queue until popped.
            drop(unsafe { TcpStream::from_raw_fd(fd) });
        }
        tracing::info!("worker pool stopped");
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        id
    }
}

fn spawn_worker(
    queue: &Arc<WorkQueue>,
    database_path: &Path,
    id: usize,
) -> std::io::Result<Worker> {
    let finished = Arc::new(AtomicBool::new(false));
    let handle = thread::Builder::new()
        .name(format!("cinevault-worker-{id}"))
        .spawn({
            let queue = Arc::clone(queue);
            let finished = Arc::clone(&finished);
            let path = database_path.to_path_buf();
            move || worker_loop(id, &queue, &finished, &path)
        })?;
    Ok(Worker {
        id,
        finished,
        handle,
    })
}

fn worker_loop(id: usize, queue: &WorkQueue, finished: &AtomicBool, path: &Path) {
    tracing::debug!(worker_id = id, "worker started");
    let mut db = match Db::connect(path) {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(worker_id = id, error = %err, "store connection failed");
            finished.store(true, Ordering::Relaxed);
            return;
        }
    };

    while !finished.load(Ordering::Relaxed) {
        let Some(fd) = pop_or_wait(queue, finished) else {
            break;
        };
        // SAFETY: descriptors in the queue are owned by it; popping
        // transfers that ownership here, and dropping the stream closes it.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };
        let hard_fail = handle_request(id, &stream, &mut db);
        drop(stream);
        if hard_fail {
            tracing::error!(worker_id = id, "hard failure, worker exiting");
            break;
        }
    }

    finished.store(true, Ordering::Relaxed);
    if let Err(err) = db.close() {
        tracing::error!(worker_id = id, error = %err, "store disconnect failed");
    }
    tracing::debug!(worker_id = id, "worker stopped");
}

/// Pop-then-wait loop; returns `None` once `finished` is raised.
fn pop_or_wait(queue: &WorkQueue, finished: &AtomicBool) -> Option<super::queue::WorkItem> {
    while !finished.load(Ordering::Relaxed) {
        if let Some(item) = queue.pop() {
            return Some(item);
        }
        queue.wait_not_empty(finished);
    }
    None
}
