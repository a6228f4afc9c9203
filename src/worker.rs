// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for worker loops
//!
//! Both the capture worker (conversion and transform) and the render thread
//! run on a [`WorkerLoop`]: a named thread that calls a closure repeatedly
//! until the closure asks to stop or the owner calls [`WorkerLoop::stop`].
//!
//! Stopping never interrupts an iteration that is already running; it only
//! prevents the next one from starting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a loop running in a dedicated thread
///
/// # Example
///
/// ```ignore
/// let worker = WorkerLoop::start("frame-worker", move || {
///     match notifications.recv_timeout(WORKER_POLL_INTERVAL) {
///         Ok(()) => {
///             process_latest();
///             LoopAction::Continue
///         }
///         Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
///         Err(RecvTimeoutError::Disconnected) => LoopAction::Stop,
///     }
/// });
///
/// // Later, stop the loop
/// worker.stop();
/// ```
pub struct WorkerLoop {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl WorkerLoop {
    /// Start a new loop in a separate thread
    ///
    /// The closure is called repeatedly until it returns `LoopAction::Stop`
    /// or the controller's `stop()` method is called. It should block for a
    /// bounded time per iteration so the stop signal is observed promptly.
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting worker loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Worker thread started");
                run_loop(&name_clone, &stop_signal_clone, &mut loop_fn);
                info!(name = %name_clone, "Worker thread exiting");
            });

        Self::from_spawn(name, thread_handle, stop_signal)
    }

    /// Start a loop whose state is built on the worker thread itself
    ///
    /// `init_fn` runs first on the new thread, and this call blocks until it
    /// has finished. State that must live on one thread (a GPU context, for
    /// instance) is therefore created and used on the same thread.
    ///
    /// # Returns
    /// * `Ok(controller)` - Initialization succeeded and the loop is running
    /// * `Err(e)` - Initialization failed; the thread has already exited
    pub fn start_with_init<S, E, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Result<Self, E>
    where
        S: 'static,
        E: std::fmt::Display + Send + 'static,
        I: FnOnce() -> Result<S, E> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<(), E>>(1);

        info!(name = %name, "Starting worker loop with initialization");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Worker thread started, initializing...");

                let mut state = match init_fn() {
                    Ok(s) => {
                        debug!(name = %name_clone, "Initialization successful");
                        let _ = init_tx.send(Ok(()));
                        s
                    }
                    Err(e) => {
                        warn!(name = %name_clone, error = %e, "Initialization failed");
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                run_loop(&name_clone, &stop_signal_clone, &mut || loop_fn(&mut state));
                info!(name = %name_clone, "Worker thread exiting");
            });

        let mut controller = Self::from_spawn(name, thread_handle, stop_signal);

        match init_rx.recv() {
            Ok(Ok(())) => Ok(controller),
            Ok(Err(e)) => {
                controller.join();
                Err(e)
            }
            Err(_) => {
                // Sender dropped without a value: spawn failed or init panicked
                controller.join();
                warn!(name = %name, "Worker thread ended before reporting initialization");
                Ok(controller)
            }
        }
    }

    fn from_spawn(
        name: &str,
        spawned: std::io::Result<JoinHandle<()>>,
        stop_signal: Arc<AtomicBool>,
    ) -> Self {
        let thread_handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn worker thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting worker loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// An iteration already in progress runs to completion first.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the loop; the stop flag is enough
                return;
            }
            debug!(name = %self.name, "Waiting for worker thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Worker thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Worker thread finished");
            }
        }
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "WorkerLoop dropped, stopping loop");
            self.stop();
        }
    }
}

fn run_loop(name: &str, stop_signal: &AtomicBool, loop_fn: &mut dyn FnMut() -> LoopAction) {
    loop {
        if stop_signal.load(Ordering::SeqCst) {
            debug!(name = %name, "Stop signal received");
            break;
        }

        match loop_fn() {
            LoopAction::Continue => {}
            LoopAction::Stop => {
                debug!(name = %name, "Loop requested stop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_basic_loop() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerLoop::start("test-loop", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            if count >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        worker.join();

        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerLoop::start("test-loop", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            LoopAction::Continue
        });

        thread::sleep(Duration::from_millis(50));

        worker.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_stop_waits_for_iteration_in_flight() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);
        let (started_tx, started_rx) = mpsc::channel();

        let mut worker = WorkerLoop::start("test-in-flight", move || {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(50));
            finished_clone.store(true, Ordering::SeqCst);
            LoopAction::Continue
        });

        started_rx.recv().unwrap();
        worker.stop();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_with_init() {
        let result = Arc::new(AtomicU32::new(0));
        let result_clone = Arc::clone(&result);

        let mut worker = WorkerLoop::start_with_init(
            "test-init-loop",
            || Ok::<_, String>(42u32),
            move |state| {
                result_clone.store(*state, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_init_failure_is_returned() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let result = WorkerLoop::start_with_init(
            "test-fail-init",
            || Err::<(), _>("Init failed".to_string()),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        );

        assert_eq!(result.err().as_deref(), Some("Init failed"));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_is_running() {
        let worker = WorkerLoop::start("test-running", || {
            thread::sleep(Duration::from_millis(100));
            LoopAction::Continue
        });

        assert!(worker.is_running());

        // Drop will stop it
        drop(worker);
    }
}
