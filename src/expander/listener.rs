//! Edge detection by polling.
//!
//! The MCP23017 interrupt outputs are not wired anywhere we can observe, so edges are synthesized
//! by a background thread that samples every watched port once per tick. A port sitting at its
//! last confirmed level `v` is stable. When a sample reads `v' != v` the port becomes a candidate:
//! the thread waits out the debounce window and samples again. If the port still reads `v'` the
//! edge is confirmed, the callbacks for its direction fire and `v'` becomes the confirmed level.
//! If it went back to `v` the change was a glitch and nothing fires.
//!
//! All candidates found in one tick share a single debounce wait.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::io::{fire, Callback, Level};
use crate::mutex::lock;

/// Something the listener can read port levels from.
pub(crate) trait Sample: Send + Sync + 'static {
    fn sample(&self, port: u8) -> Result<Level>;
}

/// Confirmed level and callbacks of one watched port.
struct PortListener {
    last: Level,
    rising: Vec<Callback>,
    falling: Vec<Callback>,
}

/// Watched ports, shared between the registering thread and the listener thread.
#[derive(Default)]
pub(crate) struct Registry {
    ports: BTreeMap<u8, PortListener>,
}

impl Registry {
    /// Append callbacks for `port`. If the port was not watched yet, `level` becomes its confirmed
    /// level.
    pub(crate) fn add(
        &mut self,
        port: u8,
        level: Level,
        on_rising: Option<Callback>,
        on_falling: Option<Callback>,
    ) {
        let listener = self.ports.entry(port).or_insert_with(|| PortListener {
            last: level,
            rising: Vec::new(),
            falling: Vec::new(),
        });
        listener.rising.extend(on_rising);
        listener.falling.extend(on_falling);
    }

    /// Stop watching `port`. Returns whether it was watched.
    pub(crate) fn clear(&mut self, port: u8) -> bool {
        self.ports.remove(&port).is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, port: u8) -> bool {
        self.ports.contains_key(&port)
    }

    fn snapshot(&self) -> Vec<(u8, Level)> {
        self.ports
            .iter()
            .map(|(&port, listener)| (port, listener.last))
            .collect()
    }

    /// Record a confirmed edge from `from` to `to` and hand back the callbacks to run for it.
    /// Returns `None` if the port stopped being watched, or was re-registered with a different
    /// confirmed level, while the edge was being debounced.
    fn confirm(&mut self, port: u8, from: Level, to: Level) -> Option<Vec<Callback>> {
        let listener = self.ports.get_mut(&port)?;
        if listener.last != from {
            return None;
        }
        listener.last = to;
        Some(match to {
            Level::High => listener.rising.clone(),
            Level::Low => listener.falling.clone(),
        })
    }
}

/// Sample every watched port once and resolve any changes. Returns the number of callbacks
/// invoked.
pub(crate) fn poll<S: Sample + ?Sized>(
    sampler: &S,
    registry: &Mutex<Registry>,
    debounce: Duration,
    cancel: &AtomicBool,
) -> usize {
    let watched = lock(registry).snapshot();
    let candidates: Vec<(u8, Level, Level)> = watched
        .into_iter()
        .filter_map(|(port, last)| match sampler.sample(port) {
            Ok(now) if now != last => Some((port, last, now)),
            Ok(_) => None,
            Err(e) => {
                warn!(port, error = %e, "could not sample port");
                None
            }
        })
        .collect();
    if candidates.is_empty() {
        return 0;
    }

    trace!(count = candidates.len(), "debouncing level changes");
    thread::sleep(debounce);
    if cancel.load(Ordering::Acquire) {
        return 0;
    }

    let mut fired = 0;
    for (port, from, to) in candidates {
        match sampler.sample(port) {
            Ok(now) if now == to => {
                let callbacks = lock(registry).confirm(port, from, to);
                for callback in callbacks.unwrap_or_default() {
                    fire(&callback, port, to);
                    fired += 1;
                }
            }
            Ok(_) => debug!(port, "level change did not persist, ignoring"),
            Err(e) => warn!(port, error = %e, "could not confirm level change"),
        }
    }
    fired
}

/// Timing of one listener thread.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timing {
    pub(crate) debounce: Duration,
    pub(crate) poll_interval: Duration,
}

/// A running listener thread. Dropping it asks the thread to stop without waiting for it.
pub(crate) struct Listener {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Start a thread named `name` that polls the ports in `registry` through `sampler`.
    pub(crate) fn spawn<S: Sample>(
        name: String,
        sampler: Arc<S>,
        registry: Arc<Mutex<Registry>>,
        timing: Timing,
    ) -> Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = thread::Builder::new().name(name).spawn(move || {
            debug!("listener running");
            while !flag.load(Ordering::Acquire) {
                poll(&*sampler, &registry, timing.debounce, &flag);
                thread::sleep(timing.poll_interval);
            }
            debug!("listener exiting");
        })?;
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop at its next tick, without waiting for it.
    pub(crate) fn stop(self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Ask the thread to stop and wait until it has. Does not wait when called from the listener
    /// thread itself.
    pub(crate) fn shutdown(mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("listener thread panicked");
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}
