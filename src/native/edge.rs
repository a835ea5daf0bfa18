//! Edge callbacks for native pins.
//!
//! The pin driver already delivers debounced interrupts, so there is no polling here. One
//! interrupt covering both edges is installed per pin when its first callback is added. When it
//! fires, the pin is read again and the level read decides which callbacks run: high runs the
//! rising callbacks, low the falling ones. Under rapid toggling that level may differ from the one
//! that caused the interrupt; the callbacks receive whatever was read.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::interface::{EdgeMode, InterruptHandler, PinDriver};
use crate::io::{fire, Callback, Level};
use crate::mutex::lock;

#[derive(Default)]
struct PinCallbacks {
    rising: Vec<Callback>,
    falling: Vec<Callback>,
}

type CallbackMap = Mutex<HashMap<u8, PinCallbacks>>;

pub(crate) struct EdgeAdapter<P> {
    driver: Arc<P>,
    callbacks: Arc<CallbackMap>,
    // Held across a whole add or clear, so the map and the installed interrupts agree.
    install: Mutex<()>,
    debounce: Duration,
    // When simulating, callbacks are kept but no interrupt is installed.
    simulated: bool,
}

impl<P: PinDriver + 'static> EdgeAdapter<P> {
    pub(crate) fn new(driver: Arc<P>, debounce: Duration, simulated: bool) -> Self {
        Self {
            driver,
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            install: Mutex::new(()),
            debounce,
            simulated,
        }
    }

    pub(crate) fn add(
        &self,
        pin: u8,
        on_rising: Option<Callback>,
        on_falling: Option<Callback>,
    ) -> Result<()> {
        let _install = lock(&self.install);
        let first = {
            let mut callbacks = lock(&self.callbacks);
            let first = !callbacks.contains_key(&pin);
            let entry = callbacks.entry(pin).or_default();
            entry.rising.extend(on_rising);
            entry.falling.extend(on_falling);
            first
        };
        if !first {
            return Ok(());
        }
        if self.simulated {
            warn!(pin, "no hardware mode, no interrupt installed");
            return Ok(());
        }

        // The callback map is unlocked here, so the handler may run as soon as it is installed.
        let handler = shim(Arc::downgrade(&self.driver), Arc::downgrade(&self.callbacks), pin);
        if let Err(e) = self
            .driver
            .register_interrupt(pin, EdgeMode::Both, self.debounce, handler)
        {
            lock(&self.callbacks).remove(&pin);
            return Err(Error::hardware(e));
        }
        debug!(pin, debounce = ?self.debounce, "installed edge interrupt");
        Ok(())
    }

    pub(crate) fn clear(&self, pin: u8) -> Result<()> {
        let _install = lock(&self.install);
        let removed = lock(&self.callbacks).remove(&pin).is_some();
        if removed && !self.simulated {
            self.driver
                .deregister_interrupt(pin)
                .map_err(Error::hardware)?;
            debug!(pin, "removed edge interrupt");
        }
        Ok(())
    }

    pub(crate) fn watched(&self) -> Vec<u8> {
        lock(&self.callbacks).keys().copied().collect()
    }
}

fn shim<P: PinDriver + 'static>(
    driver: Weak<P>,
    callbacks: Weak<CallbackMap>,
    pin: u8,
) -> InterruptHandler {
    Box::new(move || {
        if let (Some(driver), Some(callbacks)) = (driver.upgrade(), callbacks.upgrade()) {
            dispatch(&*driver, &callbacks, pin);
        }
    })
}

fn dispatch<P: PinDriver>(driver: &P, callbacks: &CallbackMap, pin: u8) {
    let level = match driver.read_pin(pin) {
        Ok(level) => level,
        Err(e) => {
            warn!(pin, error = %e, "could not read pin after interrupt");
            return;
        }
    };
    let to_run = lock(callbacks)
        .get(&pin)
        .map(|c| match level {
            Level::High => c.rising.clone(),
            Level::Low => c.falling.clone(),
        })
        .unwrap_or_default();
    for callback in to_run {
        fire(&callback, pin, level);
    }
}
