//! The native GPIO header interface.
//!
//! Ports are header pins in board numbering, 1 to 40. Pins wired to ground, the power rails or the
//! I2C bus are reserved: they are rejected by every operation, whether or not anything ever tried
//! to configure them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, ReservedPin, Result};
use crate::interface::{PinDriver, PullMode};
use crate::io::{Callback, Direction, Directions, InOutInterface, Level};
use crate::mutex::lock;

use self::edge::EdgeAdapter;

mod edge;

/// Number of pins on the header.
pub const HEADER_PINS: u8 = 40;

const GROUND: [u8; 8] = [6, 9, 14, 20, 25, 30, 34, 39];
const POWER_3V3: [u8; 2] = [1, 17];
const POWER_5V: [u8; 2] = [2, 4];
const I2C: [u8; 4] = [3, 5, 27, 28];

/// What `pin` is reserved for, if anything.
pub fn reservation(pin: u8) -> Option<ReservedPin> {
    if GROUND.contains(&pin) {
        Some(ReservedPin::Ground)
    } else if POWER_3V3.contains(&pin) {
        Some(ReservedPin::Power3V3)
    } else if POWER_5V.contains(&pin) {
        Some(ReservedPin::Power5V)
    } else if I2C.contains(&pin) {
        Some(ReservedPin::I2c)
    } else {
        None
    }
}

/// The GPIO header of the board, driven through a [`PinDriver`].
///
/// ```
/// # use portio::{Config, InOutInterface, NativeInterface, PullMode};
/// # fn main() -> portio::Result<()> {
/// # let driver = portio::interface::noop::NoopPins;
/// let gpio = NativeInterface::new(driver, Config::default())?;
/// gpio.set_pull(11, PullMode::Up)?;
/// gpio.port(11)?
///     .set_as_input()?
///     .on_falling(|pin, _| println!("pin {} pulled low", pin))?;
/// assert!(gpio.port(6).is_err()); // ground
/// # Ok(())
/// # }
/// ```
pub struct NativeInterface<P: PinDriver + 'static> {
    driver: Arc<P>,
    config: Config,
    directions: Mutex<Directions>,
    pulls: Mutex<HashMap<u8, PullMode>>,
    // Orders direction changes against edge registration, so an output never keeps callbacks.
    registration: Mutex<()>,
    edges: EdgeAdapter<P>,
}

impl<P: PinDriver + 'static> NativeInterface<P> {
    /// Take over the header through `driver`. Every usable pin is initialized as an output driven
    /// low before this returns.
    pub fn new(driver: P, config: Config) -> Result<Self> {
        let driver = Arc::new(driver);
        let edges = EdgeAdapter::new(
            driver.clone(),
            config.debounce_duration(),
            config.simulation_mode().is_enabled(),
        );
        let gpio = Self {
            driver,
            config,
            directions: Mutex::new(Directions::new(HEADER_PINS)),
            pulls: Mutex::new(HashMap::new()),
            registration: Mutex::new(()),
            edges,
        };
        gpio.initialize()?;
        Ok(gpio)
    }

    /// Select the resistor applied to `port` the next time it is configured as an input.
    pub fn set_pull(&self, port: u8, pull: PullMode) -> Result<()> {
        self.validate(port)?;
        lock(&self.pulls).insert(port, pull);
        Ok(())
    }

    /// The resistor `port` gets when configured as an input.
    pub fn pull(&self, port: u8) -> Result<PullMode> {
        self.validate(port)?;
        Ok(lock(&self.pulls).get(&port).copied().unwrap_or_default())
    }

    fn simulating(&self) -> bool {
        self.config.simulation_mode().is_enabled()
    }

    fn setup(&self, port: u8, direction: Direction, pull: Option<PullMode>) -> Result<()> {
        if self.simulating() {
            warn!(port, "no hardware mode, no setup done");
            return Ok(());
        }
        self.driver
            .configure_pin(port, direction, pull)
            .map_err(Error::hardware)
    }
}

impl<P: PinDriver + 'static> InOutInterface for NativeInterface<P> {
    fn port_count(&self) -> u8 {
        HEADER_PINS
    }

    fn validate(&self, port: u8) -> Result<()> {
        lock(&self.directions).check_bounds(port)?;
        match reservation(port) {
            Some(pin) => Err(Error::Reserved { port, pin }),
            None => Ok(()),
        }
    }

    fn direction(&self, port: u8) -> Result<Option<Direction>> {
        self.validate(port)?;
        Ok(lock(&self.directions).get(port))
    }

    fn set_as_output(&self, port: u8) -> Result<()> {
        self.validate(port)?;
        self.setup(port, Direction::Output, None)?;
        let _registration = lock(&self.registration);
        lock(&self.directions).set(port, Direction::Output);
        self.edges.clear(port)
    }

    fn set_as_input(&self, port: u8) -> Result<()> {
        let pull = self.pull(port)?;
        self.setup(port, Direction::Input, Some(pull))?;
        lock(&self.directions).set(port, Direction::Input);
        Ok(())
    }

    fn read(&self, port: u8) -> Result<Level> {
        self.validate(port)?;
        if let Some(level) = self.config.simulation_mode().level(port) {
            warn!(port, "no hardware mode, no read done");
            return Ok(level);
        }
        self.driver.read_pin(port).map_err(Error::hardware)
    }

    fn write(&self, port: u8, level: Level) -> Result<()> {
        self.validate(port)?;
        let directions = lock(&self.directions);
        directions.check_writable(port)?;
        if self.simulating() {
            warn!(port, "no hardware mode, no value written");
            return Ok(());
        }
        self.driver.write_pin(port, level).map_err(Error::hardware)
    }

    fn add_event(
        &self,
        port: u8,
        on_rising: Option<Callback>,
        on_falling: Option<Callback>,
    ) -> Result<()> {
        let _registration = lock(&self.registration);
        self.validate(port)?;
        lock(&self.directions).check_listenable(port)?;
        if on_rising.is_none() && on_falling.is_none() {
            return Err(Error::NoCallback { port });
        }
        let (rising, falling) = (on_rising.is_some(), on_falling.is_some());
        self.edges.add(port, on_rising, on_falling)?;
        debug!(interface = %self, port, rising, falling, "added value change listener");
        Ok(())
    }

    fn clear_events(&self, port: u8) -> Result<()> {
        let _registration = lock(&self.registration);
        self.validate(port)?;
        self.edges.clear(port)
    }
}

impl<P: PinDriver + 'static> fmt::Display for NativeInterface<P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Raspberry Pi GPIO")
    }
}

impl<P: PinDriver + 'static> Drop for NativeInterface<P> {
    /// Removes installed interrupts and releases the GPIO peripheral.
    fn drop(&mut self) {
        for pin in self.edges.watched() {
            if let Err(e) = self.edges.clear(pin) {
                warn!(pin, error = %e, "could not remove edge interrupt");
            }
        }
        if self.simulating() {
            return;
        }
        if let Err(e) = self.driver.cleanup() {
            warn!(error = %e, "GPIO cleanup failed");
        }
    }
}
