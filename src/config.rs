//! Process-wide settings consumed by the port interfaces.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::io::Level;

/// Time a level change must persist before it is treated as an edge.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Time between two samples of the expander listener loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Controls whether hardware is actually touched.
///
/// When simulating, every write to the hardware is skipped and every read returns a synthetic
/// level. Each skipped call emits a warning, so a simulated run is never silent about it.
#[derive(Clone, Default)]
pub enum Simulation {
    /// Talk to the hardware.
    #[default]
    Disabled,
    /// Skip hardware access; reads always return the given level.
    Fixed(Level),
    /// Skip hardware access; reads return whatever the supplied function returns for the port
    /// number.
    Supplied(Arc<dyn Fn(u8) -> Level + Send + Sync>),
}

impl Simulation {
    /// Whether hardware access is skipped.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Simulation::Disabled)
    }

    /// The synthetic level for `port`, or `None` if not simulating.
    pub(crate) fn level(&self, port: u8) -> Option<Level> {
        match self {
            Simulation::Disabled => None,
            Simulation::Fixed(level) => Some(*level),
            Simulation::Supplied(f) => Some(f(port)),
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Simulation::Disabled => f.write_str("Disabled"),
            Simulation::Fixed(level) => f.debug_tuple("Fixed").field(level).finish(),
            Simulation::Supplied(_) => f.write_str("Supplied(..)"),
        }
    }
}

/// Settings owned by each interface, chained builder-style:
///
/// ```
/// # use std::time::Duration;
/// # use portio::{Config, Level, Simulation};
/// let config = Config::default()
///     .debounce(Duration::from_millis(50))
///     .simulation(Simulation::Fixed(Level::Low));
/// assert_eq!(config.debounce_duration(), Duration::from_millis(50));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    debounce: Duration,
    poll_interval: Duration,
    simulation: Simulation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            simulation: Simulation::Disabled,
        }
    }
}

impl Config {
    /// Set the time a level change must persist to be reported as an edge. Used both by the
    /// expander listener loop and as the debounce handed to native pin interrupts.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the sampling interval of the expander listener loop.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable hardware simulation.
    pub fn simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn debounce_duration(&self) -> Duration {
        self.debounce
    }

    pub fn poll_interval_duration(&self) -> Duration {
        self.poll_interval
    }

    pub fn simulation_mode(&self) -> &Simulation {
        &self.simulation
    }
}
