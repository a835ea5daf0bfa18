//! The contract shared by every port interface.
//!
//! An interface is a controller for a fixed number of ports, numbered from 1. Both the native
//! header pins and the MCP23017 expander implement [`InOutInterface`], so application code can
//! drive a port without caring which one it lives on.

use std::fmt;
use std::ops::Not;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::error::{Error, Result};
use crate::port::Port;

/// Logic level of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(bit: bool) -> Level {
        if bit {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        level.is_high()
    }
}

impl Not for Level {
    type Output = Level;
    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "low",
            Level::High => "high",
        })
    }
}

/// Whether a port drives or senses its line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Direction::Input => "input",
            Direction::Output => "output",
        })
    }
}

/// Edge callback. Invoked with the port number and the level that confirmed the edge.
pub type Callback = Arc<dyn Fn(u8, Level) + Send + Sync>;

/// Invoke `callback`, containing any panic it raises so the thread delivering edges keeps
/// running. Returns whether the callback completed.
pub(crate) fn fire(callback: &Callback, port: u8, level: Level) -> bool {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(port, level)));
    if outcome.is_err() {
        error!(port, %level, "edge callback panicked");
    }
    outcome.is_ok()
}

/// Tracks the direction each port of an interface is configured in.
///
/// Index 0 is never valid. Every valid port holds `None` until it is first configured, which
/// happens for all ports while the owning interface initializes.
#[derive(Debug)]
pub(crate) struct Directions {
    slots: Vec<Option<Direction>>,
}

impl Directions {
    pub(crate) fn new(count: u8) -> Self {
        Self {
            slots: vec![None; count as usize + 1],
        }
    }

    pub(crate) fn count(&self) -> u8 {
        (self.slots.len() - 1) as u8
    }

    pub(crate) fn check_bounds(&self, port: u8) -> Result<()> {
        if port == 0 || port > self.count() {
            Err(Error::OutOfRange {
                port,
                count: self.count(),
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn get(&self, port: u8) -> Option<Direction> {
        self.slots.get(port as usize).copied().flatten()
    }

    pub(crate) fn set(&mut self, port: u8, direction: Direction) {
        self.slots[port as usize] = Some(direction);
    }

    /// Fails if `port` is an input.
    pub(crate) fn check_writable(&self, port: u8) -> Result<()> {
        match self.get(port) {
            Some(Direction::Input) => Err(Error::DirectionMismatch {
                port,
                direction: Direction::Input,
                operation: "set value",
            }),
            _ => Ok(()),
        }
    }

    /// Fails if `port` is an output.
    pub(crate) fn check_listenable(&self, port: u8) -> Result<()> {
        match self.get(port) {
            Some(Direction::Output) => Err(Error::DirectionMismatch {
                port,
                direction: Direction::Output,
                operation: "listen for value changes",
            }),
            _ => Ok(()),
        }
    }
}

/// A controller of some number of ports.
///
/// Implementors provide the hardware-specific operations; the provided methods build the rest of
/// the surface on top of them. All operations validate the port number first (range, then any
/// interface-specific reservations, then direction compatibility) and touch the hardware only
/// once validation has passed.
pub trait InOutInterface: fmt::Display + Send + Sync {
    /// Number of ports on this interface. Valid port numbers are `1..=port_count()`.
    fn port_count(&self) -> u8;

    /// Check that `port` names a usable port on this interface.
    fn validate(&self, port: u8) -> Result<()>;

    /// The direction `port` is configured in, or `None` if it was never configured.
    fn direction(&self, port: u8) -> Result<Option<Direction>>;

    /// Configure `port` as an output. Any edge listeners on it are removed.
    fn set_as_output(&self, port: u8) -> Result<()>;

    /// Configure `port` as an input.
    fn set_as_input(&self, port: u8) -> Result<()>;

    /// Read the current level of `port`. Valid for inputs and outputs alike.
    fn read(&self, port: u8) -> Result<Level>;

    /// Drive `port` to `level`. Fails if the port is an input.
    fn write(&self, port: u8, level: Level) -> Result<()>;

    /// Register callbacks fired when `port` rises or falls. At least one must be given. Fails if
    /// the port is an output.
    fn add_event(
        &self,
        port: u8,
        on_rising: Option<Callback>,
        on_falling: Option<Callback>,
    ) -> Result<()>;

    /// Remove every callback registered for `port`.
    fn clear_events(&self, port: u8) -> Result<()>;

    fn write_high(&self, port: u8) -> Result<()> {
        self.write(port, Level::High)
    }

    fn write_low(&self, port: u8) -> Result<()> {
        self.write(port, Level::Low)
    }

    fn is_high(&self, port: u8) -> Result<bool> {
        Ok(self.read(port)?.is_high())
    }

    fn is_low(&self, port: u8) -> Result<bool> {
        Ok(self.read(port)?.is_low())
    }

    fn is_input(&self, port: u8) -> Result<bool> {
        Ok(self.direction(port)? == Some(Direction::Input))
    }

    fn is_output(&self, port: u8) -> Result<bool> {
        Ok(self.direction(port)? == Some(Direction::Output))
    }

    /// Register a callback fired when `port` goes from low to high.
    fn on_rising(&self, port: u8, callback: Callback) -> Result<()> {
        self.add_event(port, Some(callback), None)
    }

    /// Register a callback fired when `port` goes from high to low.
    fn on_falling(&self, port: u8, callback: Callback) -> Result<()> {
        self.add_event(port, None, Some(callback))
    }

    /// Obtain a handle for one port on this interface.
    fn port(&self, port: u8) -> Result<Port<'_, Self>>
    where
        Self: Sized,
    {
        self.validate(port)?;
        Ok(Port::new(self, port))
    }

    /// Put every usable port into its safe default state: output, driven low.
    fn initialize(&self) -> Result<()>
    where
        Self: Sized,
    {
        for number in 1..=self.port_count() {
            if self.validate(number).is_ok() {
                self.port(number)?.initialize()?;
            }
        }
        Ok(())
    }
}
