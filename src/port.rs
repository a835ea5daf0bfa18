//! A single port on an interface.
//!
//! A `Port` holds no state of its own. It is a proxy that forwards every command to the interface
//! it belongs to, so any number of handles for the same port may exist at once.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "unproven")]
use hal::digital::v2::InputPin;
use hal::digital::v2::OutputPin;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{Direction, InOutInterface, Level};

/// A single port on an [`InOutInterface`]. These implement the `embedded-hal` traits for GPIO
/// pins, so they can be handed to other `embedded-hal` drivers regardless of whether the port is a
/// header pin or an expander line.
pub struct Port<'io, I: InOutInterface + ?Sized> {
    io: &'io I,
    number: u8,
}

impl<'io, I: InOutInterface + ?Sized> Port<'io, I> {
    pub(crate) fn new(io: &'io I, number: u8) -> Self {
        Self { io, number }
    }

    /// The 1-based number of this port on its interface.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// The interface this port belongs to.
    pub fn interface(&self) -> &'io I {
        self.io
    }

    /// Configure as output, driven low.
    pub fn initialize(&self) -> Result<&Self> {
        self.set_as_output()?.set_low()
    }

    pub fn value(&self) -> Result<Level> {
        self.io.read(self.number)
    }

    pub fn is_high(&self) -> Result<bool> {
        self.io.is_high(self.number)
    }

    pub fn is_low(&self) -> Result<bool> {
        self.io.is_low(self.number)
    }

    pub fn direction(&self) -> Result<Option<Direction>> {
        self.io.direction(self.number)
    }

    pub fn is_output(&self) -> Result<bool> {
        self.io.is_output(self.number)
    }

    pub fn is_input(&self) -> Result<bool> {
        self.io.is_input(self.number)
    }

    pub fn set_as_output(&self) -> Result<&Self> {
        debug!(port = %self, "setting as output");
        self.io.set_as_output(self.number)?;
        Ok(self)
    }

    pub fn set_as_input(&self) -> Result<&Self> {
        debug!(port = %self, "setting as input");
        self.io.set_as_input(self.number)?;
        Ok(self)
    }

    pub fn set_high(&self) -> Result<&Self> {
        debug!(port = %self, "setting high");
        self.io.write_high(self.number)?;
        Ok(self)
    }

    pub fn set_low(&self) -> Result<&Self> {
        debug!(port = %self, "setting low");
        self.io.write_low(self.number)?;
        Ok(self)
    }

    /// Add a callback fired when the value on this port changes from low to high.
    ///
    /// The callback receives the port number and the level that confirmed the change.
    pub fn on_rising<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(u8, Level) + Send + Sync + 'static,
    {
        self.io.on_rising(self.number, Arc::new(callback))?;
        Ok(self)
    }

    /// Add a callback fired when the value on this port changes from high to low.
    ///
    /// The callback receives the port number and the level that confirmed the change.
    pub fn on_falling<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(u8, Level) + Send + Sync + 'static,
    {
        self.io.on_falling(self.number, Arc::new(callback))?;
        Ok(self)
    }

    /// Remove every callback added with `on_rising` and `on_falling`.
    pub fn clear_listeners(&self) -> Result<&Self> {
        self.io.clear_events(self.number)?;
        Ok(self)
    }
}

impl<'io, I: InOutInterface + ?Sized> Clone for Port<'io, I> {
    fn clone(&self) -> Self {
        Self {
            io: self.io,
            number: self.number,
        }
    }
}

impl<'io, I: InOutInterface + ?Sized> fmt::Display for Port<'io, I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "port {} on {}", self.number, self.io)
    }
}

impl<'io, I: InOutInterface + ?Sized> fmt::Debug for Port<'io, I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Port")
            .field("interface", &format_args!("{}", self.io))
            .field("number", &self.number)
            .finish()
    }
}

impl<'io, I: InOutInterface + ?Sized> OutputPin for Port<'io, I> {
    type Error = Error;

    fn set_high(&mut self) -> Result<()> {
        Port::set_high(self).map(|_| ())
    }
    fn set_low(&mut self) -> Result<()> {
        Port::set_low(self).map(|_| ())
    }
}

#[cfg(feature = "unproven")]
impl<'io, I: InOutInterface + ?Sized> InputPin for Port<'io, I> {
    type Error = Error;

    fn is_high(&self) -> Result<bool> {
        Port::is_high(self)
    }
    fn is_low(&self) -> Result<bool> {
        Port::is_low(self)
    }
}
