//! Uniform digital I/O over the native GPIO header of a single-board computer and over MCP23017
//! I2C port expanders attached to it.
//!
//! The MCP23017 provides 16 additional GPIO ports in two banks of 8, each bank controlled through
//! a handful of 8-bit registers. The native header provides 40 pins, some of which are hardwired
//! to power, ground or the I2C bus. This crate puts both behind one contract,
//! [`InOutInterface`], so application code can configure, drive, read and watch a port the same
//! way wherever it lives.
//!
//! # Construction
//!
//! The crate does not talk to hardware directly. Each interface takes ownership of a driver that
//! does:
//!
//! - An [`Expander`] takes a [`RegisterBus`], typically an [`I2cBus`] wrapping your platform's
//!   `embedded-hal` blocking I2C master, plus the I2C address of the chip. When several expanders
//!   sit on one bus, wrap it in a [`SharedBus`] and give each expander a clone.
//! - A [`NativeInterface`] takes a [`PinDriver`] implemented over your platform's GPIO library.
//!
//! Both also take a [`Config`], which carries the debounce duration and the simulation switch.
//! Construction initializes every usable port as an output driven low.
//!
//! ```
//! # fn main() -> portio::Result<()> {
//! # let i2c_bus = portio::interface::noop::NoopBus;
//! # let pin_driver = portio::interface::noop::NoopPins;
//! use portio::{Config, Expander, InOutInterface, NativeInterface};
//!
//! let expander = Expander::new(i2c_bus, 0x20, Config::default())?;
//! let gpio = NativeInterface::new(pin_driver, Config::default())?;
//!
//! expander.port(3)?.set_high()?;
//! gpio.port(7)?.set_high()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Ports
//!
//! *See [`Port`].*
//!
//! Ports are numbered from 1. A [`Port`] is a cheap handle obtained from its interface with
//! [`InOutInterface::port`]; every operation on it is forwarded to the interface, which validates
//! the port number (range first, then reserved header pins) and the port's direction before
//! touching the hardware. Writing to an input, or listening for edges on an output, is an error.
//!
//! `Port` implements the `embedded-hal` `OutputPin` and `InputPin` traits, so it can be handed to
//! other `embedded-hal` drivers.
//!
//! # Edge callbacks
//!
//! ```
//! # fn main() -> portio::Result<()> {
//! # let i2c_bus = portio::interface::noop::NoopBus;
//! # use portio::{Config, Expander, InOutInterface};
//! # let expander = Expander::new(i2c_bus, 0x20, Config::default())?;
//! let button = expander.port(9)?;
//! button
//!     .set_as_input()?
//!     .on_rising(|port, level| println!("port {} went {}", port, level))?;
//! button.clear_listeners()?;
//! # Ok(())
//! # }
//! ```
//!
//! Rising callbacks fire on a low to high transition, falling callbacks on high to low. They
//! receive the port number and the new level, and run in the order they were registered.
//!
//! - On the native header the pin driver delivers debounced interrupts; the callbacks run on
//!   whatever thread the driver uses.
//! - The MCP23017 cannot deliver interrupts here, so the expander starts a background thread that
//!   polls every watched port (every 10ms by default). A change must persist for the debounce
//!   duration (200ms by default) to count as an edge. The thread starts with the first callback
//!   and stops once the last one is removed.
//!
//! A panicking callback is logged and does not stop the delivery of further edges.
//!
//! # Simulation
//!
//! With [`Simulation`] enabled in the [`Config`], no hardware is touched: writes are skipped,
//! reads return a fixed or externally supplied level, and each such call logs a warning. This
//! allows running an application on a machine without the hardware.
//!
//! # Logging
//!
//! The crate logs through `tracing`. It never installs a subscriber.

extern crate embedded_hal as hal;

pub mod codec;
pub mod config;
pub mod error;
pub mod expander;
pub mod interface;
pub mod io;
mod mutex;
pub mod native;
pub mod port;
pub mod registers;

pub use config::{Config, Simulation};
pub use error::{Error, ReservedPin, Result};
pub use expander::Expander;
pub use interface::i2c::I2cBus;
pub use interface::shared::SharedBus;
pub use interface::{EdgeMode, PinDriver, PullMode, RegisterBus};
pub use io::{Callback, Direction, InOutInterface, Level};
pub use native::NativeInterface;
pub use port::Port;
pub use registers::Bank;
