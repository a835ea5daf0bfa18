//! The MCP23017 port expander interface. This provides the `Expander` type, which exposes the 16
//! ports of the chip through [`InOutInterface`].
//!
//! Every single-port write is a read-modify-write of a whole bank register, composed from the
//! expander's cached view of the other 7 ports of the bank (see [`codec`](crate::codec)). Edge
//! callbacks are served by a polling [`listener`] thread that only runs while at least one
//! callback is registered.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::interface::RegisterBus;
use crate::io::{Callback, Direction, Directions, InOutInterface, Level};
use crate::mutex::{get_mut, lock};
use crate::port::Port;
use crate::registers::{Bank, Register, RegisterAddress, BANK_WIDTH};

use self::listener::{Listener, Registry, Sample, Timing};

pub(crate) mod listener;

/// Number of ports on the MCP23017.
pub const PORT_COUNT: u8 = 2 * BANK_WIDTH;

/// Hardware access for one chip, shared with the listener thread.
struct Chip<B> {
    address: u8,
    config: Config,
    bus: Mutex<B>,
}

impl<B: RegisterBus> Chip<B> {
    fn write(&self, register: Register, value: u8) -> Result<()> {
        let addr = RegisterAddress::from(register);
        debug!(
            address = self.address,
            register = u8::from(addr),
            value = format_args!("{:#010b}", value),
            "writing register"
        );
        if self.config.simulation_mode().is_enabled() {
            warn!(address = self.address, "no hardware mode, no write done");
            return Ok(());
        }
        lock(&self.bus)
            .write_register(self.address, addr, value)
            .map_err(Error::hardware)
    }

    fn read_level(&self, port: u8) -> Result<Level> {
        if let Some(level) = self.config.simulation_mode().level(port) {
            warn!(address = self.address, port, "no hardware mode, no read done");
            return Ok(level);
        }
        let addr = RegisterAddress::from(Register::Input(Bank::of(port)));
        let value = lock(&self.bus)
            .read_register(self.address, addr)
            .map_err(Error::hardware)?;
        codec::decode(port, value).map_err(|_| Error::Codec {
            port,
            register: addr.into(),
            value,
        })
    }
}

impl<B: RegisterBus + Send + 'static> Sample for Chip<B> {
    fn sample(&self, port: u8) -> Result<Level> {
        self.read_level(port)
    }
}

/// The logical state the bank registers are composed from.
struct PortState {
    directions: Directions,
    latched: Vec<Level>,
}

/// An MCP23017 on a register bus, exposing its ports 1 (GPA0) to 16 (GPB7).
///
/// ```
/// # use portio::{Config, Expander, InOutInterface};
/// # fn main() -> portio::Result<()> {
/// # let bus = portio::interface::noop::NoopBus;
/// let expander = Expander::new(bus, 0x20, Config::default())?;
/// let lamp = expander.port(3)?;
/// lamp.set_high()?;
/// let button = expander.port(12)?;
/// button.set_as_input()?.on_rising(|port, _| println!("port {} pressed", port))?;
/// # Ok(())
/// # }
/// ```
pub struct Expander<B: RegisterBus> {
    chip: Arc<Chip<B>>,
    state: Mutex<PortState>,
    listeners: Arc<Mutex<Registry>>,
    // Held across registration calls so starting and stopping the listener never races them.
    listener: Mutex<Option<Listener>>,
}

impl<B: RegisterBus + Send + 'static> Expander<B> {
    /// Create a new `Expander` for the chip at I2C address `address` (e.g. `0x20`), reachable over
    /// `bus`.
    ///
    /// All 16 ports are initialized as outputs driven low before this returns. Nothing prevents
    /// creating two expanders for the same address.
    pub fn new(bus: B, address: u8, config: Config) -> Result<Self> {
        let expander = Self {
            chip: Arc::new(Chip {
                address,
                config,
                bus: Mutex::new(bus),
            }),
            state: Mutex::new(PortState {
                directions: Directions::new(PORT_COUNT),
                latched: vec![Level::Low; PORT_COUNT as usize + 1],
            }),
            listeners: Arc::new(Mutex::new(Registry::default())),
            listener: Mutex::new(None),
        };
        expander.initialize()?;
        Ok(expander)
    }

    /// The I2C address of this expander.
    pub fn address(&self) -> u8 {
        self.chip.address
    }

    /// Obtain a port by its position within a bank: `offset` 1 to 8 selects GPA0 to GPA7 or
    /// GPB0 to GPB7.
    pub fn bank_port(&self, bank: Bank, offset: u8) -> Result<Port<'_, Self>> {
        if offset == 0 || offset > BANK_WIDTH {
            return Err(Error::OutOfRange {
                port: offset,
                count: BANK_WIDTH,
            });
        }
        self.port(bank.port(offset))
    }

    /// Whether a listener thread is currently polling this expander.
    pub fn is_listening(&self) -> bool {
        lock(&self.listener).is_some()
    }

    fn set_direction(&self, port: u8, direction: Direction) -> Result<()> {
        self.validate(port)?;
        let mut state = lock(&self.state);
        let byte = codec::compose(port, direction == Direction::Input, |p| {
            state.directions.get(p) == Some(Direction::Input)
        });
        self.chip.write(Register::Direction(Bank::of(port)), byte)?;
        state.directions.set(port, direction);
        Ok(())
    }
}

impl<B: RegisterBus + Send + 'static> InOutInterface for Expander<B> {
    fn port_count(&self) -> u8 {
        PORT_COUNT
    }

    fn validate(&self, port: u8) -> Result<()> {
        lock(&self.state).directions.check_bounds(port)
    }

    fn direction(&self, port: u8) -> Result<Option<Direction>> {
        self.validate(port)?;
        Ok(lock(&self.state).directions.get(port))
    }

    fn set_as_output(&self, port: u8) -> Result<()> {
        self.set_direction(port, Direction::Output)?;
        self.clear_events(port)
    }

    fn set_as_input(&self, port: u8) -> Result<()> {
        self.set_direction(port, Direction::Input)
    }

    /// Read the level of `port` from the bank's port register. Output ports read back their
    /// latched value.
    fn read(&self, port: u8) -> Result<Level> {
        self.validate(port)?;
        self.chip.read_level(port)
    }

    fn write(&self, port: u8, level: Level) -> Result<()> {
        self.validate(port)?;
        let mut state = lock(&self.state);
        state.directions.check_writable(port)?;
        let byte = codec::compose(port, level.is_high(), |p| {
            state.latched[p as usize].is_high()
        });
        self.chip.write(Register::Output(Bank::of(port)), byte)?;
        state.latched[port as usize] = level;
        Ok(())
    }

    fn add_event(
        &self,
        port: u8,
        on_rising: Option<Callback>,
        on_falling: Option<Callback>,
    ) -> Result<()> {
        // Held through registration so a concurrent `set_as_output` clears after us, not before.
        let mut listener = lock(&self.listener);
        self.validate(port)?;
        lock(&self.state).directions.check_listenable(port)?;
        if on_rising.is_none() && on_falling.is_none() {
            return Err(Error::NoCallback { port });
        }

        let level = self.chip.read_level(port)?;
        if listener.is_none() {
            let timing = Timing {
                debounce: self.chip.config.debounce_duration(),
                poll_interval: self.chip.config.poll_interval_duration(),
            };
            *listener = Some(Listener::spawn(
                format!("Listener on {}", self),
                self.chip.clone(),
                self.listeners.clone(),
                timing,
            )?);
            info!(expander = %self, "started listening for value changes");
        }
        lock(&self.listeners).add(port, level, on_rising, on_falling);
        debug!(expander = %self, port, %level, "added value change listener");
        Ok(())
    }

    fn clear_events(&self, port: u8) -> Result<()> {
        self.validate(port)?;
        let mut listener = lock(&self.listener);
        let mut listeners = lock(&self.listeners);
        if listeners.clear(port) {
            debug!(expander = %self, port, "cleared value change listeners");
        }
        if listeners.is_empty() {
            if let Some(running) = listener.take() {
                running.stop();
                info!(expander = %self, "stopped listening for value changes");
            }
        }
        Ok(())
    }
}

impl<B: RegisterBus> fmt::Display for Expander<B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MCP23017 on address: {:#04x}", self.chip.address)
    }
}

impl<B: RegisterBus> Drop for Expander<B> {
    /// Stops the listener thread, waiting for it to exit.
    fn drop(&mut self) {
        if let Some(running) = get_mut(&mut self.listener).take() {
            debug!(address = self.chip.address, "gently stopping listener thread");
            running.shutdown();
        }
    }
}
