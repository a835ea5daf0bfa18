//! Shims between the port interfaces and the hardware drivers underneath them.
//!
//! The expander talks to its chip through a [`RegisterBus`], and the native interface drives the
//! header through a [`PinDriver`]. Both are implemented outside this crate by whatever platform
//! code owns the actual bus and GPIO peripheral.

use std::time::Duration;

use crate::io::{Direction, Level};
use crate::registers::RegisterAddress;

/// A bus that can reach one or more register-addressed devices, such as an I2C bus with
/// MCP23017s on it.
pub trait RegisterBus {
    /// The type of error that register reads and writes may return.
    type Error: std::error::Error + Send + Sync + 'static;
    /// Write `value` into register `register` of the device at bus address `address`.
    fn write_register(
        &mut self,
        address: u8,
        register: RegisterAddress,
        value: u8,
    ) -> Result<(), Self::Error>;
    /// Fetch the `u8` value of register `register` of the device at bus address `address`.
    fn read_register(&mut self, address: u8, register: RegisterAddress) -> Result<u8, Self::Error>;
}

/// Internal resistor applied to a native pin configured as input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PullMode {
    Up,
    Down,
    /// No resistor, the line floats.
    #[default]
    Floating,
}

/// Which transitions a pin interrupt fires on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeMode {
    Rising,
    Falling,
    Both,
}

/// Handler invoked by a [`PinDriver`] when an interrupt fires. It may be called from any thread.
pub type InterruptHandler = Box<dyn Fn() + Send + Sync>;

/// Access to the native GPIO pins, addressed by header (board) pin number.
///
/// Implementations must be usable from several threads at once, since interrupt handlers read
/// pins from whatever thread the driver delivers interrupts on.
pub trait PinDriver: Send + Sync {
    /// The type of error that pin operations may return.
    type Error: std::error::Error + Send + Sync + 'static;
    /// Set up `pin` in `direction`. `pull` is only given for inputs.
    fn configure_pin(
        &self,
        pin: u8,
        direction: Direction,
        pull: Option<PullMode>,
    ) -> Result<(), Self::Error>;
    /// Drive an output pin.
    fn write_pin(&self, pin: u8, level: Level) -> Result<(), Self::Error>;
    /// Read the level present on a pin.
    fn read_pin(&self, pin: u8) -> Result<Level, Self::Error>;
    /// Call `handler` whenever `pin` sees an edge matching `mode`. The driver is responsible for
    /// suppressing repeated edges within `debounce`. `handler` must not be called before this
    /// returns.
    fn register_interrupt(
        &self,
        pin: u8,
        mode: EdgeMode,
        debounce: Duration,
        handler: InterruptHandler,
    ) -> Result<(), Self::Error>;
    /// Stop delivering interrupts for `pin`.
    fn deregister_interrupt(&self, pin: u8) -> Result<(), Self::Error>;
    /// Release the GPIO peripheral. Called once when the owning interface is dropped.
    fn cleanup(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub mod i2c {
    //! The I2C bus adapter drives register accesses over any `embedded-hal` blocking I2C master.

    use std::fmt;

    use hal::blocking::i2c::{Write, WriteRead};

    use super::RegisterBus;
    use crate::registers::RegisterAddress;

    /// The union of all errors that may occur on the I2C bus.
    #[derive(Debug)]
    pub enum I2cBusError<WE, RE> {
        /// An error occurred during an I2C write.
        WriteError(WE),
        /// An error occurred during an I2C write-then-read.
        WriteReadError(RE),
    }

    impl<WE: fmt::Debug, RE: fmt::Debug> fmt::Display for I2cBusError<WE, RE> {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                I2cBusError::WriteError(e) => write!(f, "I2C write failed: {:?}", e),
                I2cBusError::WriteReadError(e) => write!(f, "I2C write-read failed: {:?}", e),
            }
        }
    }

    impl<WE: fmt::Debug, RE: fmt::Debug> std::error::Error for I2cBusError<WE, RE> {}

    /// A `RegisterBus` for devices on an I2C bus.
    pub struct I2cBus<I2C> {
        i2c: I2C,
    }

    impl<I2C> I2cBus<I2C>
    where
        I2C: Write + WriteRead,
    {
        /// Create a new register bus on top of the I2C master device `i2c`.
        pub fn new(i2c: I2C) -> Self {
            Self { i2c }
        }

        /// Release the I2C master device.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    impl<I2C> RegisterBus for I2cBus<I2C>
    where
        I2C: Write + WriteRead,
        <I2C as Write>::Error: fmt::Debug + Send + Sync + 'static,
        <I2C as WriteRead>::Error: fmt::Debug + Send + Sync + 'static,
    {
        type Error = I2cBusError<<I2C as Write>::Error, <I2C as WriteRead>::Error>;

        fn write_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
            value: u8,
        ) -> Result<(), Self::Error> {
            // Register pointer first, then the data byte.
            self.i2c
                .write(address, &[u8::from(register), value])
                .map_err(I2cBusError::WriteError)
        }

        fn read_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
        ) -> Result<u8, Self::Error> {
            // Set the register pointer, then read back one byte under a repeated start.
            let mut buf = [0u8];
            self.i2c
                .write_read(address, &[u8::from(register)], &mut buf)
                .map_err(I2cBusError::WriteReadError)?;
            Ok(buf[0])
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::registers::{Bank, Register};

        #[derive(Default)]
        struct RecordingI2c {
            writes: Vec<(u8, Vec<u8>)>,
            reply: u8,
        }

        impl Write for RecordingI2c {
            type Error = ();
            fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
                self.writes.push((address, bytes.to_vec()));
                Ok(())
            }
        }

        impl WriteRead for RecordingI2c {
            type Error = ();
            fn write_read(
                &mut self,
                address: u8,
                bytes: &[u8],
                buffer: &mut [u8],
            ) -> Result<(), ()> {
                self.writes.push((address, bytes.to_vec()));
                buffer[0] = self.reply;
                Ok(())
            }
        }

        #[test]
        fn write_sends_register_then_value() {
            let mut bus = I2cBus::new(RecordingI2c::default());
            assert!(bus
                .write_register(0x20, Register::Output(Bank::B).into(), 0b1010)
                .is_ok());
            assert_eq!(bus.release().writes, vec![(0x20, vec![0x15, 0b1010])]);
        }

        #[test]
        fn read_sets_pointer_then_reads() {
            let mut bus = I2cBus::new(RecordingI2c {
                reply: 0x5A,
                ..Default::default()
            });
            assert_eq!(
                bus.read_register(0x21, Register::Input(Bank::A).into()).ok(),
                Some(0x5A)
            );
            assert_eq!(bus.release().writes, vec![(0x21, vec![0x12])]);
        }
    }
}

pub mod shared {
    //! Sharing one bus between several expanders.

    use std::sync::{Arc, Mutex, PoisonError};

    use super::RegisterBus;
    use crate::registers::RegisterAddress;

    /// A cloneable handle to a bus guarded by a mutex. Give one clone to each expander that sits on
    /// the same physical bus; every register access locks the bus for its duration.
    pub struct SharedBus<B> {
        bus: Arc<Mutex<B>>,
    }

    impl<B: RegisterBus> SharedBus<B> {
        pub fn new(bus: B) -> Self {
            Self {
                bus: Arc::new(Mutex::new(bus)),
            }
        }
    }

    impl<B> Clone for SharedBus<B> {
        fn clone(&self) -> Self {
            Self {
                bus: self.bus.clone(),
            }
        }
    }

    impl<B: RegisterBus> RegisterBus for SharedBus<B> {
        type Error = B::Error;

        fn write_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
            value: u8,
        ) -> Result<(), Self::Error> {
            self.bus
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_register(address, register, value)
        }

        fn read_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
        ) -> Result<u8, Self::Error> {
            self.bus
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read_register(address, register)
        }
    }
}

// This is here (and has to be pub) for doctests only. It's useless otherwise.
#[doc(hidden)]
pub mod noop {
    use std::time::Duration;

    use super::{EdgeMode, InterruptHandler, PinDriver, PullMode, RegisterBus};
    use crate::io::{Direction, Level};
    use crate::registers::RegisterAddress;

    pub struct NoopBus;
    impl RegisterBus for NoopBus {
        type Error = core::convert::Infallible;
        fn write_register(
            &mut self,
            _address: u8,
            _register: RegisterAddress,
            _value: u8,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
        fn read_register(
            &mut self,
            _address: u8,
            _register: RegisterAddress,
        ) -> Result<u8, Self::Error> {
            Ok(0u8)
        }
    }

    pub struct NoopPins;
    impl PinDriver for NoopPins {
        type Error = core::convert::Infallible;
        fn configure_pin(
            &self,
            _pin: u8,
            _direction: Direction,
            _pull: Option<PullMode>,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
        fn write_pin(&self, _pin: u8, _level: Level) -> Result<(), Self::Error> {
            Ok(())
        }
        fn read_pin(&self, _pin: u8) -> Result<Level, Self::Error> {
            Ok(Level::Low)
        }
        fn register_interrupt(
            &self,
            _pin: u8,
            _mode: EdgeMode,
            _debounce: Duration,
            _handler: InterruptHandler,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
        fn deregister_interrupt(&self, _pin: u8) -> Result<(), Self::Error> {
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_spy {
    //! Collaborators for use in unit tests to spy on whatever was sent to them.

    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{EdgeMode, InterruptHandler, PinDriver, PullMode, RegisterBus};
    use crate::io::{Direction, Level};
    use crate::registers::RegisterAddress;

    #[derive(Debug)]
    pub struct SpyError;

    impl fmt::Display for SpyError {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("spy failure")
        }
    }

    impl std::error::Error for SpyError {}

    #[derive(Default)]
    struct Chip {
        registers: [u8; 0x16],
        // Levels applied externally to the pins, one bit per port, bank A low byte.
        pins: u16,
        writes: Vec<(u8, u8, u8)>,
        reads: Vec<(u8, u8)>,
        fail: bool,
    }

    /// A model of an MCP23017 register file. Reading a `GPIO` register returns the latched output
    /// for output pins and the externally driven level for input pins.
    pub struct TestSpyBus {
        chip: Arc<Mutex<Chip>>,
    }

    impl TestSpyBus {
        pub fn new() -> Self {
            let mut chip = Chip::default();
            // IODIR resets to all inputs.
            chip.registers[0x00] = 0xFF;
            chip.registers[0x01] = 0xFF;
            Self {
                chip: Arc::new(Mutex::new(chip)),
            }
        }

        pub fn split(&self) -> Self {
            Self {
                chip: self.chip.clone(),
            }
        }

        pub fn get(&self, register: u8) -> u8 {
            self.chip.lock().unwrap().registers[register as usize]
        }

        /// Every write as `(address, register, value)`, oldest first.
        pub fn writes(&self) -> Vec<(u8, u8, u8)> {
            self.chip.lock().unwrap().writes.clone()
        }

        pub fn reads(&self) -> Vec<(u8, u8)> {
            self.chip.lock().unwrap().reads.clone()
        }

        pub fn clear_log(&self) {
            let mut chip = self.chip.lock().unwrap();
            chip.writes.clear();
            chip.reads.clear();
        }

        /// Apply `level` externally to `port` (1 to 16).
        pub fn drive(&self, port: u8, level: Level) {
            let mut chip = self.chip.lock().unwrap();
            let mask = 1u16 << (port - 1);
            if level.is_high() {
                chip.pins |= mask;
            } else {
                chip.pins &= !mask;
            }
        }

        /// Make every subsequent access fail.
        pub fn fail(&self) {
            self.chip.lock().unwrap().fail = true;
        }
    }

    impl RegisterBus for TestSpyBus {
        type Error = SpyError;

        fn write_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
            value: u8,
        ) -> Result<(), Self::Error> {
            let mut chip = self.chip.lock().unwrap();
            if chip.fail {
                return Err(SpyError);
            }
            let reg = u8::from(register);
            assert!(
                reg <= 0x01 || reg == 0x14 || reg == 0x15,
                "write to unexpected register {:#04x}",
                reg
            );
            chip.writes.push((address, reg, value));
            chip.registers[reg as usize] = value;
            Ok(())
        }

        fn read_register(
            &mut self,
            address: u8,
            register: RegisterAddress,
        ) -> Result<u8, Self::Error> {
            let mut chip = self.chip.lock().unwrap();
            if chip.fail {
                return Err(SpyError);
            }
            let reg = u8::from(register);
            chip.reads.push((address, reg));
            Ok(match reg {
                0x12 | 0x13 => {
                    let bank = (reg - 0x12) as usize;
                    let iodir = chip.registers[bank];
                    let olat = chip.registers[0x14 + bank];
                    let pins = (chip.pins >> (8 * bank)) as u8;
                    olat & !iodir | pins & iodir
                }
                other => chip.registers[other as usize],
            })
        }
    }

    #[derive(Default)]
    struct Header {
        configured: HashMap<u8, (Direction, Option<PullMode>)>,
        levels: HashMap<u8, Level>,
        handlers: HashMap<u8, (EdgeMode, Duration, Arc<InterruptHandler>)>,
        calls: usize,
        cleaned_up: bool,
    }

    /// A pin driver that records configuration and keeps interrupt handlers so tests can fire
    /// them.
    pub struct TestSpyPins {
        header: Arc<Mutex<Header>>,
    }

    impl TestSpyPins {
        pub fn new() -> Self {
            Self {
                header: Arc::new(Mutex::new(Header::default())),
            }
        }

        pub fn split(&self) -> Self {
            Self {
                header: self.header.clone(),
            }
        }

        pub fn configuration(&self, pin: u8) -> Option<(Direction, Option<PullMode>)> {
            self.header.lock().unwrap().configured.get(&pin).copied()
        }

        pub fn level(&self, pin: u8) -> Option<Level> {
            self.header.lock().unwrap().levels.get(&pin).copied()
        }

        /// Apply `level` externally to `pin`.
        pub fn drive(&self, pin: u8, level: Level) {
            self.header.lock().unwrap().levels.insert(pin, level);
        }

        pub fn interrupt(&self, pin: u8) -> Option<(EdgeMode, Duration)> {
            self.header
                .lock()
                .unwrap()
                .handlers
                .get(&pin)
                .map(|(mode, debounce, _)| (*mode, *debounce))
        }

        /// Invoke the interrupt handler installed for `pin`, as the driver would on an edge.
        pub fn fire(&self, pin: u8) {
            let handler = self
                .header
                .lock()
                .unwrap()
                .handlers
                .get(&pin)
                .map(|(_, _, handler)| handler.clone());
            if let Some(handler) = handler {
                (*handler)();
            }
        }

        /// Total number of driver calls made.
        pub fn calls(&self) -> usize {
            self.header.lock().unwrap().calls
        }

        pub fn cleaned_up(&self) -> bool {
            self.header.lock().unwrap().cleaned_up
        }
    }

    impl PinDriver for TestSpyPins {
        type Error = SpyError;

        fn configure_pin(
            &self,
            pin: u8,
            direction: Direction,
            pull: Option<PullMode>,
        ) -> Result<(), Self::Error> {
            let mut header = self.header.lock().unwrap();
            header.calls += 1;
            header.configured.insert(pin, (direction, pull));
            Ok(())
        }

        fn write_pin(&self, pin: u8, level: Level) -> Result<(), Self::Error> {
            let mut header = self.header.lock().unwrap();
            header.calls += 1;
            header.levels.insert(pin, level);
            Ok(())
        }

        fn read_pin(&self, pin: u8) -> Result<Level, Self::Error> {
            let mut header = self.header.lock().unwrap();
            header.calls += 1;
            Ok(header.levels.get(&pin).copied().unwrap_or(Level::Low))
        }

        fn register_interrupt(
            &self,
            pin: u8,
            mode: EdgeMode,
            debounce: Duration,
            handler: InterruptHandler,
        ) -> Result<(), Self::Error> {
            let mut header = self.header.lock().unwrap();
            header.calls += 1;
            header
                .handlers
                .insert(pin, (mode, debounce, Arc::new(handler)));
            Ok(())
        }

        fn deregister_interrupt(&self, pin: u8) -> Result<(), Self::Error> {
            let mut header = self.header.lock().unwrap();
            header.calls += 1;
            header.handlers.remove(&pin);
            Ok(())
        }

        fn cleanup(&self) -> Result<(), Self::Error> {
            self.header.lock().unwrap().cleaned_up = true;
            Ok(())
        }
    }
}
