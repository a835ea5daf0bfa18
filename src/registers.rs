//! The register addresses within the MCP23017.
//!
//! The chip is used in its power-on addressing mode (`IOCON.BANK = 0`), where the A and B
//! registers of each kind sit at consecutive addresses.

/// A register address within the MCP23017. These are created by conversion from `Register`. It is
/// a newtype around `u8` that prevents arbitrary addresses from being forged and passed to
/// `RegisterBus` methods.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct RegisterAddress(pub(crate) u8);

impl From<RegisterAddress> for u8 {
    /// Convert a `RegisterAddress` into a `u8` corresponding to the hardware address.
    fn from(addr: RegisterAddress) -> u8 {
        addr.0
    }
}

/// One of the two 8-port halves of the expander.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bank {
    /// GPA, ports 1 to 8.
    A,
    /// GPB, ports 9 to 16.
    B,
}

/// Number of ports in each bank.
pub const BANK_WIDTH: u8 = 8;

impl Bank {
    /// The bank `port` belongs to. `port` is expected to be in `1..=16`.
    pub fn of(port: u8) -> Bank {
        if port <= BANK_WIDTH {
            Bank::A
        } else {
            Bank::B
        }
    }

    /// The lowest port number in this bank.
    pub fn start(self) -> u8 {
        match self {
            Bank::A => 1,
            Bank::B => BANK_WIDTH + 1,
        }
    }

    /// All port numbers in this bank, lowest first.
    pub fn ports(self) -> core::ops::RangeInclusive<u8> {
        self.start()..=self.start() + BANK_WIDTH - 1
    }

    /// Resolve a bank-relative port (1 to 8) into an absolute port number.
    pub fn port(self, offset: u8) -> u8 {
        self.start() - 1 + offset
    }

    fn index(self) -> u8 {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// I/O direction register `IODIR`. A set bit makes the corresponding port an input.
    Direction(Bank),

    /// Port register `GPIO`. Reading it returns the levels present on the pins, which for outputs
    /// reflects the latched output value.
    Input(Bank),

    /// Output latch register `OLAT`. Writing it sets the levels driven on output pins.
    Output(Bank),
}

impl From<Register> for RegisterAddress {
    /// Convert a `Register` into a `RegisterAddress`.
    fn from(reg: Register) -> RegisterAddress {
        use self::Register::*;
        match reg {
            Direction(bank) => RegisterAddress(0x00 + bank.index()),
            Input(bank) => RegisterAddress(0x12 + bank.index()),
            Output(bank) => RegisterAddress(0x14 + bank.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_addresses() {
        assert_eq!(RegisterAddress::from(Register::Direction(Bank::A)), RegisterAddress(0x00));
        assert_eq!(RegisterAddress::from(Register::Direction(Bank::B)), RegisterAddress(0x01));
    }

    #[test]
    fn input_addresses() {
        assert_eq!(RegisterAddress::from(Register::Input(Bank::A)), RegisterAddress(0x12));
        assert_eq!(RegisterAddress::from(Register::Input(Bank::B)), RegisterAddress(0x13));
    }

    #[test]
    fn output_addresses() {
        assert_eq!(RegisterAddress::from(Register::Output(Bank::A)), RegisterAddress(0x14));
        assert_eq!(RegisterAddress::from(Register::Output(Bank::B)), RegisterAddress(0x15));
    }

    #[test]
    fn bank_of_port() {
        assert_eq!(Bank::of(1), Bank::A);
        assert_eq!(Bank::of(8), Bank::A);
        assert_eq!(Bank::of(9), Bank::B);
        assert_eq!(Bank::of(16), Bank::B);
    }

    #[test]
    fn bank_relative_ports() {
        assert_eq!(Bank::A.port(1), 1);
        assert_eq!(Bank::A.port(8), 8);
        assert_eq!(Bank::B.port(1), 9);
        assert_eq!(Bank::B.port(8), 16);
        assert_eq!(Bank::B.ports().collect::<Vec<_>>(), (9..=16).collect::<Vec<_>>());
    }
}
