//! Bit-level encoding of one bank register.
//!
//! The MCP23017 has no way to change a single bit of a register: every write replaces the whole
//! byte for all 8 ports of a bank. Writing one port therefore means composing a byte out of the
//! new bit for that port and the current state of its 7 siblings. These functions are pure; the
//! caller decides what "current state" means by supplying the sibling lookup.
//!
//! Ports are numbered `1..=16` as on the expander. The functions here panic on any other port
//! number; callers validate ports before encoding.

use crate::io::Level;
use crate::registers::{Bank, BANK_WIDTH};

fn check_port(port: u8) {
    assert!(
        (1..=2 * BANK_WIDTH).contains(&port),
        "port {} is not an MCP23017 port",
        port
    );
}

/// Position of `port` within its bank register, the lowest port of a bank being the LSB.
///
/// # Panics
///
/// If `port` is not in `1..=16`.
pub fn bit_offset(port: u8) -> u8 {
    check_port(port);
    port - Bank::of(port).start()
}

/// Compose the register byte for the bank containing `port`, with `bit` for `port` itself and
/// `sibling(p)` for each other port `p` of the bank.
///
/// # Panics
///
/// If `port` is not in `1..=16`.
pub fn compose<F>(port: u8, bit: bool, sibling: F) -> u8
where
    F: Fn(u8) -> bool,
{
    check_port(port);
    Bank::of(port)
        .ports()
        .enumerate()
        .fold(0u8, |byte, (offset, number)| {
            let set = if number == port { bit } else { sibling(number) };
            if set {
                byte | 1 << offset
            } else {
                byte
            }
        })
}

/// Extract the level of `port` from a byte read out of its bank's register. Returns the raw bit
/// value if it is neither 0 nor 1.
///
/// # Panics
///
/// If `port` is not in `1..=16`.
pub fn decode(port: u8, byte: u8) -> Result<Level, u8> {
    match byte >> bit_offset(port) & 0x01 {
        0 => Ok(Level::Low),
        1 => Ok(Level::High),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compose_port_three_alone() {
        assert_eq!(compose(3, true, |_| false), 0b00000100);
    }

    #[test]
    fn compose_first_port_of_bank_b_is_lsb() {
        assert_eq!(compose(9, true, |_| false), 0b00000001);
        assert_eq!(compose(16, true, |_| false), 0b10000000);
    }

    #[test]
    fn compose_clears_target_among_set_siblings() {
        assert_eq!(compose(5, false, |_| true), 0b11101111);
    }

    #[test]
    fn compose_asks_only_bank_siblings() {
        let asked = std::cell::RefCell::new(Vec::new());
        compose(12, true, |p| {
            asked.borrow_mut().push(p);
            false
        });
        assert_eq!(*asked.borrow(), vec![9, 10, 11, 13, 14, 15, 16]);
    }

    #[test]
    fn decode_bits() {
        assert_eq!(decode(1, 0b00000001), Ok(Level::High));
        assert_eq!(decode(2, 0b00000001), Ok(Level::Low));
        assert_eq!(decode(8, 0b10000000), Ok(Level::High));
        assert_eq!(decode(9, 0b00000001), Ok(Level::High));
        assert_eq!(decode(16, 0b01111111), Ok(Level::Low));
    }

    #[test]
    #[should_panic(expected = "not an MCP23017 port")]
    fn decode_rejects_port_zero() {
        let _ = decode(0, 0xff);
    }

    #[test]
    #[should_panic(expected = "not an MCP23017 port")]
    fn decode_rejects_port_past_bank_b() {
        let _ = decode(17, 0xff);
    }

    #[test]
    #[should_panic(expected = "not an MCP23017 port")]
    fn compose_rejects_port_past_bank_b() {
        compose(17, true, |_| false);
    }

    proptest! {
        #[test]
        fn compose_only_changes_target_bit(port in 1u8..=16, bit: bool, siblings: u8) {
            let offset = bit_offset(port);
            let start = Bank::of(port).start();
            let byte = compose(port, bit, |p| siblings >> (p - start) & 1 == 1);
            prop_assert_eq!(byte & !(1 << offset), siblings & !(1 << offset));
            prop_assert_eq!(decode(port, byte), Ok(Level::from(bit)));
        }

        #[test]
        fn decode_never_fails(port in 1u8..=16, byte: u8) {
            prop_assert!(decode(port, byte).is_ok());
        }
    }
}
