//! CRC-16 frame protection for Layer I/II
//!
//! A protected frame carries a 16-bit checksum right after the header. It
//! covers the last 16 bits of the header, the bit allocation and, for Layer
//! II, the scale factor selection information.

/// Generator polynomial x^16 + x^15 + x^2 + 1
const POLYNOMIAL: u16 = 0x8005;

/// Bit-serial CRC-16 accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self { crc: 0xFFFF }
    }

    /// Start a frame checksum with the protected half of the header word
    pub fn for_header(header: u32) -> Self {
        let mut crc = Self::new();
        crc.add_bits(header & 0xFFFF, 16);
        crc
    }

    /// Feed the low `length` bits of `bits`, most significant first
    pub fn add_bits(&mut self, bits: u32, length: u32) {
        if length == 0 {
            return;
        }
        let mut mask = 1u32 << (length - 1);
        while mask != 0 {
            let carry = self.crc & 0x8000 != 0;
            let bit = bits & mask != 0;
            self.crc <<= 1;
            if carry != bit {
                self.crc ^= POLYNOMIAL;
            }
            mask >>= 1;
        }
    }

    /// Current checksum value
    pub fn value(&self) -> u16 {
        self.crc
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_checksum_is_initial_value() {
        assert_eq!(Crc16::new().value(), 0xFFFF);
    }

    #[test]
    fn test_bitwise_feed_matches_bytewise_feed() {
        let data = [0x12u8, 0x34, 0xAB, 0xCD];

        let mut bytewise = Crc16::new();
        for &b in &data {
            bytewise.add_bits(b as u32, 8);
        }

        let mut bitwise = Crc16::new();
        for &b in &data {
            for i in (0..8).rev() {
                bitwise.add_bits(((b >> i) & 1) as u32, 1);
            }
        }

        assert_eq!(bytewise.value(), bitwise.value());
    }

    #[test]
    fn test_known_vector() {
        // CRC-16/CMS: poly 0x8005, init 0xFFFF, no reflection, no final xor
        let mut crc = Crc16::new();
        for &b in b"123456789" {
            crc.add_bits(b as u32, 8);
        }
        assert_eq!(crc.value(), 0xAEE7);
    }

    #[test]
    fn test_header_seed_uses_low_half() {
        let a = Crc16::for_header(0xFFFD_9004);
        let b = Crc16::for_header(0x0000_9004);
        assert_eq!(a, b);
    }
}
