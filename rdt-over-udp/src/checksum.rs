//! Internet checksum (RFC 1071).
//!
//! Words are summed in little-endian order and the checksum is stored in the
//! header the same way, so a packet that carries its own correct checksum
//! sums to zero. [`verify`] is the only corruption test the engines apply.

/// Compute the Internet checksum over `data`.
///
/// Sum consecutive 16-bit little-endian words, fold the carry, return the
/// one's-complement. Any checksum field within `data` must be zero when
/// computing a checksum to embed.
pub fn compute(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_le_bytes([word[0], word[1]]));
    }
    // Odd trailing byte is the low half of a final word.
    if let [last] = words.remainder() {
        sum += u32::from(*last);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

/// `true` when `packet` (checksum field included) recomputes to zero.
pub fn verify(packet: &[u8]) -> bool {
    compute(packet) == 0
}
