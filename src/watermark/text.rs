//! Encode/decode watermark text as a bit array.
//!
//! Format: [32-bit big-endian message bit count] + [N bytes UTF-8].
//! Each byte is expanded to 8 bits, MSB first, one `u8` (0 or 1) per bit.

/// Width of the length header in bits.
pub const HEADER_BITS: usize = 32;

/// Framed message ready for embedding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatermarkPayload {
    pub message: String,
    /// Header bits followed by message bits.
    pub bits: Vec<u8>,
    /// Number of message bits (8 per UTF-8 byte), header excluded.
    pub length: usize,
}

impl WatermarkPayload {
    #[inline]
    pub fn total_bits(&self) -> usize {
        self.bits.len()
    }

    /// Message bits without the header.
    #[inline]
    pub fn message_bits(&self) -> &[u8] {
        &self.bits[HEADER_BITS..]
    }
}

/// Message recovered from a subband.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub message: String,
    /// Message bits only; may be shorter than `length` when the plane ran out.
    pub bits: Vec<u8>,
    /// Declared (header) or expected bit count.
    pub length: usize,
}

fn push_byte_bits(bits: &mut Vec<u8>, byte: u8) {
    for i in (0..8).rev() {
        bits.push((byte >> i) & 1);
    }
}

/// Frame `message` as header + UTF-8 bits.
pub fn prepare_watermark(message: &str) -> WatermarkPayload {
    let utf8 = message.as_bytes();
    let length = utf8.len() * 8;

    let mut bits = Vec::with_capacity(HEADER_BITS + length);
    for &byte in &(length as u32).to_be_bytes() {
        push_byte_bits(&mut bits, byte);
    }
    for &byte in utf8 {
        push_byte_bits(&mut bits, byte);
    }

    WatermarkPayload {
        message: message.to_owned(),
        bits,
        length,
    }
}

/// Read the first 32 bits as a big-endian count. Missing bits are zero.
pub fn decode_header(bits: &[u8]) -> usize {
    (0..HEADER_BITS).fold(0usize, |acc, i| {
        let bit = bits.get(i).copied().unwrap_or(0) & 1;
        (acc << 1) | bit as usize
    })
}

/// Group bits into bytes; a trailing partial byte is zero-filled on the right.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit & 1) << (7 - i)))
        })
        .collect()
}

/// Decode message bits back to text.
///
/// Decoding stops at the first zero byte, so a message containing U+0000 is
/// truncated there. Invalid UTF-8 becomes U+FFFD.
pub fn bits_to_text(bits: &[u8]) -> String {
    let bytes = bits_to_bytes(bits);
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Fraction of complete bytes that look like text: printable ASCII
/// (32..=126) or any byte above 127. Zero if there is no complete byte.
pub fn calculate_confidence(bits: &[u8]) -> f64 {
    let complete = bits.len() / 8;
    if complete == 0 {
        return 0.0;
    }
    let plausible = bits_to_bytes(&bits[..complete * 8])
        .into_iter()
        .filter(|&b| (32..=126).contains(&b) || b > 127)
        .count();
    plausible as f64 / complete as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_length() {
        let p = prepare_watermark("Copyright © 2024 MyCompany");
        assert_eq!(p.length, 27 * 8);
        assert_eq!(p.total_bits(), 32 + 216);
        assert_eq!(decode_header(&p.bits), 216);
        // 216 = 0b1101_1000 in the lowest header byte
        assert_eq!(&p.bits[24..32], &[1, 1, 0, 1, 1, 0, 0, 0]);
        assert!(p.bits[..24].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_msb_first() {
        let p = prepare_watermark("A");
        assert_eq!(p.message_bits(), &[0, 1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_roundtrip_utf8() {
        for msg in ["hello", "Copyright © 2024 MyCompany", "水印测试"] {
            let p = prepare_watermark(msg);
            assert_eq!(bits_to_text(p.message_bits()), msg);
        }
    }

    #[test]
    fn test_zero_byte_stops_decoding() {
        let p = prepare_watermark("ab\0cd");
        assert_eq!(bits_to_text(p.message_bits()), "ab");
    }

    #[test]
    fn test_partial_byte_zero_filled() {
        // "A" followed by three stray bits 1,1,0 -> 0b1100_0000
        let mut bits = prepare_watermark("A").message_bits().to_vec();
        bits.extend_from_slice(&[1, 1, 0]);
        assert_eq!(bits_to_bytes(&bits), vec![0x41, 0xC0]);
        assert_eq!(bits_to_text(&bits), "A\u{FFFD}");
    }

    #[test]
    fn test_short_header_reads_zero() {
        assert_eq!(decode_header(&[]), 0);
        assert_eq!(decode_header(&[1]), 1 << 31);
    }

    #[test]
    fn test_confidence() {
        assert_eq!(calculate_confidence(&[]), 0.0);
        assert_eq!(calculate_confidence(&[1, 0, 1]), 0.0);

        let text = prepare_watermark("Hi");
        assert_eq!(calculate_confidence(text.message_bits()), 1.0);

        // One printable byte, one control byte (0x01)
        let mut bits = prepare_watermark("H").message_bits().to_vec();
        bits.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        assert!((calculate_confidence(&bits) - 0.5).abs() < 1e-12);

        // 127 (DEL) is not counted, 128 is
        assert_eq!(calculate_confidence(&[0, 1, 1, 1, 1, 1, 1, 1]), 0.0);
        assert_eq!(calculate_confidence(&[1, 0, 0, 0, 0, 0, 0, 0]), 1.0);
    }
}
