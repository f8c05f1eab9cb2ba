/// Compute the 8-bit rolling sum of a frame.
///
/// VE.Direct frames are self-verifying: the device picks the trailer
/// byte so that the sum of every byte in the frame, including the
/// trailer itself, is 0 mod 256. No CRC table or length field is
/// involved.
pub fn frame_checksum(frame: &[u8]) -> u8 {
    frame
        .iter()
        .fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// A frame is intact iff its rolling sum is exactly zero.
pub fn is_valid_frame(frame: &[u8]) -> bool {
    frame_checksum(frame) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_sums_to_zero() {
        assert_eq!(frame_checksum(b""), 0);
        assert!(is_valid_frame(b""));
    }

    #[test]
    fn sum_wraps_at_one_byte() {
        assert_eq!(frame_checksum(&[0xFF, 0x01]), 0);
        assert_eq!(frame_checksum(&[0xFF, 0x02]), 1);
        assert_eq!(frame_checksum(&[0x80, 0x80, 0x80]), 0x80);
    }

    #[test]
    fn trailer_byte_balances_frame() {
        let body = b"V\t12800\r\nChecksum\t";
        let sum = frame_checksum(body);
        let trailer = 0u8.wrapping_sub(sum).wrapping_sub(b'\r').wrapping_sub(b'\n');
        let mut frame = body.to_vec();
        frame.push(trailer);
        frame.extend_from_slice(b"\r\n");
        assert!(is_valid_frame(&frame));
    }

    #[test]
    fn single_bit_flip_breaks_sum() {
        let frame = [0x10u8, 0x20, 0xD0];
        assert!(is_valid_frame(&frame));
        let mut corrupted = frame;
        corrupted[1] ^= 0x04;
        assert!(!is_valid_frame(&corrupted));
    }
}
