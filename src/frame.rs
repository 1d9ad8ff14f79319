//! Frame validation and construction.
//!
//! A reply frame looks like `{address, function code, byte count} payload {checksum}`.
//! Write acknowledgements echo the address and function code but carry no byte
//! count, so they are only checked for the echo and the checksum.

use crate::protocol::{
    CHECKSUM_LENGTH, DEVICE_ADDRESS, Error, FUNCTION_READ, FUNCTION_WRITE, HEADER_LENGTH, Result,
};

const ACCUMULATOR_SEED: u8 = 0xFF;
const FEEDBACK_HIGH: u8 = 0xA0;
const FEEDBACK_LOW: u8 = 0x01;

/// Computes the frame checksum over `bytes`.
///
/// Two 8-bit accumulators start at `0xFF`. Each input byte is XOR-ed into the
/// low accumulator and then shifted out LSB first over 8 rounds, the high
/// accumulator carrying its LSB into the low accumulator's MSB. Whenever the
/// bit shifted out is set, the feedback constants are XOR-ed in.
///
/// The returned array is in wire order: low accumulator first.
pub fn checksum(bytes: &[u8]) -> [u8; 2] {
    let mut low = ACCUMULATOR_SEED;
    let mut high = ACCUMULATOR_SEED;
    for byte in bytes {
        low ^= byte;
        for _ in 0..8 {
            let carry = high & 1;
            let shifted_out = low & 1;
            high >>= 1;
            low >>= 1;
            if carry == 1 {
                low |= 0x80;
            }
            if shifted_out == 1 {
                high ^= FEEDBACK_HIGH;
                low ^= FEEDBACK_LOW;
            }
        }
    }
    [low, high]
}

/// Sum of the two checksum bytes, independent of their order.
fn checksum_sum(bytes: [u8; 2]) -> u16 {
    u16::from(bytes[0]) + u16::from(bytes[1])
}

/// Checks the trailing two bytes of `frame` against the checksum of the rest.
///
/// The sums of both byte pairs are compared, so the order of the trailing
/// bytes does not matter.
pub fn checksum_valid(frame: &[u8]) -> bool {
    if frame.len() <= CHECKSUM_LENGTH {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - CHECKSUM_LENGTH);
    let calculated = checksum(body);
    if checksum_sum(calculated) != checksum_sum([trailer[0], trailer[1]]) {
        log::warn!(
            "Invalid checksum - calculated={:02X?} received={:02X?}",
            calculated,
            trailer
        );
        return false;
    }
    true
}

/// Appends the checksum of `frame` to it.
pub fn append_checksum(frame: &mut Vec<u8>) {
    let crc = checksum(frame);
    frame.extend_from_slice(&crc);
}

/// Drops the header and the checksum, returning the payload.
pub fn strip_envelope(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < HEADER_LENGTH + CHECKSUM_LENGTH {
        return Err(Error::FrameTooShort(frame.len()));
    }
    Ok(&frame[HEADER_LENGTH..frame.len() - CHECKSUM_LENGTH])
}

/// Verifies a read reply: it comes from the inverter's address with the read
/// function code, and the byte count matches the payload actually present.
pub fn validate_read_header(frame: &[u8]) -> Result<()> {
    let payload = strip_envelope(frame)?;
    let received = [frame[0], frame[1], frame[2]];
    let expected = [DEVICE_ADDRESS, FUNCTION_READ, payload.len() as u8];
    if received != expected || payload.len() > u8::MAX as usize {
        return Err(Error::HeaderMismatch { expected, received });
    }
    Ok(())
}

/// Verifies that a write acknowledgement carries the inverter's address and the
/// write function code.
pub fn validate_ack(frame: &[u8]) -> Result<()> {
    if frame.len() < HEADER_LENGTH + CHECKSUM_LENGTH {
        return Err(Error::FrameTooShort(frame.len()));
    }
    let received = [frame[0], frame[1], frame[2]];
    if received[..2] != [DEVICE_ADDRESS, FUNCTION_WRITE] {
        return Err(Error::HeaderMismatch {
            expected: [DEVICE_ADDRESS, FUNCTION_WRITE, frame[2]],
            received,
        });
    }
    Ok(())
}

/// Builds a complete write frame: `prefix`, the words big-endian, then the checksum.
pub fn build_write_frame(prefix: &[u8], words: &[u16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(prefix.len() + words.len() * 2 + CHECKSUM_LENGTH);
    frame.extend_from_slice(prefix);
    for word in words {
        frame.extend_from_slice(&word.to_be_bytes());
    }
    append_checksum(&mut frame);
    frame
}
