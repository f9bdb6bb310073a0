// src/checksums.rs
//
// Checksum building blocks for protocol-aware consumers.
// The pipeline itself is byte-chunk oriented and does not validate frames;
// these helpers exist for downstream decoders that do.

use serde::{Deserialize, Serialize};

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// XOR of all bytes
    Xor,
    /// sum(bytes) & 0xFF
    Sum8,
}

/// Calculate a single-byte checksum over `bytes`.
pub fn calculate(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> u8 {
    match algorithm {
        ChecksumAlgorithm::Xor => bytes.iter().fold(0u8, |acc, b| acc ^ b),
        ChecksumAlgorithm::Sum8 => bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)),
    }
}

/// Verify a candidate packet against its trailing Sum8 checksum.
///
/// Layout: 2-byte header, payload, 1 trailing checksum byte. The checksum
/// covers the payload only (header and trailing byte excluded). Packets
/// shorter than 4 bytes cannot carry a payload and always fail.
pub fn verify_packet(packet: &[u8]) -> bool {
    if packet.len() < 4 {
        return false;
    }
    let payload = &packet[2..packet.len() - 1];
    calculate(ChecksumAlgorithm::Sum8, payload) == packet[packet.len() - 1]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum8_wraps() {
        assert_eq!(calculate(ChecksumAlgorithm::Sum8, &[0xFF, 0x02]), 0x01);
        assert_eq!(calculate(ChecksumAlgorithm::Sum8, &[]), 0x00);
    }

    #[test]
    fn test_xor() {
        assert_eq!(calculate(ChecksumAlgorithm::Xor, &[0xF0, 0x0F]), 0xFF);
        assert_eq!(calculate(ChecksumAlgorithm::Xor, &[0xAA, 0xAA]), 0x00);
    }

    #[test]
    fn test_verify_packet_accepts_valid() {
        // header (2) + payload [0x10, 0x20, 0x30] + sum 0x60
        let packet = [0x55, 0xAA, 0x10, 0x20, 0x30, 0x60];
        assert!(verify_packet(&packet));
    }

    #[test]
    fn test_verify_packet_rejects_corrupt() {
        let packet = [0x55, 0xAA, 0x10, 0x21, 0x30, 0x60];
        assert!(!verify_packet(&packet));
    }

    #[test]
    fn test_verify_packet_rejects_short() {
        assert!(!verify_packet(&[]));
        assert!(!verify_packet(&[0x55, 0xAA, 0x60]));
    }

    #[test]
    fn test_verify_packet_minimum_length() {
        // 4 bytes: header + single payload byte + its own sum
        assert!(verify_packet(&[0x55, 0xAA, 0x99, 0x99]));
    }
}
