//! XOR payload masking (RFC 6455 Section 5.3).
//!
//! Masking has to survive partial reads: the payload of one frame may arrive
//! across several buffered reads, so the XOR position within the 4-byte key is
//! carried between calls as an offset.

/// XOR `data` with `mask` starting at `offset` within the key.
///
/// Returns the updated offset, to be passed to the next call when unmasking
/// the remainder of the same frame. Masking is an involution, so the same
/// function both masks and unmasks.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4], offset: usize) -> usize {
    debug_assert!(offset < 4);
    if data.is_empty() {
        return offset;
    }

    // Rotate the key so the word loop can start at any offset.
    let rotated = [
        mask[offset % 4],
        mask[(offset + 1) % 4],
        mask[(offset + 2) % 4],
        mask[(offset + 3) % 4],
    ];
    let mask_u32 = u32::from_ne_bytes(rotated);

    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= rotated[i];
    }

    (offset + data.len()) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_mask_naive(data: &mut [u8], mask: [u8; 4], offset: usize) -> usize {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= mask[(offset + i) % 4];
        }
        (offset + data.len()) % 4
    }

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask, 0);
        assert_ne!(data, original);

        apply_mask(&mut data, mask, 0);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask, 0);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_empty() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let mut data: Vec<u8> = vec![];
        assert_eq!(apply_mask(&mut data, mask, 3), 3);
        assert_eq!(data, Vec::<u8>::new());
    }

    #[test]
    fn test_masking_returns_offset() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let mut data = vec![0u8; 7];
        assert_eq!(apply_mask(&mut data, mask, 0), 3);
        assert_eq!(apply_mask(&mut data, mask, 3), 2);
    }

    #[test]
    fn test_masking_split_equals_whole() {
        let mask = [0xab, 0xcd, 0xef, 0x12];
        let original: Vec<u8> = (0..97u8).collect();

        let mut whole = original.clone();
        apply_mask(&mut whole, mask, 0);

        // Unmask the same payload in uneven pieces, carrying the offset.
        let mut pieces = original.clone();
        let mut offset = 0;
        let mut start = 0;
        for len in [1usize, 3, 4, 10, 25, 54] {
            offset = apply_mask(&mut pieces[start..start + len], mask, offset);
            start += len;
        }
        assert_eq!(pieces, whole);
    }

    #[test]
    fn test_masking_matches_naive() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        for size in [0usize, 1, 2, 3, 4, 5, 7, 8, 15, 16, 17, 63, 64, 65, 1000] {
            for offset in 0..4 {
                let original: Vec<u8> = (0..size).map(|i| (i & 0xff) as u8).collect();
                let mut fast = original.clone();
                let mut naive = original.clone();
                let off_fast = apply_mask(&mut fast, mask, offset);
                let off_naive = apply_mask_naive(&mut naive, mask, offset);
                assert_eq!(fast, naive, "mismatch at size {size} offset {offset}");
                assert_eq!(off_fast, off_naive);
            }
        }
    }
}
