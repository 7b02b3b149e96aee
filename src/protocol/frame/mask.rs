use rand::Rng;

/// Generate a random frame mask.
#[inline]
pub fn generate_mask<R: Rng>(rng: &mut R) -> [u8; 4] {
    rng.random()
}

/// Mask/unmask a frame.
///
/// Byte `i` of the payload is XOR-ed with `mask[i % 4]`, so applying the same
/// mask twice restores the original data.
#[inline]
pub fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    apply_mask_fast32(buf, mask)
}

/// A safe unoptimized mask application.
#[inline]
fn apply_mask_fallback(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Faster version of `apply_mask()` which operates on 4-byte blocks.
#[inline]
fn apply_mask_fast32(buf: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);

    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    // Every full block consumed exactly four key bytes, so the tail restarts at mask[0].
    apply_mask_fallback(chunks.into_remainder(), mask);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_apply_mask() {
        let mask = [0x6d, 0xb6, 0xb2, 0x80];
        let unmasked = [
            0xf3, 0x00, 0x01, 0x02, 0x03, 0x80, 0x81, 0x82, 0xff, 0xfe, 0x00, 0x17, 0x74, 0xf9,
            0x12, 0x03,
        ];

        for data_len in 0..=unmasked.len() {
            let unmasked = &unmasked[0..data_len];

            let mut masked = unmasked.to_vec();
            apply_mask_fallback(&mut masked, mask);

            let mut masked_fast = unmasked.to_vec();
            apply_mask_fast32(&mut masked_fast, mask);

            assert_eq!(masked, masked_fast);
        }
    }

    #[test]
    fn known_vector() {
        // "Hello" masked with 37 fa 21 3d, RFC 6455 section 5.7
        let mut data = *b"Hello";
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn masking_is_involutive() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0, 1, 3, 4, 5, 17, 300] {
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let key = generate_mask(&mut rng);
            let mut data = payload.clone();
            apply_mask(&mut data, key);
            apply_mask(&mut data, key);
            assert_eq!(data, payload);
        }
    }

    #[test]
    fn zero_mask_is_noop() {
        let mut data = b"unchanged".to_vec();
        apply_mask(&mut data, [0; 4]);
        assert_eq!(data, b"unchanged");
    }

    #[test]
    fn fresh_masks_differ() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = generate_mask(&mut rng);
        let b = generate_mask(&mut rng);
        assert_ne!(a, b);
    }
}
