//! Fixed-width integer packing into 64-bit words, spanning layout: an entry
//! whose bits do not fit in the current word continues into the next one.
//! This is the layout Litematica uses for its `BlockStates` long array.

use std::io;

/// Bits needed to index a palette of the given size, floored at 2.
pub fn bits_for_palette(palette_len: usize) -> u32 {
    if palette_len <= 1 {
        return 2;
    }
    let bits = usize::BITS - (palette_len - 1).leading_zeros();
    bits.max(2)
}

/// Packs `values` at `bits_per_entry` bits each. Values wider than
/// `bits_per_entry` are masked down. Output length is
/// `ceil(values.len() * bits_per_entry / 64)` words.
///
/// Callers are responsible for bounding `values.len()` before invoking this;
/// the routine itself allocates exactly the output word count.
pub fn pack(values: &[u32], bits_per_entry: u32) -> Vec<u64> {
    debug_assert!((2..=32).contains(&bits_per_entry));

    let bits = bits_per_entry as usize;
    let mask = (1u64 << bits_per_entry) - 1;
    let word_count = (values.len() * bits + 63) / 64;
    let mut words = vec![0u64; word_count];

    for (i, &value) in values.iter().enumerate() {
        let bit_pos = i * bits;
        let word_idx = bit_pos / 64;
        let bit_off = bit_pos % 64;
        let value = value as u64 & mask;

        words[word_idx] |= value << bit_off;
        if bit_off + bits > 64 {
            words[word_idx + 1] |= value >> (64 - bit_off);
        }
    }

    words
}

/// Inverse of [`pack`]: extracts `total_entries` values of `bits_per_entry`
/// bits each. Fails if `words` holds fewer words than the entries require.
pub fn unpack(words: &[u64], bits_per_entry: u32, total_entries: usize) -> io::Result<Vec<u32>> {
    debug_assert!((2..=32).contains(&bits_per_entry));

    let bits = bits_per_entry as usize;
    let needed = (total_entries * bits + 63) / 64;
    if words.len() < needed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "packed array too short: {} words, need {}",
                words.len(),
                needed
            ),
        ));
    }

    let mask = (1u64 << bits_per_entry) - 1;
    let mut values = Vec::with_capacity(total_entries);

    for i in 0..total_entries {
        let bit_pos = i * bits;
        let word_idx = bit_pos / 64;
        let bit_off = bit_pos % 64;

        let mut value = words[word_idx] >> bit_off;
        if bit_off + bits > 64 {
            value |= words[word_idx + 1] << (64 - bit_off);
        }
        values.push((value & mask) as u32);
    }

    Ok(values)
}
