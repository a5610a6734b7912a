/// Bytes needed to back a bitmap of `num_bits` bits.
pub const fn num_bytes_for(num_bits: usize) -> usize {
    num_bits.div_ceil(8)
}

/// Fixed-capacity bit vector over a caller-owned byte buffer.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8` (least significant bit
/// first). The buffer must hold at least `num_bytes(num_bits)` bytes.
#[derive(Debug)]
pub struct Bitmap<B> {
    num_bits: usize,
    map: B,
}

impl<B: AsRef<[u8]>> Bitmap<B> {
    pub fn new(num_bits: usize, map: B) -> Self {
        assert!(
            map.as_ref().len() >= num_bytes_for(num_bits),
            "bitmap buffer of {} bytes cannot hold {} bits",
            map.as_ref().len(),
            num_bits
        );
        Self { num_bits, map }
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_bytes(&self) -> usize {
        num_bytes_for(self.num_bits)
    }

    pub fn get(&self, bit_index: usize) -> bool {
        assert!(
            bit_index < self.num_bits,
            "bit index {} out of range {}",
            bit_index,
            self.num_bits
        );
        self.map.as_ref()[bit_index / 8] & (1 << (bit_index % 8)) != 0
    }

    pub fn first_unset(&self) -> Option<usize> {
        let bytes = &self.map.as_ref()[..self.num_bytes()];
        for (byte_i, byte) in bytes.iter().enumerate() {
            if *byte != 0xff {
                let bit = byte_i * 8 + byte.trailing_ones() as usize;
                return (bit < self.num_bits).then_some(bit);
            }
        }
        None
    }

    /// First set bit at or after `from`.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        (from..self.num_bits).find(|i| self.get(*i))
    }

    pub fn count_ones(&self) -> usize {
        (0..self.num_bits).filter(|i| self.get(*i)).count()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Bitmap<B> {
    pub fn set(&mut self, bit_index: usize) {
        assert!(
            bit_index < self.num_bits,
            "bit index {} out of range {}",
            bit_index,
            self.num_bits
        );
        self.map.as_mut()[bit_index / 8] |= 1 << (bit_index % 8);
    }

    pub fn clear(&mut self, bit_index: usize) {
        assert!(
            bit_index < self.num_bits,
            "bit index {} out of range {}",
            bit_index,
            self.num_bits
        );
        self.map.as_mut()[bit_index / 8] &= !(1 << (bit_index % 8));
    }

    pub fn clear_all(&mut self) {
        let num_bytes = self.num_bytes();
        self.map.as_mut()[..num_bytes].fill(0);
    }
}
