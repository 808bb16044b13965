use crate::error::{Error, Result};

/// Reads MSB-first bit fields from the compressed bytes of a single frame.
///
/// The reader keeps the partially consumed byte around between calls, so consecutive fields do
/// not need to be byte-aligned. Bytes are never re-read, and reading beyond the end of the buffer
/// is reported as a [`Error::CorruptFrame`] rather than wrapping around or panicking.
#[derive(Debug, Clone)]
pub struct BitReader<'b> {
    buf: &'b [u8],
    /// Points to the next byte to be pulled into `last_byte`.
    count: usize,
    /// The number of bits in `last_byte` that have not been handed out yet.
    last_bits: u32,
    last_byte: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buf: &'b [u8]) -> Self {
        Self {
            buf,
            count: 0,
            last_bits: 0,
            last_byte: 0,
        }
    }

    /// The number of bytes that have been consumed so far.
    pub fn position(&self) -> usize {
        self.count
    }

    /// The number of bytes that have not been touched yet.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.count
    }

    #[inline]
    fn pull(&mut self) -> Result<()> {
        let Some(&byte) = self.buf.get(self.count) else {
            return Err(Error::corrupt(format!(
                "attempted to read beyond the {} compressed bytes of this frame",
                self.buf.len()
            )));
        };
        self.count += 1;
        // Only the low 16 bits are ever relevant: at most 7 leftover bits plus the new byte.
        self.last_byte = ((self.last_byte << 8) | byte as u32) & 0xffff;
        Ok(())
    }

    /// Read an `nbits` wide unsigned field, for `nbits` up to 32.
    ///
    /// Reading zero bits returns zero and consumes nothing.
    #[inline]
    pub fn read_bits(&mut self, mut nbits: u32) -> Result<u32> {
        assert!(nbits <= 32, "cannot read more than 32 bits at once ({nbits})");

        let mut num: u32 = 0;
        while nbits >= 8 {
            self.pull()?;
            num |= ((self.last_byte >> self.last_bits) & 0xff) << (nbits - 8);
            nbits -= 8;
        }

        if nbits > 0 {
            if self.last_bits < nbits {
                self.pull()?;
                self.last_bits += 8;
            }
            self.last_bits -= nbits;
            num |= (self.last_byte >> self.last_bits) & ((1 << nbits) - 1);
        }

        self.last_byte &= 0xff;
        Ok(num)
    }

    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    #[inline]
    pub fn read_flag(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }
}
