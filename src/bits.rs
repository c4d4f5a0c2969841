//! Bit packing of codes and their framing into sub-blocks.
use crate::{Code, MAX_BLOCK_LEN};

/// Accumulates variable width codes, least significant bit first.
pub(crate) struct LsbBuffer {
    /// The current code length.
    code_size: u8,
    /// The buffer bits.
    buffer: u64,
    /// The number of valid buffer bits.
    bits_in_buffer: u8,
}

/// Frames a byte stream into sub-blocks of at most 255 bytes.
///
/// Each block is prefixed with its length. The length byte of the open block is written as a
/// placeholder and patched once the block is closed.
pub(crate) struct SubBlocks {
    out: Vec<u8>,
    /// Offset of the length byte of the open block.
    open: usize,
    /// Number of data bytes in the open block, zero if no block is open.
    len: usize,
}

impl LsbBuffer {
    pub(crate) fn new(min_size: u8) -> Self {
        LsbBuffer {
            code_size: min_size + 1,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Reset the code size, keeping all bits that were already buffered.
    pub(crate) fn reset(&mut self, min_size: u8) {
        self.code_size = min_size + 1;
    }

    /// Insert a code with the current code size.
    pub(crate) fn buffer_code(&mut self, code: Code) {
        debug_assert!(u32::from(code) < 1 << self.code_size);
        self.buffer |= u64::from(code) << self.bits_in_buffer;
        self.bits_in_buffer += self.code_size;
    }

    /// Move full bytes out if the buffer might not fit two more codes.
    pub(crate) fn push_out(&mut self, out: &mut SubBlocks) {
        if self.bits_in_buffer + 2 * self.code_size < 64 {
            return;
        }

        self.flush_out(out)
    }

    /// Move all full bytes out.
    pub(crate) fn flush_out(&mut self, out: &mut SubBlocks) {
        while self.bits_in_buffer >= 8 {
            out.push((self.buffer & 0xff) as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    /// Pad the buffer with zero bits to a full byte.
    pub(crate) fn buffer_pad(&mut self) {
        let to_byte = self.bits_in_buffer.wrapping_neg() & 0x7;
        self.bits_in_buffer += to_byte;
    }

    pub(crate) fn bump_code_size(&mut self) {
        self.code_size += 1;
    }

    /// Return the maximum code with the current code size.
    pub(crate) fn max_code(&self) -> Code {
        (1 << self.code_size) - 1
    }

    pub(crate) fn code_size(&self) -> u8 {
        self.code_size
    }
}

impl SubBlocks {
    pub(crate) fn new() -> Self {
        SubBlocks {
            out: Vec::with_capacity(1 + MAX_BLOCK_LEN),
            open: 0,
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, byte: u8) {
        if self.len == 0 {
            self.open = self.out.len();
            self.out.push(0);
        }

        self.out.push(byte);
        self.len += 1;

        if self.len == MAX_BLOCK_LEN {
            self.out[self.open] = MAX_BLOCK_LEN as u8;
            self.len = 0;
        }
    }

    /// Close the open block, if any, and append the block terminator.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.len > 0 {
            self.out[self.open] = self.len as u8;
        }
        self.out.push(0);
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::{LsbBuffer, SubBlocks};

    fn framed(data: &[u8]) -> Vec<u8> {
        let mut blocks = SubBlocks::new();
        data.iter().for_each(|&b| blocks.push(b));
        blocks.finish()
    }

    /// Check the framing and return the concatenated payload.
    fn unframe(mut stream: &[u8]) -> Vec<u8> {
        let mut data = vec![];
        loop {
            let (&len, rest) = stream.split_first().expect("missing terminator");
            if len == 0 {
                assert!(rest.is_empty(), "bytes after the terminator");
                return data;
            }
            let (block, rest) = rest.split_at(usize::from(len));
            data.extend_from_slice(block);
            stream = rest;
        }
    }

    #[test]
    fn empty_stream_is_only_terminator() {
        assert_eq!(framed(&[]), [0]);
    }

    #[test]
    fn block_boundaries() {
        for &count in &[1usize, 254, 255, 256, 510, 511, 1000] {
            let data: Vec<u8> = (0..count).map(|i| i as u8).collect();
            let stream = framed(&data);
            let full = count / 255;
            let partial = usize::from(count % 255 != 0);
            assert_eq!(stream.len(), count + full + partial + 1, "{}", count);
            assert_eq!(unframe(&stream), data);
        }
    }

    #[test]
    fn exact_block_has_no_empty_tail() {
        let stream = framed(&[7; 255]);
        assert_eq!(stream[0], 255);
        assert_eq!(stream.len(), 257);
        assert_eq!(stream[256], 0);
    }

    #[test]
    fn codes_straddle_bytes() {
        let mut buffer = LsbBuffer::new(8);
        let mut out = SubBlocks::new();
        // 9 bit codes: 0x100, 0x028, 0x1ff
        buffer.buffer_code(0x100);
        buffer.buffer_code(0x028);
        buffer.buffer_code(0x1ff);
        buffer.buffer_pad();
        buffer.flush_out(&mut out);
        // bits, lsb first: 0x100 | 0x028 << 9 | 0x1ff << 18 = 0x7fc_5100
        assert_eq!(out.finish(), [4, 0x00, 0x51, 0xfc, 0x07, 0]);
    }

    #[test]
    fn pad_is_noop_on_byte_boundary() {
        let mut buffer = LsbBuffer::new(7);
        let mut out = SubBlocks::new();
        buffer.buffer_code(0xab);
        buffer.buffer_pad();
        buffer.flush_out(&mut out);
        assert_eq!(out.finish(), [1, 0xab, 0]);
    }

    #[test]
    fn code_size_follows_bumps_and_resets() {
        let mut buffer = LsbBuffer::new(2);
        assert_eq!(buffer.code_size(), 3);
        assert_eq!(buffer.max_code(), 7);
        buffer.bump_code_size();
        assert_eq!(buffer.max_code(), 15);
        buffer.reset(2);
        assert_eq!(buffer.code_size(), 3);
    }

    #[test]
    fn push_out_keeps_room_for_wide_codes() {
        let mut buffer = LsbBuffer::new(8);
        let mut out = SubBlocks::new();
        for code in 0..1000u16 {
            buffer.push_out(&mut out);
            buffer.buffer_code(code & 0x1ff);
        }
        buffer.buffer_pad();
        buffer.flush_out(&mut out);
        let data = unframe(&out.finish());
        assert_eq!(data.len(), (1000 * 9 + 7) / 8);
    }
}
