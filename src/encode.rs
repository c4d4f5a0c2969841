//! A module for all LZW compression needs.
//!
//! The compressor consumes color indices and produces the sub-block framed code stream of a
//! GIF image data block, without the leading minimum code size byte.
use log::{debug, trace};

use crate::bits::{LsbBuffer, SubBlocks};
use crate::error::EncodingError;
use crate::{Code, MAX_CODESIZE, MAX_ENTRIES};

/// The smallest minimum code size GIF permits.
pub const MIN_CODE_SIZE: u8 = 2;
/// The largest minimum code size, enough for 256 color indices.
pub const MAX_MIN_CODE_SIZE: u8 = 8;

/// Compress `indices` into a GIF LZW code stream.
///
/// The result is framed into sub-blocks and closed by the block terminator. All indices must be
/// smaller than `1 << min_code_size`.
///
/// ```
/// let blocks = gifcast::encode::compress(2, &[0, 1, 2, 3]).unwrap();
/// assert_eq!(blocks.last(), Some(&0));
/// ```
pub fn compress(min_code_size: u8, indices: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let mut compressor = Compressor::new(min_code_size)?;
    compressor.push(indices)?;
    compressor.finish()
}

/// An incremental LZW compressor for one image.
///
/// Indices may be supplied over several calls to [`push`], the output only depends on their
/// concatenation. Call [`finish`] to obtain the code stream.
///
/// [`push`]: #method.push
/// [`finish`]: #method.finish
pub struct Compressor {
    /// The configured minimal code size.
    min_size: u8,
    /// The clear code for resetting the dictionary.
    clear_code: Code,
    /// The current encoding symbol tree.
    table: CodeTable,
    /// The code corresponding to the indices read but not yet written.
    current: Option<Code>,
    /// The bit buffer for encoding.
    buffer: LsbBuffer,
    /// The framed output.
    blocks: SubBlocks,
    codes_written: usize,
    resets: usize,
}

/// The dictionary from (prefix code, next index) to code.
///
/// Codes with few successors keep them in a short list searched linearly, only codes with many
/// successors get a full table indexed by the next index.
struct CodeTable {
    min_size: u8,
    /// One node per assigned code, including the clear and end codes.
    nodes: Vec<Node>,
    sparse: Vec<Sparse>,
    dense: Vec<Dense>,
}

#[derive(Clone, Copy)]
enum Node {
    Leaf,
    Sparse(u16),
    Dense(u16),
}

const SPARSE: usize = 8;

/// Marks an empty slot of a dense node. Never a valid code.
const NO_CODE: Code = Code::MAX;

#[derive(Clone, Copy)]
struct Sparse {
    codes: [Code; SPARSE],
    indices: [u8; SPARSE],
    count: u8,
}

#[derive(Clone, Copy)]
struct Dense {
    next: [Code; 256],
}

impl Compressor {
    /// Start a code stream for indices of `min_code_size` bits.
    ///
    /// Fails with [`EncodingError::InvalidCodeSize`] unless `2 <= min_code_size <= 8`.
    pub fn new(min_code_size: u8) -> Result<Self, EncodingError> {
        if min_code_size < MIN_CODE_SIZE || min_code_size > MAX_MIN_CODE_SIZE {
            return Err(EncodingError::InvalidCodeSize(min_code_size));
        }

        let clear_code = 1 << min_code_size;
        let mut compressor = Compressor {
            min_size: min_code_size,
            clear_code,
            table: CodeTable::new(min_code_size),
            current: None,
            buffer: LsbBuffer::new(min_code_size),
            blocks: SubBlocks::new(),
            codes_written: 0,
            resets: 0,
        };
        compressor.write_code(clear_code);
        Ok(compressor)
    }

    /// The configured minimum code size.
    pub fn min_code_size(&self) -> u8 {
        self.min_size
    }

    /// Compress some more indices.
    ///
    /// The whole slice is validated before any of it is consumed, so a rejected call leaves the
    /// compressor as it was.
    pub fn push(&mut self, indices: &[u8]) -> Result<(), EncodingError> {
        if let Some(&index) = indices.iter().find(|&&idx| Code::from(idx) >= self.clear_code) {
            return Err(EncodingError::InvalidIndex {
                index,
                min_code_size: self.min_size,
            });
        }

        for &index in indices {
            let prefix = match self.current {
                Some(prefix) => prefix,
                None => {
                    self.current = Some(Code::from(index));
                    continue;
                }
            };

            if let Some(code) = self.table.find(prefix, index) {
                self.current = Some(code);
                continue;
            }

            self.write_code(prefix);
            let added = self.table.insert(prefix, index)?;

            if added > self.buffer.max_code() && self.buffer.code_size() < MAX_CODESIZE {
                self.buffer.bump_code_size();
            }

            if usize::from(self.table.next_code()) >= MAX_ENTRIES {
                trace!("code table full after {} codes, clearing", self.codes_written);
                self.write_code(self.clear_code);
                self.table.reset();
                self.buffer.reset(self.min_size);
                self.resets += 1;
            }

            self.current = Some(Code::from(index));
        }

        Ok(())
    }

    /// Write the pending prefix and the end code, returning the framed code stream.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodingError> {
        if let Some(code) = self.current.take() {
            self.write_code(code);

            // When reading this code, the decoder will add an extra entry to its table before
            // reading the end code. It may increase its code size based on this entry.
            if self.table.next_code() > self.buffer.max_code()
                && self.buffer.code_size() < MAX_CODESIZE
            {
                self.buffer.bump_code_size();
            }
        }

        let end_code = self.clear_code + 1;
        self.write_code(end_code);
        self.buffer.buffer_pad();
        self.buffer.flush_out(&mut self.blocks);

        let out = self.blocks.finish();
        debug!(
            "compressed {} codes with {} resets into {} bytes",
            self.codes_written,
            self.resets,
            out.len()
        );
        Ok(out)
    }

    fn write_code(&mut self, code: Code) {
        self.buffer.push_out(&mut self.blocks);
        self.buffer.buffer_code(code);
        self.codes_written += 1;
    }
}

impl CodeTable {
    fn new(min_size: u8) -> Self {
        let mut table = CodeTable {
            min_size,
            nodes: Vec::with_capacity(MAX_ENTRIES),
            sparse: Vec::new(),
            dense: Vec::new(),
        };
        table.reset();
        table
    }

    /// Forget all multi-index sequences, keeping the literals and the control codes.
    fn reset(&mut self) {
        self.sparse.clear();
        self.dense.clear();
        self.nodes.clear();
        self.nodes.resize((1 << self.min_size) + 2, Node::Leaf);
    }

    /// The code the next inserted sequence receives.
    fn next_code(&self) -> Code {
        self.nodes.len() as Code
    }

    fn find(&self, prefix: Code, index: u8) -> Option<Code> {
        match self.nodes[usize::from(prefix)] {
            Node::Leaf => None,
            Node::Sparse(at) => {
                let sparse = &self.sparse[usize::from(at)];
                let count = usize::from(sparse.count);
                sparse.indices[..count]
                    .iter()
                    .position(|&idx| idx == index)
                    .map(|pos| sparse.codes[pos])
            }
            Node::Dense(at) => match self.dense[usize::from(at)].next[usize::from(index)] {
                NO_CODE => None,
                code => Some(code),
            },
        }
    }

    /// Assign the next code to the sequence `prefix` followed by `index`.
    fn insert(&mut self, prefix: Code, index: u8) -> Result<Code, EncodingError> {
        if self.nodes.len() >= MAX_ENTRIES {
            return Err(EncodingError::TableOverflow);
        }

        let code = self.next_code();
        let slot = usize::from(prefix);
        match self.nodes[slot] {
            Node::Leaf => {
                let mut sparse = Sparse::default();
                sparse.codes[0] = code;
                sparse.indices[0] = index;
                sparse.count = 1;
                self.nodes[slot] = Node::Sparse(self.sparse.len() as u16);
                self.sparse.push(sparse);
            }
            Node::Sparse(at) if usize::from(self.sparse[usize::from(at)].count) < SPARSE => {
                let sparse = &mut self.sparse[usize::from(at)];
                let count = usize::from(sparse.count);
                sparse.codes[count] = code;
                sparse.indices[count] = index;
                sparse.count += 1;
            }
            Node::Sparse(at) => {
                let sparse = &self.sparse[usize::from(at)];
                let mut dense = Dense {
                    next: [NO_CODE; 256],
                };
                for (&idx, &next) in sparse.indices.iter().zip(sparse.codes.iter()) {
                    dense.next[usize::from(idx)] = next;
                }
                dense.next[usize::from(index)] = code;
                self.nodes[slot] = Node::Dense(self.dense.len() as u16);
                self.dense.push(dense);
            }
            Node::Dense(at) => {
                self.dense[usize::from(at)].next[usize::from(index)] = code;
            }
        }

        self.nodes.push(Node::Leaf);
        Ok(code)
    }
}

impl Default for Sparse {
    fn default() -> Self {
        Sparse {
            codes: [0; SPARSE],
            indices: [0; SPARSE],
            count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compress, CodeTable, Compressor, EncodingError};
    use crate::MAX_ENTRIES;

    #[test]
    fn known_stream() {
        let input = [
            40, 255, 255, 255, 40, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255,
        ];
        let expected = [11, 0, 81, 252, 27, 40, 112, 160, 193, 131, 1, 1, 0];
        assert_eq!(compress(8, &input).unwrap(), expected);
    }

    #[test]
    fn empty_input_is_clear_and_end() {
        // 3 bit codes: clear = 4, end = 5.
        assert_eq!(compress(2, &[]).unwrap(), [1, 0b101_100, 0]);
    }

    #[test]
    fn single_index() {
        // clear = 4, 1, end = 5 in 3 bits each.
        assert_eq!(compress(2, &[1]).unwrap(), [2, 0b01_001_100, 0b1, 0]);
    }

    #[test]
    fn invalid_input_rejected() {
        const BIT_LEN: u8 = 2;
        let input = [0, 1 << BIT_LEN /* invalid */, 0];
        match compress(BIT_LEN, &input) {
            Err(EncodingError::InvalidIndex {
                index: 4,
                min_code_size: BIT_LEN,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_code_size_rejected() {
        for &size in &[0u8, 1, 9, 12] {
            assert!(matches!(
                Compressor::new(size),
                Err(EncodingError::InvalidCodeSize(s)) if s == size
            ));
        }
    }

    #[test]
    fn rejected_push_leaves_state_untouched() {
        let mut split = Compressor::new(3).unwrap();
        split.push(&[1, 2, 3]).unwrap();
        assert!(split.push(&[4, 9]).is_err());
        split.push(&[4, 5]).unwrap();
        assert_eq!(split.finish().unwrap(), compress(3, &[1, 2, 3, 4, 5]).unwrap());
    }

    #[test]
    fn split_input_matches_whole() {
        let data: Vec<u8> = (0..5000u32).map(|i| ((i * 7) % 13 + i / 300) as u8 & 0xf).collect();
        let whole = compress(4, &data).unwrap();
        let mut split = Compressor::new(4).unwrap();
        for chunk in data.chunks(97) {
            split.push(chunk).unwrap();
        }
        assert_eq!(split.finish().unwrap(), whole);
    }

    #[test]
    fn table_grows_sparse_then_dense() {
        let mut table = CodeTable::new(8);
        assert_eq!(table.next_code(), 258);
        for idx in 0..=255u8 {
            let code = table.insert(7, idx).unwrap();
            assert_eq!(code, 258 + u16::from(idx));
        }
        for idx in 0..=255u8 {
            assert_eq!(table.find(7, idx), Some(258 + u16::from(idx)));
        }
        assert_eq!(table.find(8, 0), None);
        table.reset();
        assert_eq!(table.find(7, 0), None);
        assert_eq!(table.next_code(), 258);
    }

    #[test]
    fn table_refuses_to_overflow() {
        let mut table = CodeTable::new(2);
        let mut prefix = 0;
        while usize::from(table.next_code()) < MAX_ENTRIES {
            prefix = table.insert(prefix, 1).unwrap();
        }
        assert!(matches!(table.insert(prefix, 1), Err(EncodingError::TableOverflow)));
    }
}
