// Basic Binary Block Format (B3F)
//
// File Format
// [4] magic number encoded as u32 (0xBB33FF00)
// [4] file tag (arbitrary 4 bytes for user)
// [4] version (arbitrary meaning for user, encoded as u32)
// [4] block count (encoded as u32)
// [8] bytes indicating 0 (0x00)
// [8*n] ending offset of block
// [x] pad to 16 byte offset
// [n*len(n)] data, each block begins at a 16 byte offset
//
// All integers are little-endian.
//
// The u64 table starting at byte 16 has n+1 entries. Block i spans table[i] (rounded up to 16
// bytes) to table[i+1], relative to the start of the data section.

use std::convert::TryInto;
use std::fmt;
use std::io::Write;

const MAGIC_NUMBER: u32 = 0xBB33FF00;
const HEADER_SIZE_IN_BYTES: usize = 16;
const BLOCK_LENGTH_SIZE_IN_BYTES: usize = 8;
const BLOCK_ALIGNMENT_IN_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum B3FError {
    TooShort,
    BadMagicNumber,
    BlockIndexOutOfRange(usize),
    BlockOutOfBounds(usize),
}

impl std::error::Error for B3FError {}

impl fmt::Display for B3FError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            B3FError::TooShort => write!(f, "B3F data is shorter than its header"),
            B3FError::BadMagicNumber => write!(f, "B3F magic number not found"),
            B3FError::BlockIndexOutOfRange(i) => write!(f, "B3F block {} does not exist", i),
            B3FError::BlockOutOfBounds(i) => {
                write!(f, "B3F block {} extends past the end of the data", i)
            }
        }
    }
}

fn align_up(value: usize) -> usize {
    ((value + BLOCK_ALIGNMENT_IN_BYTES - 1) / BLOCK_ALIGNMENT_IN_BYTES) * BLOCK_ALIGNMENT_IN_BYTES
}

fn data_section_offset(block_count: usize) -> usize {
    align_up(HEADER_SIZE_IN_BYTES + ((block_count + 1) * BLOCK_LENGTH_SIZE_IN_BYTES))
}

pub struct B3FWriter<'a> {
    file_tag: [u8; 4],
    version: u32,
    blocks: Vec<&'a [u8]>,
}

impl<'a> B3FWriter<'a> {
    pub fn new(
        file_tag: [u8; 4],
        version: u32,
    ) -> Self {
        B3FWriter {
            file_tag,
            version,
            blocks: Vec::default(),
        }
    }

    pub fn add_block(
        &mut self,
        data: &'a [u8],
    ) {
        self.blocks.push(data);
    }

    pub fn write<W: Write>(
        &self,
        mut writer: W,
    ) -> std::io::Result<()> {
        writer.write_all(&MAGIC_NUMBER.to_le_bytes())?;
        writer.write_all(&self.file_tag)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&(self.blocks.len() as u32).to_le_bytes())?;

        // A single u64 zero + N u64 block end positions
        writer.write_all(&0u64.to_le_bytes())?;
        let mut block_begin = 0;
        for block in &self.blocks {
            let block_end = block_begin + block.len();
            writer.write_all(&(block_end as u64).to_le_bytes())?;
            block_begin = align_up(block_end);
        }

        let table_end =
            HEADER_SIZE_IN_BYTES + ((self.blocks.len() + 1) * BLOCK_LENGTH_SIZE_IN_BYTES);
        let padding = data_section_offset(self.blocks.len()) - table_end;
        writer.write_all(&[0u8; BLOCK_ALIGNMENT_IN_BYTES][..padding])?;

        for block in &self.blocks {
            writer.write_all(block)?;
            let padding = align_up(block.len()) - block.len();
            writer.write_all(&[0u8; BLOCK_ALIGNMENT_IN_BYTES][..padding])?;
        }

        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut data = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write(&mut data);
        data
    }
}

pub struct B3FReader<'a> {
    data: &'a [u8],
}

impl<'a> B3FReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<B3FReader<'a>, B3FError> {
        if data.len() < HEADER_SIZE_IN_BYTES + BLOCK_LENGTH_SIZE_IN_BYTES {
            return Err(B3FError::TooShort);
        }

        if read_u32(data, 0) != MAGIC_NUMBER {
            return Err(B3FError::BadMagicNumber);
        }

        let reader = B3FReader { data };
        if data.len() < data_section_offset(reader.block_count()) {
            return Err(B3FError::TooShort);
        }

        Ok(reader)
    }

    pub fn file_tag(&self) -> [u8; 4] {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.data[4..8]);
        tag
    }

    pub fn version(&self) -> u32 {
        read_u32(self.data, 8)
    }

    pub fn block_count(&self) -> usize {
        read_u32(self.data, 12) as usize
    }

    pub fn get_block(
        &self,
        index: usize,
    ) -> Result<&'a [u8], B3FError> {
        if index >= self.block_count() {
            return Err(B3FError::BlockIndexOutOfRange(index));
        }

        let begin_size_offset = HEADER_SIZE_IN_BYTES + (index * BLOCK_LENGTH_SIZE_IN_BYTES);
        let data = &self.data[data_section_offset(self.block_count())..];

        // Offsets come from the payload, so bound them before aligning
        let in_bounds = |offset: u64| usize::try_from(offset).ok().filter(|x| *x <= data.len());
        let begin = in_bounds(read_u64(self.data, begin_size_offset)).map(align_up);
        let end = in_bounds(read_u64(
            self.data,
            begin_size_offset + BLOCK_LENGTH_SIZE_IN_BYTES,
        ));

        match (begin, end) {
            (Some(begin), Some(end)) if begin <= end => Ok(&data[begin..end]),
            _ => Err(B3FError::BlockOutOfBounds(index)),
        }
    }
}

// Callers validate lengths first
fn read_u32(
    data: &[u8],
    offset: usize,
) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

fn read_u64(
    data: &[u8],
    offset: usize,
) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap_or([0; 8]))
}
