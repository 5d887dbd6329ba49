use std::io::{self, BufWriter, Read, Write};

use thiserror::Error;

use crate::common::io::read_full;

/// Powers of 85 for the five digit positions, most significant first.
/// Shared by the digit transform and the partial-group padding addend.
const POW85: [u32; 5] = [85 * 85 * 85 * 85, 85 * 85 * 85, 85 * 85, 85, 1];

/// Start and end delimiters of a marked stream.
const START_MARKER: &[u8; 2] = b"<~";
const END_MARKER: &[u8; 2] = b"~>";

/// Read chunk for the streaming entry points: 4MB, sized to the enlarged
/// pipe buffers the bins request.
const STREAM_CHUNK: usize = 4 * 1024 * 1024;

/// Errors produced while decoding an ASCII85 stream.
/// Every variant is fatal for the stream being decoded — bytes already
/// written to the sink stay written, but decoding never resumes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Markers are required and the stream does not begin with `<~`.
    #[error("input does not start with the <~ marker")]
    MalformedStartMarker,

    /// A byte outside the alphabet appeared in the data region.
    #[error("invalid character {0:#o} at input offset {1}")]
    InvalidCharacter(u8, u64),

    /// `z` is only legal on a group boundary.
    #[error("'z' inside a group at input offset {0}")]
    UnexpectedZInGroup(u64),

    /// `~` was not followed by `>`.
    #[error("incomplete ~> marker at input offset {0}")]
    IncompleteEndMarker(u64),

    /// End of input with markers required and no `~>` seen.
    #[error("end of input before the ~> marker")]
    UnterminatedStream,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convert a 4-byte group to its five ASCII digits, most significant
/// first, by repeated divmod 85.
#[inline]
fn block_digits(mut block: u32) -> [u8; 5] {
    let mut digits = [0u8; 5];
    for slot in digits.iter_mut().rev() {
        *slot = (block % 85) as u8 + b'!';
        block /= 85;
    }
    digits
}

/// Check if a byte is ASCII whitespace.
#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Incremental encoder state: one partially filled 4-byte group.
/// Feed any number of chunks through `update`, then `finish` once.
struct Encoder {
    block: u32,
    fill: usize,
}

impl Encoder {
    fn new() -> Self {
        Encoder { block: 0, fill: 0 }
    }

    /// Accumulate input bytes, appending one `z` or five digits to `out`
    /// per completed group.
    fn update(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &byte in data {
            // Big-endian: the first byte of a group lands in bits 31-24.
            self.block |= (byte as u32) << (24 - 8 * self.fill);
            self.fill += 1;
            if self.fill == 4 {
                if self.block == 0 {
                    out.push(b'z');
                } else {
                    out.extend_from_slice(&block_digits(self.block));
                }
                self.block = 0;
                self.fill = 0;
            }
        }
    }

    /// Flush a trailing group of 1-3 bytes as `fill + 1` digits.
    /// The unused low bytes of the accumulator are zero, so the dropped
    /// low-order digits are the only ones the padding touches. A partial
    /// group is never collapsed to `z` — `z` means a full zero group.
    fn finish(&mut self, out: &mut Vec<u8>) {
        if self.fill > 0 {
            let digits = block_digits(self.block);
            out.extend_from_slice(&digits[..self.fill + 1]);
            self.block = 0;
            self.fill = 0;
        }
    }
}

enum DecodeState {
    /// Markers required, `<` not yet seen.
    StartAngle,
    /// `<` consumed, awaiting `~`.
    StartTilde,
    /// Inside the data region.
    Data,
    /// `~` seen in the data region, awaiting `>`.
    EndTilde,
    /// `~>` consumed; any further input is ignored.
    Done,
}

/// Incremental decoder state: one partially filled digit group plus the
/// marker-scanning state, resumable at any byte boundary.
struct Decoder {
    state: DecodeState,
    block: u32,
    fill: usize,
    markers: bool,
    /// Bytes consumed so far, for diagnostics.
    pos: u64,
}

impl Decoder {
    fn new(markers: bool) -> Self {
        Decoder {
            state: if markers {
                DecodeState::StartAngle
            } else {
                DecodeState::Data
            },
            block: 0,
            fill: 0,
            markers,
            pos: 0,
        }
    }

    /// Consume one chunk, appending decoded bytes to `out`.
    /// Returns true once a `~>` marker has terminated the stream; the
    /// remainder of the chunk is left unexamined.
    fn update(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<bool, DecodeError> {
        for &byte in data {
            self.pos += 1;
            match self.state {
                DecodeState::StartAngle => {
                    if byte != b'<' {
                        return Err(DecodeError::MalformedStartMarker);
                    }
                    self.state = DecodeState::StartTilde;
                }
                DecodeState::StartTilde => {
                    if byte != b'~' {
                        return Err(DecodeError::MalformedStartMarker);
                    }
                    self.state = DecodeState::Data;
                }
                DecodeState::EndTilde => {
                    if byte != b'>' {
                        return Err(DecodeError::IncompleteEndMarker(self.pos));
                    }
                    self.flush_partial(out);
                    self.state = DecodeState::Done;
                    return Ok(true);
                }
                DecodeState::Done => return Ok(true),
                DecodeState::Data => match byte {
                    b if is_whitespace(b) => {}
                    b'z' => {
                        if self.fill != 0 {
                            return Err(DecodeError::UnexpectedZInGroup(self.pos));
                        }
                        out.extend_from_slice(&[0, 0, 0, 0]);
                    }
                    // Without markers, `~` falls through to the alphabet
                    // check below and is rejected (126 > 'u').
                    b'~' if self.markers => self.state = DecodeState::EndTilde,
                    b'!'..=b'u' => {
                        // Wrapping: five max digits exceed 32 bits. No
                        // conformant encoder emits such a group, and the
                        // wrap keeps the low 32 bits the flush would use.
                        self.block = self
                            .block
                            .wrapping_add(((byte - b'!') as u32).wrapping_mul(POW85[self.fill]));
                        self.fill += 1;
                        if self.fill == 5 {
                            out.extend_from_slice(&self.block.to_be_bytes());
                            self.block = 0;
                            self.fill = 0;
                        }
                    }
                    _ => return Err(DecodeError::InvalidCharacter(byte, self.pos)),
                },
            }
        }
        Ok(false)
    }

    /// Handle end of input. Without markers this is the normal stream
    /// terminator; with markers it is only legal before any data or
    /// after `~>`.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        match self.state {
            // Empty input: no data in, no data out.
            DecodeState::StartAngle => Ok(()),
            DecodeState::StartTilde => Err(DecodeError::MalformedStartMarker),
            DecodeState::EndTilde => Err(DecodeError::IncompleteEndMarker(self.pos)),
            DecodeState::Done => Ok(()),
            DecodeState::Data => {
                if self.markers {
                    return Err(DecodeError::UnterminatedStream);
                }
                self.flush_partial(out);
                Ok(())
            }
        }
    }

    /// Emit the `fill - 1` bytes of a trailing group of 2-5 digits.
    /// Adding POW85[fill - 1] pads the missing low-order digits with the
    /// maximum digit value, rounding the truncated value into the correct
    /// top bytes. A single trailing digit yields no bytes.
    fn flush_partial(&mut self, out: &mut Vec<u8>) {
        if self.fill > 0 {
            let count = self.fill - 1;
            let block = self.block.wrapping_add(POW85[count]);
            out.extend_from_slice(&block.to_be_bytes()[..count]);
            self.block = 0;
            self.fill = 0;
        }
    }
}

/// Encode data and write the ASCII85 text to output in a single pass.
/// With `markers`, the text is wrapped in `<~` and `~>`; a trailing
/// newline terminates the stream either way.
pub fn encode_to_writer(data: &[u8], markers: bool, out: &mut impl Write) -> io::Result<()> {
    let mut buf = Vec::with_capacity(data.len() / 4 * 5 + 8);
    if markers {
        buf.extend_from_slice(START_MARKER);
    }

    let mut encoder = Encoder::new();
    encoder.update(data, &mut buf);
    encoder.finish(&mut buf);

    if markers {
        buf.extend_from_slice(END_MARKER);
    }
    buf.push(b'\n');
    out.write_all(&buf)
}

/// Decode ASCII85 text and write the raw bytes to output.
/// With `markers`, the input must be wrapped in `<~` and `~>` and
/// anything after `~>` is ignored; without them, end of input is the
/// stream terminator.
pub fn decode_to_writer(data: &[u8], markers: bool, out: &mut impl Write) -> Result<(), DecodeError> {
    let mut decoder = Decoder::new(markers);
    let mut buf = Vec::with_capacity(data.len() / 5 * 4 + 4);

    if !decoder.update(data, &mut buf)? {
        decoder.finish(&mut buf)?;
    }
    out.write_all(&buf)?;
    Ok(())
}

/// Stream-encode from a reader to a writer. Used for stdin processing.
/// Reads 4MB chunks and carries the partial group across chunks, so the
/// output is identical to the slice form byte for byte.
pub fn encode_stream(
    reader: &mut impl Read,
    markers: bool,
    writer: &mut impl Write,
) -> io::Result<()> {
    let mut chunk = vec![0u8; STREAM_CHUNK];
    let mut buf = Vec::with_capacity(STREAM_CHUNK / 4 * 5 + 8);
    let mut out = BufWriter::with_capacity(2 * 1024 * 1024, writer);
    let mut encoder = Encoder::new();

    if markers {
        out.write_all(START_MARKER)?;
    }

    loop {
        let n = read_full(reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        buf.clear();
        encoder.update(&chunk[..n], &mut buf);
        out.write_all(&buf)?;
    }

    buf.clear();
    encoder.finish(&mut buf);
    if markers {
        buf.extend_from_slice(END_MARKER);
    }
    buf.push(b'\n');
    out.write_all(&buf)?;
    out.flush()
}

/// Stream-decode from a reader to a writer. Used for stdin processing.
/// Stops reading at the `~>` marker when markers are enabled; bytes
/// decoded before a format error stay written.
pub fn decode_stream(
    reader: &mut impl Read,
    markers: bool,
    writer: &mut impl Write,
) -> Result<(), DecodeError> {
    let mut chunk = vec![0u8; STREAM_CHUNK];
    let mut buf = Vec::with_capacity(STREAM_CHUNK / 5 * 4 + 4);
    let mut out = BufWriter::with_capacity(2 * 1024 * 1024, writer);
    let mut decoder = Decoder::new(markers);

    loop {
        let n = read_full(reader, &mut chunk)?;
        buf.clear();
        if n == 0 {
            decoder.finish(&mut buf)?;
            out.write_all(&buf)?;
            break;
        }
        let done = decoder.update(&chunk[..n], &mut buf)?;
        out.write_all(&buf)?;
        if done {
            break;
        }
    }
    out.flush()?;
    Ok(())
}
