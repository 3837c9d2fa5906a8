//! Run-length encodings used by CBDDLP/Photon files.
//!
//! # RLE1
//!
//! Layer images are bilevel. Each byte holds one run: the pixel state in the
//! MSB (set means lit) and the run length, 1 to 127, in the low 7 bits. Runs
//! continue across row boundaries.
//!
//! # RLE15
//!
//! Preview images are RGB555 packed into little-endian `u16`s with the layout
//! `0bRRRRR_GGGGG_F_BBBBB`, where bit 5 (`F`) flags that a run-length word
//! follows. The run word is `0x3000 | (length - 1)`, allowing 4095 pixels.

const RLE1_MAX_RUN: usize = 0x7f;
const RLE15_MAX_RUN: usize = 0xfff;
const RLE15_RUN_FLAG: u16 = 0x20;

/// Encode 8-bit grey pixels as RLE1. Pixels at or above `threshold` are lit.
pub fn encode_rle1(pixels: &[u8], threshold: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() / 16 + 1);
    let mut iter = pixels.iter().map(|&p| p >= threshold).peekable();

    while let Some(lit) = iter.next() {
        let mut run = 1;
        while run < RLE1_MAX_RUN && iter.peek() == Some(&lit) {
            iter.next();
            run += 1;
        }
        out.push(run as u8 | if lit { 0x80 } else { 0x00 });
    }

    out
}

/// Decode RLE1 back to grey levels (0 or 255).
pub fn decode_rle1(data: &[u8]) -> Vec<u8> {
    data.iter()
        .flat_map(|&byte| {
            let level = if byte & 0x80 != 0 { 0xff } else { 0x00 };
            std::iter::repeat(level).take(usize::from(byte & 0x7f))
        })
        .collect()
}

fn pack_rgb555(r: u8, g: u8, b: u8) -> u16 {
    u16::from(r >> 3) << 11 | u16::from(g >> 3) << 6 | u16::from(b >> 3)
}

/// Encode RGB pixels as RLE15, returning little-endian bytes.
pub fn encode_rle15<I>(pixels: I) -> Vec<u8>
where
    I: IntoIterator<Item = [u8; 3]>,
{
    let mut words: Vec<u16> = Vec::new();
    let mut iter = pixels
        .into_iter()
        .map(|[r, g, b]| pack_rgb555(r, g, b))
        .peekable();

    while let Some(colour) = iter.next() {
        let mut run = 1;
        while run < RLE15_MAX_RUN && iter.peek() == Some(&colour) {
            iter.next();
            run += 1;
        }
        match run {
            1 => words.push(colour),
            2 => words.extend([colour, colour]),
            _ => words.extend([colour | RLE15_RUN_FLAG, 0x3000 | (run - 1) as u16]),
        }
    }

    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
