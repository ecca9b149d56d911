#![allow(non_snake_case, non_upper_case_globals)]

use std::io::Cursor;
use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt};
use tracing::warn;

/// Sliding window size in bytes.
const WINDOW_SIZE: usize = 0x1000;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;
/// Minimum match length worth encoding as a back-reference.
const THRESHOLD: usize = 3;
/// How far back a match may point.
const LOOK_RANGE: usize = 0x200;
/// Longest representable match (15 + THRESHOLD, the 4-bit length field).
const MAX_LEN: usize = 0xF + THRESHOLD;

/**
Decode an AVSLZ bitstream.

The stream is a sequence of groups, each starting with a flag byte whose
eight bits are consumed LSB-first: a `1` bit copies the next input byte
through unchanged; a `0` bit reads a big-endian `u16` whose top 12 bits are a
window distance and bottom 4 bits are `length - 3`. A distance of zero ends
the stream, including mid-group — any remaining flag bits are simply never
read.

A back-reference may point at window cells that haven't been written yet;
those must decode as zero bytes (`out.extend` of zeroes below) rather than
panicking on an out-of-range index, since some AVSLZ producers rely on this.
*/
pub fn decompress(input: &[u8]) -> Result<Vec<u8>>
{
	let mut cursor = Cursor::new(input);
	let mut out: Vec<u8> = Vec::new();

	loop
	{
		let flag = cursor.read_u8().context("Failed to read AVSLZ flag byte")?;
		for i in 0..8
		{
			if (flag >> i) & 1 == 1
			{
				let byte = cursor.read_u8().context("Failed to read AVSLZ literal byte")?;
				out.push(byte);
			}
			else
			{
				let w = cursor.read_u16::<BigEndian>().context("Failed to read AVSLZ back-reference")?;
				let position = (w >> 4) as usize;
				let mut length = ((w & 0x0F) as usize) + THRESHOLD;

				if position == 0
				{
					return Ok(out);
				}

				if position > out.len()
				{
					let diff = (position - out.len()).min(length);
					out.resize(out.len() + diff, 0);
					length -= diff;
				}

				for _ in 0..length
				{
					let byte = out[out.len() - position];
					out.push(byte);
				}
			}
		}
	}
}

/// Find the longest back-reference match for the bytes starting at `offset`
/// within `data`, searching no further back than `LOOK_RANGE`/`WINDOW_MASK`.
fn match_window(data: &[u8], offset: usize) -> Option<(usize, usize)>
{
	let window_start = offset.saturating_sub(WINDOW_MASK).max(offset.saturating_sub(LOOK_RANGE));

	for n in (THRESHOLD..=MAX_LEN).rev()
	{
		let window_end = (offset + n).min(data.len());
		if window_end - offset < THRESHOLD
		{
			return None;
		}
		let str_to_find = &data[offset..window_end];

		let search_end = match window_end.checked_sub(n)
		{
			Some(v) if v > window_start => v,
			_ => continue,
		};

		let mut found = None;
		let mut start = search_end;
		while start > window_start
		{
			start -= 1;
			if data[start..start + str_to_find.len()] == *str_to_find
			{
				found = Some(start);
				break;
			}
		}

		if let Some(idx) = found
		{
			return Some((offset - idx, str_to_find.len()));
		}
	}

	None
}

/**
Encode `input` as an AVSLZ bitstream.

For each position, scans back up to `LOOK_RANGE` bytes for the longest match
of at least `THRESHOLD` bytes, trying the longest representable lengths
first so the first match found is already the best one available. Falls
back to a literal byte when no match qualifies.
*/
pub fn compress(input: &[u8]) -> Vec<u8>
{
	let mut padded = vec![0u8; WINDOW_SIZE];
	padded.extend_from_slice(input);
	let input_size = padded.len();

	let mut current_pos = WINDOW_SIZE;
	let mut compressed = Vec::new();

	while current_pos < input_size
	{
		let mut flag_byte: u8 = 0;
		let mut buf: Vec<u8> = Vec::new();

		for _ in 0..8
		{
			let bit: u8;
			if current_pos >= input_size
			{
				bit = 0;
			}
			else if let Some((distance, length)) = match_window(&padded, current_pos)
			{
				let info: u16 = ((distance as u16) << 4) | (((length - THRESHOLD) as u16) & 0x0F);
				buf.extend_from_slice(&info.to_be_bytes());
				current_pos += length;
				bit = 0;
			}
			else
			{
				buf.push(padded[current_pos]);
				current_pos += 1;
				bit = 1;
			}

			flag_byte = (flag_byte >> 1) | ((bit & 1) << 7);
		}

		compressed.push(flag_byte);
		compressed.extend_from_slice(&buf);
	}

	compressed.push(0);
	compressed.push(0);
	compressed.push(0);

	return compressed;
}

/// An oracle encoder that emits nothing but literals — used to test that
/// `decompress` doesn't depend on how a particular encoder chose its matches.
pub fn compress_dummy(input: &[u8]) -> Vec<u8>
{
	let mut compressed = Vec::new();
	let mut chunks = input.chunks(8).peekable();

	while let Some(chunk) = chunks.next()
	{
		if chunk.len() == 8
		{
			compressed.push(0xFF);
		}
		else
		{
			compressed.push(0xFFu8 >> (8 - chunk.len()));
		}
		compressed.extend_from_slice(chunk);
	}

	compressed.push(0);
	compressed.push(0);
	compressed.push(0);

	return compressed;
}

/**
Wrap compressed AVSLZ bytes with the container's outer 8-byte frame header:
`u32` uncompressed size then `u32` compressed size, both big-endian,
followed by the coded bytes.
*/
pub fn encode_framed(uncompressed: &[u8]) -> Vec<u8>
{
	let coded = compress(uncompressed);
	let mut framed = Vec::with_capacity(coded.len() + 8);
	framed.extend_from_slice(&(uncompressed.len() as u32).to_be_bytes());
	framed.extend_from_slice(&(coded.len() as u32).to_be_bytes());
	framed.extend_from_slice(&coded);
	return framed;
}

/**
Unwrap a framed AVSLZ payload as read from disk/container.

When the payload length equals `compressed_size + 8` it is genuinely
compressed and is AVSLZ-decoded. Otherwise the payload is treated as
uncompressed data whose two header `u32`s were historically moved to the
tail instead of the head — preserve that reshuffle rather than failing, but
warn since the producer's intent here is undocumented.
*/
pub fn decode_framed(payload: &[u8]) -> Result<Vec<u8>>
{
	if payload.len() < 8
	{
		anyhow::bail!("AVSLZ frame shorter than the 8-byte header");
	}

	let uncompressed_size = u32::from_be_bytes(payload[0..4].try_into().unwrap()) as usize;
	let compressed_size = u32::from_be_bytes(payload[4..8].try_into().unwrap()) as usize;

	if payload.len() == compressed_size + 8
	{
		let data = decompress(&payload[8..])?;
		anyhow::ensure!(data.len() == uncompressed_size, "AVSLZ decoded length mismatch");
		return Ok(data);
	}

	warn!("AVSLZ frame length doesn't match compressed_size + 8; treating payload as uncompressed with a trailing header");
	let mut data = payload[8..].to_vec();
	data.extend_from_slice(&payload[0..8]);
	return Ok(data);
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn round_trips_arbitrary_bytes()
	{
		let input: Vec<u8> = (0..2000).map(|i| (i % 251) as u8).collect();
		let compressed = compress(&input);
		let decompressed = decompress(&compressed).unwrap();
		assert_eq!(input, decompressed);
	}

	#[test]
	fn round_trips_highly_repetitive_bytes()
	{
		let input = vec![0x42u8; 5000];
		let compressed = compress(&input);
		assert!(compressed.len() < input.len());
		let decompressed = decompress(&compressed).unwrap();
		assert_eq!(input, decompressed);
	}

	#[test]
	fn dummy_encoder_round_trips()
	{
		let input: Vec<u8> = (0..500).map(|i| (i * 7 % 256) as u8).collect();
		let compressed = compress_dummy(&input);
		let decompressed = decompress(&compressed).unwrap();
		assert_eq!(input, decompressed);
	}

	#[test]
	fn sixteen_zeroes_then_a_literal()
	{
		let input = [vec![0u8; 16], vec![1u8]].concat();
		let compressed = compress(&input);
		// one flag byte, at least one back-reference (2 bytes) + one literal
		// byte, well short of the uncompressed+header size.
		assert!(compressed.len() < input.len() + 8);
		let decompressed = decompress(&compressed).unwrap();
		assert_eq!(input, decompressed);
	}

	#[test]
	fn decode_handles_reference_into_unwritten_window()
	{
		// flag byte 0 -> single back-reference covering all 8 slots (but we
		// stop after the first since distance 0 terminates); position=5,
		// length=3 with nothing written yet must zero-pad.
		let w: u16 = (5 << 4) | 0; // length field 0 => length 3
		let mut bytes = vec![0u8];
		bytes.extend_from_slice(&w.to_be_bytes());
		// terminate immediately after
		bytes.extend_from_slice(&[0, 0]);
		let decoded = decompress(&bytes).unwrap();
		assert_eq!(vec![0, 0, 0], decoded);
	}

	#[test]
	fn frame_round_trip_marks_payload_compressed()
	{
		let input: Vec<u8> = (0..300).map(|i| (i % 13) as u8).collect();
		let framed = encode_framed(&input);
		assert_eq!(framed.len() - 8, u32::from_be_bytes(framed[4..8].try_into().unwrap()) as usize);
		let decoded = decode_framed(&framed).unwrap();
		assert_eq!(input, decoded);
	}

	#[test]
	fn frame_treats_length_mismatch_as_uncompressed_with_trailing_header()
	{
		let payload_body = vec![9u8; 20];
		let mut payload = vec![0u8; 8];
		payload.extend_from_slice(&payload_body);
		// compressed_size header (bytes 4..8) is zero, but body is 20 bytes,
		// so length check fails and the reshuffle path triggers.
		let decoded = decode_framed(&payload).unwrap();
		let mut expected = payload_body;
		expected.extend_from_slice(&[0u8; 8]);
		assert_eq!(expected, decoded);
	}
}
