#![allow(non_snake_case, non_upper_case_globals)]

use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};
use strum::{Display, EnumString};
use tracing::warn;

/**
The three pixel payload encodings a texture entry may declare.

Only `Argb8888Rev` has both a decoder and an encoder; `Argb4444` and `Dxt5`
are decode-only.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PixelFormat
{
	#[strum(serialize = "argb8888rev")]
	Argb8888Rev,
	#[strum(serialize = "argb4444")]
	Argb4444,
	#[strum(serialize = "dxt5")]
	Dxt5,
}

impl PixelFormat
{
	/// Whether this format has an encoder — the subset of formats a
	/// texture repacked from disk may end up using.
	pub fn is_cachable(&self) -> bool
	{
		return matches!(self, PixelFormat::Argb8888Rev);
	}
}

/// Pad `data` with trailing zero bytes up to `need` bytes, warning once if a
/// short image payload had to be padded.
fn check_size(data: Vec<u8>, width: u32, height: u32, bytes_per_pixel: usize, name: &str) -> Vec<u8>
{
	let need = (width as usize) * (height as usize) * bytes_per_pixel;
	if data.len() < need
	{
		warn!(name, have = data.len(), need, "short image payload, padding with zeroes");
		let mut data = data;
		data.resize(need, 0);
		return data;
	}
	return data;
}

/// Decode raw row-major BGRA bytes (no padding) into an RGBA image.
pub fn decode_argb8888_rev(data: &[u8], width: u32, height: u32, name: &str) -> RgbaImage
{
	let data = check_size(data.to_vec(), width, height, 4, name);
	let mut image = RgbaImage::new(width, height);
	for (px, chunk) in image.pixels_mut().zip(data.chunks_exact(4))
	{
		*px = Rgba([chunk[2], chunk[1], chunk[0], chunk[3]]);
	}
	return image;
}

/// Encode an RGBA image back to raw row-major BGRA bytes — the only
/// encodable format.
pub fn encode_argb8888_rev(image: &RgbaImage) -> Vec<u8>
{
	let mut data = Vec::with_capacity((image.width() * image.height() * 4) as usize);
	for px in image.pixels()
	{
		let [r, g, b, a] = px.0;
		data.extend_from_slice(&[b, g, r, a]);
	}
	return data;
}

fn expand_nibble(n: u8) -> u8
{
	return (n << 4) | n;
}

/**
Decode 2-byte big-endian RGBA4 samples: each nibble is bit-replicated to a
full byte, then channels are reordered from RGBA to BGRA.
Decode only — there is no re-encoder for this format.
*/
pub fn decode_argb4444(data: &[u8], width: u32, height: u32, name: &str) -> RgbaImage
{
	let data = check_size(data.to_vec(), width, height, 2, name);
	let mut image = RgbaImage::new(width, height);
	for (px, chunk) in image.pixels_mut().zip(data.chunks_exact(2))
	{
		let word = u16::from_be_bytes([chunk[0], chunk[1]]);
		let r = expand_nibble(((word >> 12) & 0xF) as u8);
		let g = expand_nibble(((word >> 8) & 0xF) as u8);
		let b = expand_nibble(((word >> 4) & 0xF) as u8);
		let a = expand_nibble((word & 0xF) as u8);
		// RGBA -> BGRA
		*px = Rgba([b, g, r, a]);
	}
	return image;
}

fn rgb565_to_rgb888(value: u16) -> (u8, u8, u8)
{
	let r5 = ((value >> 11) & 0x1F) as u32;
	let g6 = ((value >> 5) & 0x3F) as u32;
	let b5 = (value & 0x1F) as u32;
	let r = ((r5 * 527 + 23) >> 6) as u8;
	let g = ((g6 * 259 + 33) >> 6) as u8;
	let b = ((b5 * 527 + 23) >> 6) as u8;
	return (r, g, b);
}

/// Decode a single 16-byte BC3/DXT5 block into a 4x4 RGBA grid.
fn decode_dxt5_block(block: &[u8]) -> [[u8; 4]; 16]
{
	let alpha0 = block[0];
	let alpha1 = block[1];

	let mut alpha_index_bits: u64 = 0;
	for i in 0..6
	{
		alpha_index_bits |= (block[2 + i] as u64) << (8 * i);
	}

	let mut alphas = [0u8; 8];
	alphas[0] = alpha0;
	alphas[1] = alpha1;
	if alpha0 > alpha1
	{
		for i in 0..6
		{
			alphas[2 + i] = (((6 - i) as u32 * alpha0 as u32 + (i + 1) as u32 * alpha1 as u32) / 7) as u8;
		}
	}
	else
	{
		for i in 0..4
		{
			alphas[2 + i] = (((4 - i) as u32 * alpha0 as u32 + (i + 1) as u32 * alpha1 as u32) / 5) as u8;
		}
		alphas[6] = 0;
		alphas[7] = 255;
	}

	let color0 = u16::from_le_bytes([block[8], block[9]]);
	let color1 = u16::from_le_bytes([block[10], block[11]]);
	let (r0, g0, b0) = rgb565_to_rgb888(color0);
	let (r1, g1, b1) = rgb565_to_rgb888(color1);

	let colors = [
		(r0, g0, b0),
		(r1, g1, b1),
		(
			((2 * r0 as u32 + r1 as u32) / 3) as u8,
			((2 * g0 as u32 + g1 as u32) / 3) as u8,
			((2 * b0 as u32 + b1 as u32) / 3) as u8,
		),
		(
			((r0 as u32 + 2 * r1 as u32) / 3) as u8,
			((g0 as u32 + 2 * g1 as u32) / 3) as u8,
			((b0 as u32 + 2 * b1 as u32) / 3) as u8,
		),
	];

	let color_indices = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);

	let mut out = [[0u8; 4]; 16];
	for i in 0..16
	{
		let alpha_idx = ((alpha_index_bits >> (3 * i)) & 0x7) as usize;
		let color_idx = ((color_indices >> (2 * i)) & 0x3) as usize;
		let (r, g, b) = colors[color_idx];
		out[i] = [r, g, b, alphas[alpha_idx]];
	}
	return out;
}

/**
Decode a DXT5/BC3 payload into an RGBA image.

The payload arrives as big-endian 16-bit words rather than the little-endian
layout a DDS/BC3 block expects, so it is byte-swapped before block decoding.
`image` has no DDS/BC3 support to delegate to, so the block decode is
implemented directly here rather than through a synthetic DDS container.
Decode only.
*/
pub fn decode_dxt5(data: &[u8], width: u32, height: u32) -> Result<RgbaImage>
{
	if data.len() % 2 != 0
	{
		bail!("DXT5 payload has an odd length, cannot byte-swap 16-bit words");
	}

	let mut swapped = Vec::with_capacity(data.len());
	for chunk in data.chunks_exact(2)
	{
		swapped.push(chunk[1]);
		swapped.push(chunk[0]);
	}

	let blocks_wide = width.div_ceil(4) as usize;
	let blocks_high = height.div_ceil(4) as usize;
	let needed = blocks_wide * blocks_high * 16;
	if swapped.len() < needed
	{
		bail!("DXT5 payload too short: have {} bytes, need {}", swapped.len(), needed);
	}

	let mut image = RgbaImage::new(width, height);
	for by in 0..blocks_high
	{
		for bx in 0..blocks_wide
		{
			let block_index = by * blocks_wide + bx;
			let block = &swapped[block_index * 16..block_index * 16 + 16];
			let pixels = decode_dxt5_block(block);
			for row in 0..4
			{
				for col in 0..4
				{
					let x = (bx * 4 + col) as u32;
					let y = (by * 4 + row) as u32;
					if x < width && y < height
					{
						let p = pixels[row * 4 + col];
						image.put_pixel(x, y, Rgba(p));
					}
				}
			}
		}
	}

	return Ok(image);
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn argb8888_rev_round_trips_through_bgra()
	{
		let mut image = RgbaImage::new(2, 2);
		image.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
		image.put_pixel(1, 0, Rgba([40, 50, 60, 128]));
		image.put_pixel(0, 1, Rgba([1, 2, 3, 4]));
		image.put_pixel(1, 1, Rgba([255, 0, 0, 0]));

		let encoded = encode_argb8888_rev(&image);
		let decoded = decode_argb8888_rev(&encoded, 2, 2, "test");
		assert_eq!(image, decoded);
	}

	#[test]
	fn argb8888_rev_pads_short_payload()
	{
		let decoded = decode_argb8888_rev(&[1, 2, 3, 4], 2, 1, "test");
		assert_eq!(*decoded.get_pixel(0, 0), Rgba([3, 2, 1, 4]));
		assert_eq!(*decoded.get_pixel(1, 0), Rgba([0, 0, 0, 0]));
	}

	#[test]
	fn argb4444_expands_nibbles_and_reorders_channels()
	{
		// R=0xF G=0x0 B=0xF A=0x0 packed big-endian
		let word: u16 = 0xF0F0;
		let decoded = decode_argb4444(&word.to_be_bytes(), 1, 1, "test");
		let px = decoded.get_pixel(0, 0);
		assert_eq!(px.0[0], 0xFF); // B
		assert_eq!(px.0[1], 0x00); // G
		assert_eq!(px.0[2], 0xFF); // R
		assert_eq!(px.0[3], 0x00); // A
	}

	#[test]
	fn dxt5_decodes_a_solid_block()
	{
		// alpha0=alpha1=255 (all alpha bits irrelevant), color0=color1=max
		// white, all color indices 0.
		let mut block = [0u8; 16];
		block[0] = 255;
		block[1] = 255;
		let white: u16 = 0xFFFF;
		block[8..10].copy_from_slice(&white.to_le_bytes());
		block[10..12].copy_from_slice(&white.to_le_bytes());

		// byte-swap as decode_dxt5 expects pre-swapped (big-endian WORD) input
		let mut source = vec![0u8; 16];
		for (i, pair) in block.chunks_exact(2).enumerate()
		{
			source[i * 2] = pair[1];
			source[i * 2 + 1] = pair[0];
		}

		let decoded = decode_dxt5(&source, 4, 4).unwrap();
		assert_eq!(*decoded.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
		assert_eq!(*decoded.get_pixel(3, 3), Rgba([255, 255, 255, 255]));
	}

	#[test]
	fn pixel_format_cachable_subset_is_argb8888rev_only()
	{
		assert!(PixelFormat::Argb8888Rev.is_cachable());
		assert!(!PixelFormat::Argb4444.is_cachable());
		assert!(!PixelFormat::Dxt5.is_cachable());
	}
}
