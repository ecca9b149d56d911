#![allow(non_snake_case, non_upper_case_globals)]

use std::io::Cursor;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::warn;

use crate::cache::CachePolicy;
use crate::error::IfsError;
use crate::lz77;
use crate::pixel::{self, PixelFormat};
use crate::tree::node::{NodeMeta, Origin};

/// `imgrect`/`uvrect`: doubled pixel coordinates in the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect
{
	pub x0: i32,
	pub x1: i32,
	pub y0: i32,
	pub y1: i32,
}

impl Rect
{
	pub fn new(x0: i32, x1: i32, y0: i32, y1: i32) -> Self
	{
		return Self { x0, x1, y0, y1 };
	}

	/// Derived pixel dimensions, halving the doubled source coordinates.
	pub fn img_size(&self) -> (u32, u32)
	{
		return (((self.x1 - self.x0) / 2) as u32, ((self.y1 - self.y0) / 2) as u32);
	}
}

/// The texture-specific fields an `ImageFile` adds over a generic file.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageExt
{
	pub format: PixelFormat,
	pub compress: Option<String>,
	pub imgrect: Rect,
	pub uvrect: Rect,
}

/**
Tagged variant standing in for runtime reclassification of a generic file
into an image file. `tree_complete` swaps `Generic` for `Image` in place
rather than mutating a class pointer.
*/
#[derive(Clone, Debug, PartialEq)]
pub enum FileKind
{
	Generic,
	Image(ImageExt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct File
{
	pub meta: NodeMeta,
	pub start: u32,
	pub size: u32,
	pub origin: Origin,
	pub kind: FileKind,
}

impl File
{
	pub fn new(meta: NodeMeta, origin: Origin) -> Self
	{
		return Self { meta, start: 0, size: 0, origin, kind: FileKind::Generic };
	}

	pub fn is_image(&self) -> bool
	{
		return matches!(self.kind, FileKind::Image(_));
	}

	/// Raw bytes as they sit in the container's data blob or on disk — no
	/// image decode, no decompression.
	pub fn raw_bytes(&self, blob: Option<&[u8]>) -> Result<Vec<u8>>
	{
		return match &self.origin
		{
			Origin::FromIfs { start, size } =>
			{
				let blob = blob.context("reading a container-backed file requires the data blob")?;
				let end = *start as usize + *size as usize;
				if end > blob.len()
				{
					return Err(IfsError::TruncatedPayload { start: *start, size: *size, blob_len: blob.len() }.into());
				}
				Ok(blob[*start as usize..end].to_vec())
			}
			Origin::FromDisk { base_path } => std::fs::read(base_path)
				.with_context(|| format!("Failed to read {}", base_path.display())),
			Origin::FromSuperIfs { blob, start, size } =>
			{
				let end = *start as usize + *size as usize;
				if end > blob.len()
				{
					return Err(IfsError::TruncatedPayload { start: *start, size: *size, blob_len: blob.len() }.into());
				}
				Ok(blob[*start as usize..end].to_vec())
			}
			Origin::FromSuperSlot { .. } =>
			{
				anyhow::bail!("file's super reference was never resolved")
			}
		};
	}

	/**
	Produce the bytes that should land at the destination path during
	extraction: a PNG for image files (decoded and un-AVSLZ'd as needed),
	or the file's raw bytes otherwise.
	*/
	pub fn extract(&self, blob: Option<&[u8]>) -> Result<Vec<u8>>
	{
		let raw = self.raw_bytes(blob)?;
		let ext = match &self.kind
		{
			FileKind::Generic => return Ok(raw),
			FileKind::Image(ext) => ext,
		};

		let pixels = match ext.compress.as_deref()
		{
			Some("avslz") => lz77::decode_framed(&raw).context("Failed to decode AVSLZ texture payload")?,
			_ => raw,
		};

		let (width, height) = ext.imgrect.img_size();
		let name = self.meta.full_path();
		let image = match ext.format
		{
			PixelFormat::Argb8888Rev => pixel::decode_argb8888_rev(&pixels, width, height, &name),
			PixelFormat::Argb4444 => pixel::decode_argb4444(&pixels, width, height, &name),
			PixelFormat::Dxt5 => pixel::decode_dxt5(&pixels, width, height)?,
		};

		return encode_png(&image);
	}

	/// Whether this file needs a PNG decode + re-encode at repack time,
	/// as opposed to reusing a cached compressed payload.
	pub fn needs_preload(&self, cache: &CachePolicy) -> bool
	{
		if !matches!(self.kind, FileKind::Image(_))
		{
			return false;
		}
		let base_path = match &self.origin
		{
			Origin::FromDisk { base_path } => base_path,
			Origin::FromIfs { .. } | Origin::FromSuperIfs { .. } | Origin::FromSuperSlot { .. } => return false,
		};
		return !cache.is_reusable(base_path, &self.meta.packed_name);
	}

	/**
	Produce the bytes to append into the data blob on repack: for a
	generic file, its raw bytes; for an image file, either the cached
	compressed payload or a fresh decode → re-encode → AVSLZ-frame pass,
	written to cache as a side effect.
	*/
	pub fn repack(&self, cache: &mut CachePolicy) -> Result<Vec<u8>>
	{
		let ext = match &self.kind
		{
			FileKind::Generic => return self.raw_bytes(None),
			FileKind::Image(ext) => ext,
		};
		let base_path = match &self.origin
		{
			Origin::FromDisk { base_path } => base_path.clone(),
			Origin::FromIfs { .. } | Origin::FromSuperIfs { .. } | Origin::FromSuperSlot { .. } =>
			{
				anyhow::bail!("cannot repack an image file that wasn't sourced from a filesystem");
			}
		};

		if cache.is_reusable(&base_path, &self.meta.packed_name)
		{
			return cache.read(&base_path, &self.meta.packed_name);
		}

		let image = image::open(&base_path)
			.with_context(|| format!("Failed to load source image {}", base_path.display()))?
			.into_rgba8();

		if ext.format != PixelFormat::Argb8888Rev
		{
			warn!(
				path = %base_path.display(),
				format = %ext.format,
				"format has no encoder, repacking as argb8888rev",
			);
		}
		let encoded = pixel::encode_argb8888_rev(&image);

		let framed = match ext.compress.as_deref()
		{
			Some("avslz") => lz77::encode_framed(&encoded),
			_ => encoded,
		};

		cache.write(&base_path, &self.meta.packed_name, &framed)?;
		return Ok(framed);
	}
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>>
{
	let mut out = Cursor::new(Vec::new());
	DynamicImage::ImageRgba8(image.clone())
		.write_to(&mut out, ImageFormat::Png)
		.context("Failed to PNG-encode decoded texture")?;
	return Ok(out.into_inner());
}
