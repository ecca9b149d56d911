#![allow(non_snake_case, non_upper_case_globals)]

use std::io::Cursor;
use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/**
Big-endian fixed-width integer reader/writer over a byte buffer.

Every multi-byte field in the IFS container and its manifest is big-endian
(unlike the little-endian payloads the rest of the game family uses), so
this wraps `byteorder`'s `BigEndian` rather than reaching for a bespoke
bit-twiddling helper. No runtime validation beyond bounds is performed;
callers are responsible for semantic checks.
*/
pub struct ByteCursor
{
	inner: Cursor<Vec<u8>>,
}

impl ByteCursor
{
	pub fn new(data: Vec<u8>) -> Self
	{
		return Self { inner: Cursor::new(data) };
	}

	pub fn position(&self) -> u64
	{
		return self.inner.position();
	}

	pub fn set_position(&mut self, pos: u64)
	{
		self.inner.set_position(pos);
	}

	pub fn into_inner(self) -> Vec<u8>
	{
		return self.inner.into_inner();
	}

	pub fn get_u16(&mut self) -> Result<u16>
	{
		return self.inner.read_u16::<BigEndian>().context("Failed to read u16");
	}

	pub fn get_u32(&mut self) -> Result<u32>
	{
		return self.inner.read_u32::<BigEndian>().context("Failed to read u32");
	}

	pub fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>>
	{
		let mut bytes = vec![0u8; n];
		std::io::Read::read_exact(&mut self.inner, &mut bytes)
			.context("Failed to read a fixed-size byte run")?;
		return Ok(bytes);
	}

	pub fn append_u16(&mut self, value: u16) -> Result<()>
	{
		return self.inner.write_u16::<BigEndian>(value).context("Failed to write u16");
	}

	pub fn append_u32(&mut self, value: u32) -> Result<()>
	{
		return self.inner.write_u32::<BigEndian>(value).context("Failed to write u32");
	}

	pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()>
	{
		return std::io::Write::write_all(&mut self.inner, bytes).context("Failed to write a byte run");
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn round_trips_fixed_width_fields()
	{
		let mut cursor = ByteCursor::new(vec![]);
		cursor.append_u32(0x6CAD8F89).unwrap();
		cursor.append_u16(3).unwrap();
		cursor.append_bytes(b"xyz").unwrap();

		let mut reader = ByteCursor::new(cursor.into_inner());
		assert_eq!(0x6CAD8F89, reader.get_u32().unwrap());
		assert_eq!(3, reader.get_u16().unwrap());
		assert_eq!(b"xyz".to_vec(), reader.get_bytes(3).unwrap());
	}

	#[test]
	fn out_of_bounds_read_is_an_error()
	{
		let mut cursor = ByteCursor::new(vec![0, 1]);
		assert!(cursor.get_u32().is_err());
	}
}
