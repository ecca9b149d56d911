#![allow(non_snake_case, non_upper_case_globals)]

use std::path::PathBuf;
use std::sync::Arc;

/**
Where a node's bytes come from. Rather than a parent weak reference for path
resolution, every node carries its own precomputed archive path prefix
instead.

A backref file starts out as `FromSuperSlot` while the tree is still being
built — its position in the eventual super list is known but the super
hasn't been loaded yet — and [`crate::tree::super_ref::resolve`] rewrites it
to `FromSuperIfs` once the referenced IFS's data blob is in hand.
*/
#[derive(Clone, Debug, PartialEq)]
pub enum Origin
{
	FromIfs { start: u32, size: u32 },
	FromDisk { base_path: PathBuf },
	FromSuperSlot { super_index: usize, md5: Option<String> },
	FromSuperIfs { blob: Arc<Vec<u8>>, start: u32, size: u32 },
}

/// Fields shared by every tree entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeMeta
{
	/// Display name — what the on-disk entry is called.
	pub name: String,
	/// The sanitized tag name used inside the manifest XML; may differ
	/// from `name` after MD5 deobfuscation.
	pub packed_name: String,
	/// Parent path within the archive, precomputed at construction
	/// rather than walked via a parent back-reference.
	pub path: String,
	/// Seconds since epoch; -1 if absent.
	pub time: i64,
}

impl NodeMeta
{
	pub fn new(name: impl Into<String>, path: impl Into<String>, time: i64) -> Self
	{
		let name = name.into();
		return Self { packed_name: name.clone(), name, path: path.into(), time };
	}

	/// The full archive-relative path of this node, `path/name` (or just
	/// `name` at the root, where `path` is empty).
	pub fn full_path(&self) -> String
	{
		if self.path.is_empty()
		{
			return self.name.clone();
		}
		return format!("{}/{}", self.path, self.name);
	}
}
