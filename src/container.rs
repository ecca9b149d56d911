#![allow(non_snake_case, non_upper_case_globals)]

/*!
Top-level IFS container codec: header read/write, manifest binary XML
integration, data-blob assembly.
*/

use anyhow::{Context, Result};

use crate::bytecursor::ByteCursor;
use crate::cache::CachePolicy;
use crate::error::IfsError;
use crate::tree::folder::Folder;
use crate::xmldoc::{self, Element, XmlDoc};

pub const SIGNATURE: u32 = 0x6CAD8F89;
pub const FILE_VERSION: u16 = 3;
pub const HEADER_SIZE: u64 = 36;

/// Per-depth constants for the `tree_size` formula; believed to model the
/// in-memory representation size of a reference runtime this crate does not
/// share, so a mismatch on read is tolerated but the same formula is always
/// emitted on write.
const TREE_SIZE_BASE: u64 = 856;
const TREE_SIZE_FILE: u64 = 64;
const TREE_SIZE_FOLDER: u64 = 56;
const TREE_SIZE_DEPTH_MULTIPLIER: u64 = 16;

#[derive(Clone, Debug)]
pub struct Header
{
	pub version: u16,
	pub creation_time: u32,
	pub tree_size: u32,
	pub manifest_end: u32,
	pub manifest_md5: Option<[u8; 16]>,
}

#[derive(Debug)]
pub struct Container
{
	pub header: Header,
	pub root: Folder,
	pub data_blob: Vec<u8>,
}

/// `856 + Σ [64·|folder.files| + (56 − 16·depth)·|folder.folders| + recurse(...)]`
pub fn predict_tree_size(root: &Folder) -> u32
{
	fn recurse(folder: &Folder, depth: u64) -> u64
	{
		let mut total = TREE_SIZE_FILE * folder.files.len() as u64
			+ (TREE_SIZE_FOLDER.saturating_sub(TREE_SIZE_DEPTH_MULTIPLIER * depth)) * folder.folders.len() as u64;
		for sub in &folder.folders
		{
			total += recurse(sub, depth + 1);
		}
		return total;
	}

	return (TREE_SIZE_BASE + recurse(root, 0)) as u32;
}

impl Container
{
	/// Parse the 36-byte header, slice out the manifest, and decode it
	/// into a tree; does not resolve any `_super_` references — that is
	/// [`crate::tree::super_ref::SuperRefResolver`]'s job, run by the
	/// caller after construction.
	pub fn read(bytes: &[u8]) -> Result<Self>
	{
		let mut cursor = ByteCursor::new(bytes.to_vec());

		let signature = cursor.get_u32().context("Failed to read IFS signature")?;
		if signature != SIGNATURE
		{
			return Err(IfsError::InvalidContainer(signature).into());
		}

		let version = cursor.get_u16().context("Failed to read IFS version")?;
		let complement = cursor.get_u16().context("Failed to read IFS version complement")?;
		if version != (complement ^ 0xFFFF)
		{
			return Err(IfsError::BadVersionComplement { version, complement }.into());
		}

		let creation_time = cursor.get_u32().context("Failed to read IFS creation time")?;
		let tree_size = cursor.get_u32().context("Failed to read IFS tree size")?;
		let manifest_end = cursor.get_u32().context("Failed to read IFS manifest end offset")?;

		let manifest_md5 = if version > 1
		{
			let bytes = cursor.get_bytes(16).context("Failed to read manifest MD5")?;
			Some(bytes.try_into().unwrap())
		}
		else
		{
			None
		};

		let manifest_start = cursor.position() as usize;
		let manifest_bytes = &bytes[manifest_start..manifest_end as usize];
		let doc = xmldoc::from_binary(manifest_bytes).context("Failed to decode manifest binary XML")?;
		let mut root = Folder::from_xml(&doc.root, "").context("Failed to build manifest tree")?;
		crate::tree::tree_complete(&mut root, false).context("Failed to run tree-complete pass")?;

		let data_blob = bytes[manifest_end as usize..].to_vec();

		let header = Header { version, creation_time, tree_size, manifest_end, manifest_md5 };
		return Ok(Container { header, root, data_blob });
	}

	/**
	Emit placeholder header → manifest binary XML → data blob.
	`creation_time` is supplied by the caller (typically the current time);
	the manifest's `_info_` block is stamped with the data blob's MD5 and
	size before encoding.
	*/
	pub fn write(root: &mut Folder, creation_time: u32, cache: &mut CachePolicy) -> Result<Vec<u8>>
	{
		crate::tree::tree_complete(root, true).context("Failed to run tree-complete pass")?;

		let mut blob = Vec::new();
		let mut manifest_root = root.emit_xml(&mut blob, cache)?;

		let digest = md5::compute(&blob);
		let info = manifest_root.children.iter_mut().find(|c| c.tag == "_info_");
		let info = match info
		{
			Some(info) => info,
			None =>
			{
				manifest_root.children.insert(0, Element::new("_info_"));
				manifest_root.children.first_mut().unwrap()
			}
		};
		upsert_info_child(info, "md5", "bin", Some(16), format!("{:x}", digest).to_uppercase());
		upsert_info_child(info, "size", "u32", None, blob.len().to_string());

		let tree_size = predict_tree_size(root);
		let doc = XmlDoc::new(manifest_root);
		let manifest_bin = xmldoc::to_binary(&doc).context("Failed to encode manifest binary XML")?;

		let manifest_md5 = md5::compute(&manifest_bin);
		let manifest_end = HEADER_SIZE as u32 + manifest_bin.len() as u32;

		let mut cursor = ByteCursor::new(Vec::new());
		cursor.append_u32(SIGNATURE)?;
		cursor.append_u16(FILE_VERSION)?;
		cursor.append_u16(FILE_VERSION ^ 0xFFFF)?;
		cursor.append_u32(creation_time)?;
		cursor.append_u32(tree_size)?;
		cursor.append_u32(manifest_end)?;
		cursor.append_bytes(&manifest_md5.0)?;
		cursor.append_bytes(&manifest_bin)?;
		cursor.append_bytes(&blob)?;

		return Ok(cursor.into_inner());
	}
}

fn upsert_info_child(info: &mut Element, tag: &str, ty: &str, size: Option<u32>, text: String)
{
	let mut el = Element::with_text(tag, text).attr("__type", ty);
	if let Some(size) = size
	{
		el = el.attr("__size", size.to_string());
	}
	if let Some(existing) = info.child_mut(tag)
	{
		*existing = el;
	}
	else
	{
		info.children.push(el);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::tree::node::NodeMeta;

	#[test]
	fn tree_size_of_empty_root_is_the_base_constant()
	{
		let root = Folder::new(NodeMeta::new("imgfs", "", -1));
		assert_eq!(TREE_SIZE_BASE as u32, predict_tree_size(&root));
	}

	#[test]
	fn tree_size_accounts_for_files_and_nested_folders()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));
		let mut sub = Folder::new(NodeMeta::new("a", "imgfs", -1));
		sub.files.push(crate::tree::file::File::new(
			NodeMeta::new("x", "imgfs/a", -1),
			crate::tree::node::Origin::FromIfs { start: 0, size: 0 },
		));
		root.folders.push(sub);

		let expected = TREE_SIZE_BASE + TREE_SIZE_FOLDER + TREE_SIZE_FILE;
		assert_eq!(expected as u32, predict_tree_size(&root));
	}

	#[test]
	fn header_round_trip_matches_the_documented_byte_layout()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));
		let mut a = Folder::new(NodeMeta::new("a", "imgfs", 1700000000));

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("xyz");
		std::fs::write(&path, b"xyz").unwrap();
		let mut file = crate::tree::file::File::new(
			NodeMeta::new("xyz", "imgfs/a", 1700000000),
			crate::tree::node::Origin::FromDisk { base_path: path },
		);
		file.kind = crate::tree::file::FileKind::Generic;
		a.files.push(file);
		root.folders.push(a);

		let mut cache = CachePolicy::new(false);
		let bytes = Container::write(&mut root, 1700000000, &mut cache).unwrap();

		assert_eq!(&[0x6C, 0xAD, 0x8F, 0x89, 0x00, 0x03, 0xFF, 0xFC], &bytes[0..8]);

		let parsed = Container::read(&bytes).unwrap();
		assert_eq!(FILE_VERSION, parsed.header.version);
		assert_eq!(1700000000, parsed.header.creation_time);
		assert_eq!(parsed.header.manifest_end as usize + parsed.data_blob.len(), bytes.len());

		let reparsed_a = parsed.root.folder("a").unwrap();
		assert_eq!("xyz", reparsed_a.files[0].meta.name);
		assert_eq!(3, reparsed_a.files[0].size);
	}
}
