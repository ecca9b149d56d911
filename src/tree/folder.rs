#![allow(non_snake_case, non_upper_case_globals)]

/*!
The in-memory tree of folders and files: build from manifest XML or from a
directory walk, emit manifest XML on repack.
*/

use std::path::Path;
use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::name;
use crate::tree::file::File;
use crate::tree::node::{NodeMeta, Origin};
use crate::xmldoc::Element;

/// Tags that carry metadata rather than directory content.
const INFO_TAG: &str = "_info_";
const SUPER_TAG: &str = "_super_";

#[derive(Clone, Debug)]
pub struct Folder
{
	pub meta: NodeMeta,
	/// Insertion-order-preserved — manifest emission order is observable.
	pub files: Vec<File>,
	pub folders: Vec<Folder>,
	/// The `_info_` child, if any, carried through untouched except where
	/// a specialization (e.g. the texture folder) rewrites it.
	pub info: Option<Element>,
	/// Ordered paths named by any `_super_` descendant, collected in
	/// document order — the index a backref's `<i>` points into.
	pub supers: Vec<String>,
}

impl Folder
{
	pub fn new(meta: NodeMeta) -> Self
	{
		return Self { meta, files: Vec::new(), folders: Vec::new(), info: None, supers: Vec::new() };
	}

	pub fn file(&self, name: &str) -> Option<&File>
	{
		return self.files.iter().find(|f| f.meta.name == name);
	}

	pub fn folder(&self, name: &str) -> Option<&Folder>
	{
		return self.folders.iter().find(|f| f.meta.name == name);
	}

	pub fn folder_mut(&mut self, name: &str) -> Option<&mut Folder>
	{
		return self.folders.iter_mut().find(|f| f.meta.name == name);
	}

	/// Depth-first iterator yielding every `File` in this folder and its
	/// descendants (used by super-reference resolution).
	pub fn all_files(&self) -> Vec<&File>
	{
		let mut out: Vec<&File> = self.files.iter().collect();
		for folder in &self.folders
		{
			out.extend(folder.all_files());
		}
		return out;
	}

	pub fn all_files_mut(&mut self) -> Vec<&mut File>
	{
		let mut out: Vec<&mut File> = self.files.iter_mut().collect();
		for folder in &mut self.folders
		{
			out.extend(folder.all_files_mut());
		}
		return out;
	}

	/// An element is a folder iff it has element children, or its text
	/// splits into exactly one whitespace-separated token — unless its
	/// first child is `<i>`, which always means a super-backref file.
	fn classify(element: &Element) -> bool
	{
		if let Some(first) = element.children.first()
		{
			if first.tag == "i"
			{
				return false;
			}
		}
		if !element.children.is_empty()
		{
			return true;
		}
		if let Some(text) = &element.text
		{
			return text.split_whitespace().count() == 1;
		}
		return false;
	}

	/// Parse `"START SIZE [TIMESTAMP]"`, defaulting timestamp to -1.
	fn parse_file_text(text: &str) -> Result<(u32, u32, i64)>
	{
		let parts: Vec<&str> = text.split_whitespace().collect();
		anyhow::ensure!(parts.len() == 2 || parts.len() == 3, "file element text {text:?} is not 2 or 3 integers");
		let start: u32 = parts[0].parse().with_context(|| format!("bad file start {:?}", parts[0]))?;
		let size: u32 = parts[1].parse().with_context(|| format!("bad file size {:?}", parts[1]))?;
		let time: i64 = match parts.get(2)
		{
			Some(t) => t.parse().with_context(|| format!("bad file timestamp {t:?}"))?,
			None => -1,
		};
		return Ok((start, size, time));
	}

	/// Build a folder (and its subtree) from a manifest XML element,
	/// depth-first, decoding each child's tag via [`name::fix_name`].
	pub fn from_xml(element: &Element, path: &str) -> Result<Folder>
	{
		let timestamp = element.text.as_ref().and_then(|t| t.trim().parse::<i64>().ok()).unwrap_or(-1);
		let root_name = name::fix_name(&element.tag);
		let mut meta = NodeMeta::new(root_name, path, timestamp);
		meta.packed_name = element.tag.clone();
		let mut folder = Folder::new(meta);
		let child_path = folder.meta.full_path();

		for child in &element.children
		{
			if child.tag == INFO_TAG
			{
				folder.info = Some(child.clone());
				continue;
			}
			if child.tag == SUPER_TAG
			{
				if let Some(text) = &child.text
				{
					folder.supers.push(text.trim().to_string());
				}
				continue;
			}

			let child_name = name::fix_name(&child.tag);
			if Self::classify(child)
			{
				let mut sub = Folder::from_xml(child, &child_path)?;
				folder.supers.append(&mut std::mem::take(&mut sub.supers));
				folder.folders.push(sub);
			}
			else
			{
				let is_backref = child.children.first().is_some_and(|c| c.tag == "i");
				let mut meta = NodeMeta::new(child_name, &child_path, -1);
				meta.packed_name = child.tag.clone();

				let file = if is_backref
				{
					let i_child = &child.children[0];
					let index: usize = i_child
						.text
						.as_deref()
						.unwrap_or("0")
						.trim()
						.parse()
						.context("super backref <i> is not an integer")?;
					let md5 = child.child("md5").and_then(|m| m.text.clone());
					File::new(meta, Origin::FromSuperSlot { super_index: index.saturating_sub(1), md5 })
				}
				else
				{
					let text = child.text.as_deref().unwrap_or("");
					let (start, size, time) = Self::parse_file_text(text)?;
					meta.time = time;
					let mut file = File::new(meta, Origin::FromIfs { start, size });
					file.start = start;
					file.size = size;
					file
				};

				folder.files.push(file);
			}
		}

		return Ok(folder);
	}

	/**
	Build a folder (and its subtree) from a pre-order directory walk.
	`ifs_manifest.xml` at the root and any `_cache` directory are excluded;
	the `_cache` exclusion applies at every depth, not only directly under
	a texture folder, since an ordinary walk cannot yet know which folders
	will turn out to be texture folders.
	*/
	pub fn from_filesystem(dir: &Path, path: &str, is_root: bool) -> Result<Folder>
	{
		let name = if is_root { String::new() } else { dir.file_name().context("folder path has no name")?.to_string_lossy().into_owned() };
		let mtime = fs_mtime(dir)?;
		let meta = NodeMeta::new(name, path, mtime);
		let mut folder = Folder::new(meta);
		let child_path = folder.meta.full_path();

		let entries = WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name();
		for entry in entries
		{
			let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
			let file_name = entry.file_name().to_string_lossy().into_owned();

			if entry.file_type().is_dir()
			{
				if file_name == "_cache"
				{
					continue;
				}
				let sub = Folder::from_filesystem(entry.path(), &child_path, false)?;
				folder.folders.push(sub);
				continue;
			}

			if is_root && file_name == "ifs_manifest.xml"
			{
				continue;
			}

			let mtime = fs_mtime(entry.path())?;
			let meta = NodeMeta::new(file_name, &child_path, mtime);
			let file = File::new(meta, Origin::FromDisk { base_path: entry.path().to_path_buf() });
			folder.files.push(file);
		}

		return Ok(folder);
	}

	/**
	Emit this folder (and its subtree) as manifest XML, in `files`
	insertion order, appending each file's payload to `blob` and tracking
	its length as the current blob offset. Padding to a 16-byte boundary
	happens after every file payload.
	*/
	pub fn emit_xml(&self, blob: &mut Vec<u8>, cache: &mut crate::cache::CachePolicy) -> Result<Element>
	{
		let mut element = Element::new(self.meta.packed_name.clone()).attr("__type", "s32");
		element.text = Some(self.meta.time.to_string());

		if let Some(info) = &self.info
		{
			element.children.push(info.clone());
		}

		for file in &self.files
		{
			let payload = file.repack(cache)?;
			let start = blob.len() as u32;
			let size = payload.len() as u32;
			blob.extend_from_slice(&payload);
			let pad = (16 - (blob.len() % 16)) % 16;
			blob.resize(blob.len() + pad, 0);

			let mut file_el = Element::new(file.meta.packed_name.clone()).attr("__type", "3s32");
			file_el.text = Some(format!("{} {} {}", start, size, file.meta.time));
			element.children.push(file_el);
		}

		for sub in &self.folders
		{
			element.children.push(sub.emit_xml(blob, cache)?);
		}

		return Ok(element);
	}
}

fn fs_mtime(path: &Path) -> Result<i64>
{
	let meta = std::fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
	let modified = meta.modified().with_context(|| format!("No mtime available for {}", path.display()))?;
	let secs = modified
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(-1);
	return Ok(secs);
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::xmldoc::parse_xml;

	#[test]
	fn classifies_folder_vs_file_vs_backref()
	{
		let folder_el = Element::new("a").push(Element::new("b"));
		assert!(Folder::classify(&folder_el));

		let timestamp_only = Element::with_text("a", "1700000000");
		assert!(Folder::classify(&timestamp_only));

		let file_el = Element::with_text("xyz", "0 3 1700000000");
		assert!(!Folder::classify(&file_el));

		let backref_el = Element::new("xyz").push(Element::with_text("i", "1"));
		assert!(!Folder::classify(&backref_el));
	}

	#[test]
	fn builds_tree_from_xml_with_nested_folder_and_file()
	{
		let xml = br#"<imgfs __type="s32">1700000000<a __type="s32">1700000000<xyz __type="3s32">0 3 1700000000</xyz></a></imgfs>"#;
		let root = parse_xml(xml).unwrap();
		let folder = Folder::from_xml(&root, "").unwrap();

		assert_eq!("imgfs", folder.meta.name);
		assert_eq!(1, folder.folders.len());
		let a = folder.folder("a").unwrap();
		assert_eq!(1, a.files.len());
		assert_eq!("xyz", a.files[0].meta.name);
		assert_eq!(0, a.files[0].start);
		assert_eq!(3, a.files[0].size);
	}

	#[test]
	fn recognizes_super_backref_file()
	{
		let xml = br#"<imgfs><xyz><i>1</i></xyz></imgfs>"#;
		let root = parse_xml(xml).unwrap();
		let folder = Folder::from_xml(&root, "").unwrap();
		assert_eq!(1, folder.files.len());
		match &folder.files[0].origin
		{
			Origin::FromSuperSlot { super_index, .. } => assert_eq!(0, *super_index),
			other => panic!("expected FromSuperSlot, got {other:?}"),
		}
	}

	#[test]
	fn emit_xml_round_trips_offsets_and_padding()
	{
		let mut meta = NodeMeta::new("imgfs", "", 1700000000);
		meta.packed_name = "imgfs".to_string();
		let mut root = Folder::new(meta);

		let mut file_meta = NodeMeta::new("xyz", "imgfs", 1700000000);
		file_meta.packed_name = "xyz".to_string();
		let mut file = File::new(file_meta, Origin::FromDisk { base_path: std::path::PathBuf::new() });
		file.kind = crate::tree::file::FileKind::Generic;
		// Force a disk read of a tempfile with known contents.
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("xyz");
		std::fs::write(&path, b"abc").unwrap();
		file.origin = Origin::FromDisk { base_path: path };
		root.files.push(file);

		let mut blob = Vec::new();
		let mut cache = crate::cache::CachePolicy::new(false);
		let xml = root.emit_xml(&mut blob, &mut cache).unwrap();

		assert_eq!(0, blob.len() % 16);
		let file_el = xml.child("xyz").unwrap();
		assert_eq!("0 3 1700000000", file_el.text.as_deref().unwrap());
	}
}
