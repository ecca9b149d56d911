#![allow(non_snake_case, non_upper_case_globals)]

/*!
Top-level extract/repack driver tying the container, tree, texture, and
super-reference modules together into the two operations a caller actually
wants: turning an IFS file into a directory, and turning a directory back
into an IFS file.
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cache::CachePolicy;
use crate::container::Container;
use crate::error::IfsError;
use crate::options::{ExtractOptions, RepackOptions};
use crate::tree::file::File;
use crate::tree::folder::Folder;
use crate::tree::node::Origin;
use crate::tree::super_ref;
use crate::xmldoc;

/// An IFS file loaded from either a container or a directory, ready to be
/// extracted to disk or repacked back into container bytes.
pub struct Archive
{
	pub root: Folder,
	pub data_blob: Vec<u8>,
	pub creation_time: u32,
}

impl Archive
{
	/// Parse an IFS container from `path` and resolve its `_super_`
	/// references against sibling files in the same directory.
	pub fn load_ifs(path: &Path, super_policy: super_ref::SuperPolicy) -> Result<Self>
	{
		let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
		let container = Container::read(&bytes).with_context(|| format!("Failed to parse IFS container {}", path.display()))?;
		let mut root = container.root;

		if !matches!(super_policy, super_ref::SuperPolicy::Disabled)
		{
			let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
			super_ref::resolve(&mut root, base_dir, super_policy)
				.with_context(|| format!("Failed to resolve super references for {}", path.display()))?;
		}

		return Ok(Self { root, data_blob: container.data_blob, creation_time: container.header.creation_time });
	}

	/// Build a tree from a directory on disk, ready for [`Archive::repack`].
	pub fn load_dir(path: &Path) -> Result<Self>
	{
		if !path.is_dir()
		{
			return Err(IfsError::InvalidFilesystemInput(path.to_path_buf()).into());
		}

		let mtime = fs::metadata(path)
			.and_then(|m| m.modified())
			.map(|t| t.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(-1))
			.unwrap_or(-1);

		let mut root = Folder::from_filesystem(path, "", true).with_context(|| format!("Failed to walk {}", path.display()))?;
		crate::tree::tree_complete(&mut root, true).context("Failed to run tree-complete pass")?;

		return Ok(Self { root, data_blob: Vec::new(), creation_time: mtime.try_into().unwrap_or(0) });
	}

	/// Extract every file in the tree under `out_dir`, recreating folder
	/// structure and timestamps. Recurses into nested `.ifs` files when
	/// `options.recursive` is set.
	pub fn extract_all(&self, out_dir: &Path, options: &ExtractOptions, cache: &mut CachePolicy) -> Result<()>
	{
		let _ = cache;
		if options.texture_only && self.root.folder("tex").is_none()
		{
			return Ok(());
		}

		fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;
		stamp_mtime(out_dir, self.creation_time);

		if options.extract_manifest
		{
			self.write_manifest(out_dir)?;
		}

		self.extract_folder(&self.root, out_dir, options)?;
		return Ok(());
	}

	fn write_manifest(&self, out_dir: &Path) -> Result<()>
	{
		let mut blob = Vec::new();
		let mut cache = CachePolicy::new(false);
		let element = self.root.emit_xml(&mut blob, &mut cache)?;
		let xml = xmldoc::to_plain_xml(&element).context("Failed to render ifs_manifest.xml")?;
		let manifest_path = out_dir.join("ifs_manifest.xml");
		fs::write(&manifest_path, xml).with_context(|| format!("Failed to write {}", manifest_path.display()))?;
		return Ok(());
	}

	fn extract_folder(&self, folder: &Folder, dir: &Path, options: &ExtractOptions) -> Result<()>
	{
		if options.texture_only && !folder.meta.path.is_empty() && folder.meta.name != "tex"
		{
			// Only descend into non-root folders that are or contain `tex`.
			if folder.folder("tex").is_none() && !subtree_has_tex(folder)
			{
				return Ok(());
			}
		}

		for file in &folder.files
		{
			if options.texture_only && !file.is_image()
			{
				continue;
			}
			if matches!(file.origin, Origin::FromSuperSlot { .. })
			{
				warn!(path = %file.meta.full_path(), "super reference left unresolved, skipping");
				continue;
			}
			self.extract_file(file, dir, options)?;
		}

		for sub in &folder.folders
		{
			if options.texture_only && sub.meta.name != "tex" && !subtree_has_tex(sub)
			{
				continue;
			}
			let sub_dir = dir.join(&sub.meta.name);
			fs::create_dir_all(&sub_dir).with_context(|| format!("Failed to create {}", sub_dir.display()))?;
			stamp_mtime(&sub_dir, if sub.meta.time >= 0 { sub.meta.time as u32 } else { self.creation_time });
			self.extract_folder(sub, &sub_dir, options)?;
		}

		return Ok(());
	}

	fn extract_file(&self, file: &File, dir: &Path, options: &ExtractOptions) -> Result<()>
	{
		let mut dest_name = file.meta.name.clone();
		let mut dest = dir.join(&dest_name);

		if file.is_image()
		{
			dest.set_extension("png");
			dest_name = dest.file_name().unwrap().to_string_lossy().into_owned();
		}

		if dest.exists() && options.rename_dupes
		{
			dest = rename_dupe(dir, &dest_name);
		}

		let bytes = file.extract(Some(&self.data_blob)).with_context(|| format!("Failed to extract {}", file.meta.full_path()))?;
		fs::write(&dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;
		if file.meta.time >= 0
		{
			stamp_mtime(&dest, file.meta.time as u32);
		}
		info!(path = %dest.display(), "extracted");

		if options.recursive && file.meta.name.ends_with(".ifs")
		{
			let nested = Archive::load_ifs(&dest, options.super_policy)?;
			let nested_out = dir.join(dest_name.replace(".ifs", "_ifs"));
			nested.extract_all(&nested_out, options, &mut CachePolicy::new(false))?;
		}

		return Ok(());
	}

	/// Prewarm every image file's compression cache in parallel, then
	/// serially emit the manifest and data blob. Returns the bytes of a
	/// complete IFS container.
	pub fn repack(&mut self, options: &RepackOptions, creation_time: u32) -> Result<Vec<u8>>
	{
		let cache = CachePolicy::new(options.recache);

		let needs_preload: Vec<&File> = self.root.all_files().into_iter().filter(|f| f.needs_preload(&cache)).collect();
		let failures: Vec<(String, anyhow::Error)> = needs_preload
			.into_par_iter()
			.filter_map(|f| {
				let mut local_cache = CachePolicy::new(options.recache);
				match f.repack(&mut local_cache)
				{
					Ok(_) => None,
					Err(err) => Some((f.meta.full_path(), err)),
				}
			})
			.collect();

		for (path, err) in failures
		{
			warn!(path, error = %err, "failed to prewarm texture cache");
		}

		let mut cache = cache;
		return Container::write(&mut self.root, creation_time, &mut cache);
	}
}

fn subtree_has_tex(folder: &Folder) -> bool
{
	if folder.meta.name == "tex"
	{
		return true;
	}
	return folder.folders.iter().any(subtree_has_tex);
}

fn rename_dupe(dir: &Path, name: &str) -> PathBuf
{
	let path = Path::new(name);
	let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
	let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

	for n in 1..
	{
		let candidate = match &ext
		{
			Some(ext) => format!("{stem} ({n}).{ext}"),
			None => format!("{stem} ({n})"),
		};
		let candidate_path = dir.join(&candidate);
		if !candidate_path.exists()
		{
			return candidate_path;
		}
	}
	unreachable!();
}

fn stamp_mtime(path: &Path, unix_secs: u32)
{
	let time = UNIX_EPOCH + std::time::Duration::from_secs(unix_secs as u64);
	if let Ok(file) = fs::File::open(path)
	{
		let _ = file.set_modified(time);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::tree::node::{NodeMeta, Origin};

	#[test]
	fn repack_then_extract_round_trips_a_generic_file()
	{
		let src_dir = tempfile::tempdir().unwrap();
		fs::write(src_dir.path().join("hello.txt"), b"hello world").unwrap();

		let mut archive = Archive::load_dir(src_dir.path()).unwrap();
		let bytes = archive.repack(&RepackOptions::default(), 1700000000).unwrap();

		let ifs_path = src_dir.path().join("out.ifs");
		fs::write(&ifs_path, &bytes).unwrap();

		let loaded = Archive::load_ifs(&ifs_path, super_ref::SuperPolicy::Warn).unwrap();
		let out_dir = tempfile::tempdir().unwrap();
		let mut cache = CachePolicy::new(false);
		loaded.extract_all(out_dir.path(), &ExtractOptions::default(), &mut cache).unwrap();

		let extracted = fs::read(out_dir.path().join("hello.txt")).unwrap();
		assert_eq!(b"hello world", extracted.as_slice());
	}

	#[test]
	fn extract_all_skips_non_tex_subtrees_in_texture_only_mode()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));
		root.files.push(File::new(NodeMeta::new("readme.txt", "imgfs", -1), Origin::FromIfs { start: 0, size: 0 }));
		let archive = Archive { root, data_blob: Vec::new(), creation_time: 1700000000 };

		let out_dir = tempfile::tempdir().unwrap();
		let options = ExtractOptions { texture_only: true, ..ExtractOptions::default() };
		let mut cache = CachePolicy::new(false);
		archive.extract_all(out_dir.path(), &options, &mut cache).unwrap();

		assert!(!out_dir.path().join("readme.txt").exists());
	}

	#[test]
	fn extract_all_skips_unresolved_super_backrefs_instead_of_failing()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));
		root.files.push(File::new(NodeMeta::new("local.txt", "imgfs", -1), Origin::FromIfs { start: 0, size: 0 }));
		root.files.push(File::new(
			NodeMeta::new("backref.txt", "imgfs", -1),
			Origin::FromSuperSlot { super_index: 0, md5: None },
		));
		let archive = Archive { root, data_blob: Vec::new(), creation_time: 1700000000 };

		let out_dir = tempfile::tempdir().unwrap();
		let mut cache = CachePolicy::new(false);
		archive.extract_all(out_dir.path(), &ExtractOptions::default(), &mut cache).unwrap();

		assert!(out_dir.path().join("local.txt").exists());
		assert!(!out_dir.path().join("backref.txt").exists());
	}
}
