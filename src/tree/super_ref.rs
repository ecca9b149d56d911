#![allow(non_snake_case, non_upper_case_globals)]

/*!
Resolves `_super_` references to sibling IFS files and the `<i>` backrefs
that point into them.

Chained supers — a super file that itself names a `_super_` — are not
followed; only one level of indirection is resolved. See DESIGN.md.
*/

use std::path::Path;
use std::sync::Arc;
use anyhow::{Context, Result};
use tracing::warn;

use crate::container::Container;
use crate::error::IfsError;
use crate::tree::folder::Folder;
use crate::tree::node::Origin;

/// What to do when a super's manifest MD5 doesn't match the `<md5>` a
/// backref recorded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuperPolicy
{
	Fatal,
	Warn,
	Skip,
	Disabled,
}

struct LoadedSuper
{
	container: Container,
	md5_matches: bool,
}

/// Load every IFS named in `root.supers`, relative to `base_dir`, and
/// rewrite every `Origin::FromSuperSlot` file in the tree into
/// `Origin::FromSuperIfs` by looking it up in the corresponding super's
/// flat file list.
pub fn resolve(root: &mut Folder, base_dir: &Path, policy: SuperPolicy) -> Result<()>
{
	if root.supers.is_empty()
	{
		return Ok(());
	}

	let mut loaded = Vec::with_capacity(root.supers.len());
	for super_path in &root.supers
	{
		let path = base_dir.join(super_path);
		let bytes = std::fs::read(&path).with_context(|| format!("Failed to read super IFS {}", path.display()))?;
		let container = Container::read(&bytes).with_context(|| format!("Failed to parse super IFS {}", path.display()))?;
		loaded.push(LoadedSuper { container, md5_matches: true });
	}

	for file in root.all_files_mut()
	{
		let (super_index, md5) = match &file.origin
		{
			Origin::FromSuperSlot { super_index, md5 } => (*super_index, md5.clone()),
			_ => continue,
		};

		let super_entry = loaded
			.get_mut(super_index)
			.with_context(|| format!("super index {super_index} has no corresponding _super_ entry"))?;

		if let Some(expected) = &md5
		{
			let actual = super_entry
				.container
				.header
				.manifest_md5
				.map(|bytes| bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
				.unwrap_or_default();
			if !actual.eq_ignore_ascii_case(expected)
			{
				super_entry.md5_matches = false;
				match policy
				{
					SuperPolicy::Fatal => return Err(IfsError::MismatchSuper(file.meta.name.clone()).into()),
					SuperPolicy::Warn =>
					{
						warn!(file = %file.meta.name, "super manifest MD5 mismatch, keeping file anyway");
					}
					SuperPolicy::Skip | SuperPolicy::Disabled => {}
				}
			}
		}

		if !super_entry.md5_matches && matches!(policy, SuperPolicy::Skip)
		{
			warn!(file = %file.meta.name, "skipping file: its super's manifest MD5 did not match");
			continue;
		}

		let target = super_entry
			.container
			.root
			.all_files()
			.into_iter()
			.find(|f| f.meta.name == file.meta.name || f.meta.packed_name == file.meta.name);

		let target = match target
		{
			Some(t) => t,
			None => return Err(IfsError::MissingSuper(file.meta.name.clone()).into()),
		};

		let (start, size) = match target.origin
		{
			Origin::FromIfs { start, size } => (start, size),
			_ => return Err(IfsError::MissingSuper(file.meta.name.clone()).into()),
		};

		file.origin = Origin::FromSuperIfs { blob: Arc::new(super_entry.container.data_blob.clone()), start, size };
	}

	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::cache::CachePolicy;
	use crate::tree::file::File;
	use crate::tree::node::NodeMeta;

	#[test]
	fn resolves_backref_against_a_sibling_ifs()
	{
		let dir = tempfile::tempdir().unwrap();

		let mut super_root = Folder::new(NodeMeta::new("imgfs", "", -1));
		let super_file_dir = tempfile::tempdir().unwrap();
		let super_file_path = super_file_dir.path().join("xyz");
		std::fs::write(&super_file_path, b"abc").unwrap();
		let mut super_file = File::new(NodeMeta::new("xyz", "imgfs", -1), Origin::FromDisk { base_path: super_file_path });
		super_file.kind = crate::tree::file::FileKind::Generic;
		super_root.files.push(super_file);

		let mut cache = CachePolicy::new(false);
		let super_bytes = Container::write(&mut super_root, 1700000000, &mut cache).unwrap();
		std::fs::write(dir.path().join("a.ifs"), &super_bytes).unwrap();

		let mut main_root = Folder::new(NodeMeta::new("imgfs", "", -1));
		main_root.supers.push("a.ifs".to_string());
		main_root.files.push(File::new(
			NodeMeta::new("xyz", "imgfs", -1),
			Origin::FromSuperSlot { super_index: 0, md5: None },
		));

		resolve(&mut main_root, dir.path(), SuperPolicy::Fatal).unwrap();

		match &main_root.files[0].origin
		{
			Origin::FromSuperIfs { start, size, .. } => assert_eq!((0, 3), (*start, *size)),
			other => panic!("expected FromSuperIfs, got {other:?}"),
		}
	}
}
