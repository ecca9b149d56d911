#![allow(non_snake_case, non_upper_case_globals)]

//! The manifest tree model: nodes, files, folders, texture-folder upgrades,
//! and super-reference resolution.

pub mod file;
pub mod folder;
pub mod node;
pub mod super_ref;
pub mod texture;

use anyhow::Result;

use crate::xmldoc;
use folder::Folder;

/// Names of folders this format treats as MD5-keyed texture lists.
const TEX_FOLDER_NAME: &str = "tex";
const AFP_FOLDER_NAME: &str = "afp";
/// Extensions a tex folder's plaintext names may carry on disk that its
/// MD5 hashes don't (afp's own names, and its `bsi`/`geo` siblings, never do).
const TEXTURE_EXTENSIONS: &[&str] = &[".png"];

/**
Run the single bottom-up mutation pass every node goes through exactly once
after construction: MD5 filename deobfuscation and, for `tex` folders, the
generic-to-image reclassification (extraction) or the unconditional format
rewrite (repack). An `afp` folder additionally deobfuscates its own `bsi`
subfolder against its plain names and its parent's sibling `geo` folder
against `{name}_shape{n}` names synthesized from its info XML.

`from_filesystem` selects which of those two repack/extract-specific steps
runs; a folder built from a directory walk carries its texturelist as a
plain `.xml` file among its children rather than as an already-parsed
`_info_` node, so that file is located and parsed here first.
*/
pub fn tree_complete(folder: &mut Folder, from_filesystem: bool) -> Result<()>
{
	for sub in &mut folder.folders
	{
		tree_complete(sub, from_filesystem)?;
	}

	for idx in 0..folder.folders.len()
	{
		if folder.folders[idx].meta.name == AFP_FOLDER_NAME
		{
			texture::apply_afp_geo(folder, idx)?;
		}
	}

	let is_md5_folder = folder.meta.name == TEX_FOLDER_NAME || folder.meta.name == AFP_FOLDER_NAME;
	if !is_md5_folder
	{
		return Ok(());
	}

	if from_filesystem && folder.info.is_none()
	{
		if let Some(idx) = folder.files.iter().position(|f| f.meta.name.ends_with(".xml"))
		{
			let info_file = folder.files.remove(idx);
			let bytes = info_file.raw_bytes(None)?;
			folder.info = Some(xmldoc::parse_xml(&bytes)?);
		}
	}

	let md5_tag = if folder.meta.name == TEX_FOLDER_NAME { "image" } else { AFP_FOLDER_NAME };
	let extensions = if folder.meta.name == TEX_FOLDER_NAME { TEXTURE_EXTENSIONS } else { &[] };
	texture::apply_md5(folder, md5_tag, "utf-8", extensions)?;

	if folder.meta.name == TEX_FOLDER_NAME
	{
		if from_filesystem
		{
			texture::upgrade_textures(folder)?;
			texture::rewrite_formats_for_repack(folder);
		}
		else
		{
			texture::upgrade_textures(folder)?;
		}
	}

	return Ok(());
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::tree::file::{File, FileKind};
	use crate::tree::node::{NodeMeta, Origin};
	use crate::xmldoc::Element;

	#[test]
	fn tree_complete_upgrades_a_tex_folder_built_from_xml()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));
		let mut tex = Folder::new(NodeMeta::new(TEX_FOLDER_NAME, "imgfs", -1));
		tex.files.push(File::new(NodeMeta::new("foo", "imgfs/tex", -1), Origin::FromIfs { start: 0, size: 16 }));
		tex.info = Some(
			Element::new("texturelist").push(
				Element::new("texture")
					.attr("name", "grp")
					.attr("format", "argb8888rev")
					.push(Element::new("size").attr("imgrect", "0 8 0 8"))
					.push(Element::new("image").attr("name", "foo")),
			),
		);
		root.folders.push(tex);

		tree_complete(&mut root, false).unwrap();

		let tex = root.folder(TEX_FOLDER_NAME).unwrap();
		assert!(matches!(tex.files[0].kind, FileKind::Image(_)));
	}

	#[test]
	fn tree_complete_synthesizes_afp_geo_shape_names()
	{
		let mut root = Folder::new(NodeMeta::new("imgfs", "", -1));

		let mut afp = Folder::new(NodeMeta::new(AFP_FOLDER_NAME, "imgfs", -1));
		afp.info = Some(
			Element::new("afplist").push(
				Element::new("afp").attr("name", "grp").push(Element::with_text("geo", "0 1")),
			),
		);
		let mut bsi = Folder::new(NodeMeta::new("bsi", "imgfs/afp", -1));
		bsi.files.push(File::new(
			NodeMeta::new(format!("{:x}", md5::compute(b"grp")), "imgfs/afp/bsi", -1),
			Origin::FromIfs { start: 0, size: 0 },
		));
		afp.folders.push(bsi);
		root.folders.push(afp);

		let mut geo = Folder::new(NodeMeta::new("geo", "imgfs", -1));
		geo.files.push(File::new(
			NodeMeta::new(format!("{:x}", md5::compute(b"grp_shape0")), "imgfs/geo", -1),
			Origin::FromIfs { start: 0, size: 0 },
		));
		root.folders.push(geo);

		tree_complete(&mut root, false).unwrap();

		let bsi = root.folder(AFP_FOLDER_NAME).unwrap().folder("bsi").unwrap();
		assert_eq!("grp", bsi.files[0].meta.name);

		let geo = root.folder("geo").unwrap();
		assert_eq!("grp_shape0", geo.files[0].meta.name);
	}
}
