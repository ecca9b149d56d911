#![allow(non_snake_case, non_upper_case_globals)]

/*!
The MD5 folder and its specializations: deobfuscates on-disk filenames that
are MD5 hashes of their plaintext names, upgrades a tex folder's image files
with pixel format/compression/geometry, and synthesizes the afp folder's
`geo`-sibling shape backref names.
*/

use anyhow::{Context, Result};

use crate::pixel::PixelFormat;
use crate::tree::file::{FileKind, ImageExt, Rect};
use crate::tree::folder::Folder;
use crate::xmldoc::Element;

/// Collect every `name` attribute on a descendant tagged `md5_tag`,
/// anywhere under `root`.
fn collect_names(root: &Element, md5_tag: &str, out: &mut Vec<String>)
{
	if root.tag == md5_tag
	{
		if let Some(name) = root.attrs.get("name")
		{
			out.push(name.clone());
		}
	}
	for child in &root.children
	{
		collect_names(child, md5_tag, out);
	}
}

/**
Collect both the plain `name`-bearing elements tagged `md5_tag` and, for
each, the shape names synthesized from a direct `<geo>` child's
space-separated shape indices (`"{name}_shape{n}"`). Used by the afp
folder, whose info XML nests shape lists under the same elements its
plain names come from.
*/
fn collect_names_with_geo(root: &Element, md5_tag: &str, names: &mut Vec<String>, geo_names: &mut Vec<String>)
{
	if root.tag == md5_tag
	{
		if let Some(name) = root.attrs.get("name")
		{
			names.push(name.clone());
			for geo in root.children.iter().filter(|c| c.tag == "geo")
			{
				if let Some(text) = &geo.text
				{
					for shape in text.split_whitespace()
					{
						geo_names.push(format!("{name}_shape{shape}"));
					}
				}
			}
		}
	}
	for child in &root.children
	{
		collect_names_with_geo(child, md5_tag, names, geo_names);
	}
}

/// Hash every entry in `names`, renaming whichever of a hash, a plaintext
/// name, or a plaintext-plus-extension match is present in `folder.files`
/// to the plaintext name while recording the hash as `packed_name`.
fn apply_names(folder: &mut Folder, names: &[String], extensions: &[&str])
{
	for plaintext in names
	{
		let digest = md5::compute(plaintext.as_bytes());
		let hash = format!("{:x}", digest);

		if let Some(idx) = folder.files.iter().position(|f| f.meta.name == hash)
		{
			folder.files[idx].meta.name = plaintext.clone();
			folder.files[idx].meta.packed_name = hash;
			continue;
		}
		if let Some(idx) = folder.files.iter().position(|f| &f.meta.name == plaintext)
		{
			folder.files[idx].meta.packed_name = hash;
			continue;
		}
		for ext in extensions
		{
			let with_ext = format!("{plaintext}{ext}");
			if let Some(idx) = folder.files.iter().position(|f| f.meta.name == with_ext)
			{
				folder.files[idx].meta.name = plaintext.clone();
				folder.files[idx].meta.packed_name = hash;
				break;
			}
		}
	}
}

/**
Deobfuscate `folder`'s file names using its `_info_` XML: for each
`name`-bearing element tagged `md5_tag`, compute the MD5 hex of the name
(encoded per `encoding`) and rename the matching file to its plaintext
name, retaining the hash as `packed_name`.
*/
pub fn apply_md5(folder: &mut Folder, md5_tag: &str, encoding: &str, extensions: &[&str]) -> Result<()>
{
	let info = match &folder.info
	{
		Some(info) => info.clone(),
		None => return Ok(()),
	};
	anyhow::ensure!(encoding.eq_ignore_ascii_case("utf-8"), "only utf-8 encoded manifests are supported, got {encoding:?}");

	let mut names = Vec::new();
	collect_names(&info, md5_tag, &mut names);
	apply_names(folder, &names, extensions);

	return Ok(());
}

/**
The afp folder's extra pass, run after its own `apply_md5`: collect the
plain names and their synthesized `{name}_shapeN` geo names from the
folder's info XML, then deobfuscate its own `bsi` subfolder (if present)
against the plain names and the parent's sibling `geo` folder (if present)
against the synthesized geo names.
*/
pub fn apply_afp_geo(parent: &mut Folder, afp_idx: usize) -> Result<()>
{
	let info = match &parent.folders[afp_idx].info
	{
		Some(info) => info.clone(),
		None => return Ok(()),
	};

	let mut names = Vec::new();
	let mut geo_names = Vec::new();
	collect_names_with_geo(&info, "afp", &mut names, &mut geo_names);

	if let Some(bsi) = parent.folders[afp_idx].folder_mut("bsi")
	{
		apply_names(bsi, &names, &[]);
	}
	if let Some(geo) = parent.folder_mut("geo")
	{
		apply_names(geo, &geo_names, &[]);
	}

	return Ok(());
}

/// `<size imgrect="x0 x1 y0 y1" uvrect="x0 x1 y0 y1"/>`: the modeling this
/// crate uses for the otherwise-opaque per-texture geometry metadata.
/// See DESIGN.md.
fn parse_rect(text: &str) -> Result<Rect>
{
	let parts: Vec<i32> = text
		.split_whitespace()
		.map(|p| p.parse::<i32>().with_context(|| format!("bad rect component {p:?}")))
		.collect::<Result<_>>()?;
	anyhow::ensure!(parts.len() == 4, "rect {text:?} does not have exactly 4 components");
	return Ok(Rect::new(parts[0], parts[1], parts[2], parts[3]));
}

/**
Upgrade a `tex` folder's image files in place: for each
`<texture name=".." format="..">` child of the info XML, resolve
its `format`/compress, locate the named `<image>` file, and reclassify it
from `FileKind::Generic` to `FileKind::Image`.
*/
pub fn upgrade_textures(folder: &mut Folder) -> Result<()>
{
	let info = match &folder.info
	{
		Some(info) => info.clone(),
		None => return Ok(()),
	};
	let compress = info.attrs.get("compress").cloned();

	for texture in info.children.iter().filter(|c| c.tag == "texture")
	{
		let format_attr = texture.attrs.get("format").context("texture element missing format attribute")?;
		let format: PixelFormat = format_attr
			.parse()
			.with_context(|| format!("unsupported texture format {format_attr:?}"))?;

		let imgrect = match texture.child("size").and_then(|s| s.attrs.get("imgrect"))
		{
			Some(text) => parse_rect(text)?,
			None => Rect::new(0, 0, 0, 0),
		};
		let uvrect = match texture.child("size").and_then(|s| s.attrs.get("uvrect"))
		{
			Some(text) => parse_rect(text)?,
			None => imgrect,
		};

		for image_el in texture.children.iter().filter(|c| c.tag == "image")
		{
			let image_name = image_el.attrs.get("name").context("image element missing name attribute")?;
			if let Some(idx) = folder.files.iter().position(|f| &f.meta.name == image_name)
			{
				folder.files[idx].kind = FileKind::Image(ImageExt {
					format,
					compress: compress.clone(),
					imgrect,
					uvrect,
				});
			}
		}
	}

	return Ok(());
}

/**
On repack from disk, rewrite every `<texture format="...">` in `folder`'s
info XML to `argb8888rev` unconditionally — every entry is force-rewritten
rather than only the uncachable ones. See DESIGN.md.
*/
pub fn rewrite_formats_for_repack(folder: &mut Folder)
{
	let Some(info) = folder.info.as_mut() else { return };
	for texture in info.children.iter_mut().filter(|c| c.tag == "texture")
	{
		texture.attrs.insert("format".to_string(), "argb8888rev".to_string());
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::tree::file::File;
	use crate::tree::node::{NodeMeta, Origin};

	const TEXTURE_EXTENSIONS: &[&str] = &[".png"];

	fn file_named(name: &str) -> File
	{
		return File::new(NodeMeta::new(name, "tex", -1), Origin::FromIfs { start: 0, size: 0 });
	}

	#[test]
	fn apply_md5_renames_hashed_file_to_plaintext()
	{
		let mut folder = Folder::new(NodeMeta::new("tex", "", -1));
		let digest = format!("{:x}", md5::compute(b"foo"));
		folder.files.push(file_named(&digest));
		folder.info = Some(Element::new("texturelist").push(
			Element::new("texture").attr("name", "grp").attr("format", "argb8888rev").push(Element::new("image").attr("name", "foo")),
		));

		apply_md5(&mut folder, "image", "utf-8", TEXTURE_EXTENSIONS).unwrap();

		assert_eq!("foo", folder.files[0].meta.name);
		assert_eq!(digest, folder.files[0].meta.packed_name);
	}

	#[test]
	fn apply_md5_strips_extension_when_present()
	{
		let mut folder = Folder::new(NodeMeta::new("tex", "", -1));
		folder.files.push(file_named("foo.png"));
		folder.info = Some(Element::new("texturelist").push(
			Element::new("texture").attr("name", "grp").attr("format", "argb8888rev").push(Element::new("image").attr("name", "foo")),
		));

		apply_md5(&mut folder, "image", "utf-8", TEXTURE_EXTENSIONS).unwrap();
		assert_eq!("foo", folder.files[0].meta.name);
	}

	#[test]
	fn upgrade_textures_reclassifies_matching_image_file()
	{
		let mut folder = Folder::new(NodeMeta::new("tex", "", -1));
		folder.files.push(file_named("foo"));
		folder.info = Some(
			Element::new("texturelist").attr("compress", "avslz").push(
				Element::new("texture")
					.attr("name", "grp")
					.attr("format", "argb8888rev")
					.push(Element::new("size").attr("imgrect", "0 8 0 8"))
					.push(Element::new("image").attr("name", "foo")),
			),
		);

		upgrade_textures(&mut folder).unwrap();
		match &folder.files[0].kind
		{
			FileKind::Image(ext) =>
			{
				assert_eq!(PixelFormat::Argb8888Rev, ext.format);
				assert_eq!(Some("avslz".to_string()), ext.compress);
				assert_eq!((4, 4), ext.imgrect.img_size());
			}
			other => panic!("expected an upgraded image file, got {other:?}"),
		}
	}

	#[test]
	fn rewrite_formats_for_repack_forces_argb8888rev()
	{
		let mut folder = Folder::new(NodeMeta::new("tex", "", -1));
		folder.info = Some(Element::new("texturelist").push(Element::new("texture").attr("name", "grp").attr("format", "dxt5")));

		rewrite_formats_for_repack(&mut folder);
		let texture = folder.info.as_ref().unwrap().child("texture").unwrap();
		assert_eq!("argb8888rev", texture.attrs["format"]);
	}
}
