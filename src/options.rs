#![allow(non_snake_case, non_upper_case_globals)]

//! Typed configuration surfaces for extraction and repacking, standing in
//! for the raw CLI flags so the library API doesn't depend on `clap`.

use crate::tree::super_ref::SuperPolicy;

#[derive(Clone, Debug)]
pub struct ExtractOptions
{
	/// Only extract/process texture (`tex`/`afp`) subtrees.
	pub texture_only: bool,
	/// Recursively extract any `.ifs` file found inside this one.
	pub recursive: bool,
	/// Policy applied when a `_super_` reference's MD5 doesn't match.
	pub super_policy: SuperPolicy,
	/// Also write the decoded manifest as `ifs_manifest.xml` at the root.
	pub extract_manifest: bool,
	/// When extraction finds two entries whose names differ only in case,
	/// rename the second with a numeric suffix instead of letting the
	/// second overwrite the first on a case-insensitive filesystem.
	pub rename_dupes: bool,
}

impl Default for ExtractOptions
{
	fn default() -> Self
	{
		return Self {
			texture_only: false,
			recursive: false,
			super_policy: SuperPolicy::Warn,
			extract_manifest: false,
			rename_dupes: false,
		};
	}
}

#[derive(Clone, Debug)]
pub struct RepackOptions
{
	/// Force every texture to bypass its compression cache.
	pub recache: bool,
}

impl Default for RepackOptions
{
	fn default() -> Self
	{
		return Self { recache: false };
	}
}
