#![allow(non_snake_case, non_upper_case_globals)]

/*!
Decides when a precompressed texture blob on disk may be reused instead of
re-decoding a PNG and re-running AVSLZ.

Cache files live at `{folder}/_cache/{packed_name}` next to the source
image; `CachePolicy` never keeps them in memory, it only reasons about their
mtimes, so a prewarm pass run under `rayon` can call [`CachePolicy::write`]
from multiple threads on disjoint files without coordination.
*/

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use anyhow::{Context, Result};

pub struct CachePolicy
{
	recache: bool,
}

impl CachePolicy
{
	pub fn new(recache: bool) -> Self
	{
		return Self { recache };
	}

	fn cache_path(base_path: &Path, packed_name: &str) -> PathBuf
	{
		let dir = base_path.parent().unwrap_or_else(|| Path::new("."));
		return dir.join("_cache").join(packed_name);
	}

	/// True iff a cache entry exists, is at least as new as `base_path`,
	/// and the caller hasn't forced a recache.
	pub fn is_reusable(&self, base_path: &Path, packed_name: &str) -> bool
	{
		if self.recache
		{
			return false;
		}

		let cache_path = Self::cache_path(base_path, packed_name);
		let (cache_mtime, source_mtime) = match (fs::metadata(&cache_path), fs::metadata(base_path))
		{
			(Ok(cache_meta), Ok(source_meta)) => match (cache_meta.modified(), source_meta.modified())
			{
				(Ok(c), Ok(s)) => (c, s),
				_ => return false,
			},
			_ => return false,
		};

		return cache_mtime >= source_mtime;
	}

	/// Read a previously cached, already-framed payload.
	pub fn read(&self, base_path: &Path, packed_name: &str) -> Result<Vec<u8>>
	{
		let cache_path = Self::cache_path(base_path, packed_name);
		return fs::read(&cache_path).with_context(|| format!("Failed to read cache file {}", cache_path.display()));
	}

	/// Write `data` to the cache and set its mtime to match the source
	/// image's mtime, so a later `is_reusable` check succeeds as long as
	/// the source hasn't changed since.
	pub fn write(&mut self, base_path: &Path, packed_name: &str, data: &[u8]) -> Result<()>
	{
		let cache_path = Self::cache_path(base_path, packed_name);
		let dir = cache_path.parent().context("cache path has no parent directory")?;
		fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
		fs::write(&cache_path, data).with_context(|| format!("Failed to write cache file {}", cache_path.display()))?;

		let source_mtime = fs::metadata(base_path)
			.and_then(|m| m.modified())
			.unwrap_or_else(|_| SystemTime::now());
		let cache_file = fs::File::options()
			.write(true)
			.open(&cache_path)
			.with_context(|| format!("Failed to reopen {} to set its mtime", cache_path.display()))?;
		cache_file
			.set_modified(source_mtime)
			.with_context(|| format!("Failed to set mtime on {}", cache_path.display()))?;

		return Ok(());
	}
}
