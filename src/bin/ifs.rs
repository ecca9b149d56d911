#![allow(non_snake_case, non_upper_case_globals)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use ifs_tool::tree::super_ref::SuperPolicy;
use ifs_tool::{Archive, CachePolicy, ExtractOptions, RepackOptions};

/// Convert IFS container files to directories and back.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli
{
	/// IFS files to extract, or directories to repack.
	#[arg(required = true)]
	paths: Vec<PathBuf>,

	/// Write output under this directory instead of alongside the input.
	#[arg(short = 'o', long = "out-dir")]
	out_dir: Option<PathBuf>,

	/// Only extract/process the `tex`/`afp` texture subtrees.
	#[arg(long)]
	tex_only: bool,

	/// Bypass the texture compression cache entirely.
	#[arg(long)]
	no_cache: bool,

	/// Do not recurse into nested `.ifs` files found during extraction.
	#[arg(short = 'r', long = "norecurse")]
	norecurse: bool,

	/// Rename files that collide case-insensitively instead of overwriting.
	#[arg(long)]
	rename_dupes: bool,

	/// Also write the decoded manifest as `ifs_manifest.xml`.
	#[arg(short = 'm', long)]
	extract_manifest: bool,

	/// Skip files whose super reference fails its MD5 check, instead of warning.
	#[arg(long, conflicts_with = "super_abort_if_bad", conflicts_with = "super_disable")]
	super_skip_bad: bool,

	/// Abort extraction entirely if a super reference fails its MD5 check.
	#[arg(long, conflicts_with = "super_disable")]
	super_abort_if_bad: bool,

	/// Never follow `_super_` references at all.
	#[arg(long)]
	super_disable: bool,

	/// Suppress per-file progress messages.
	#[arg(short = 's', long)]
	silent: bool,

	/// Increase log verbosity (pass twice for trace-level output).
	#[arg(short = 'v', long, action = clap::ArgAction::Count)]
	verbose: u8,
}

impl Cli
{
	fn super_policy(&self) -> SuperPolicy
	{
		if self.super_disable
		{
			return SuperPolicy::Disabled;
		}
		if self.super_abort_if_bad
		{
			return SuperPolicy::Fatal;
		}
		if self.super_skip_bad
		{
			return SuperPolicy::Skip;
		}
		return SuperPolicy::Warn;
	}

	fn extract_options(&self) -> ExtractOptions
	{
		return ExtractOptions {
			texture_only: self.tex_only,
			recursive: !self.norecurse,
			super_policy: self.super_policy(),
			extract_manifest: self.extract_manifest,
			rename_dupes: self.rename_dupes,
		};
	}

	fn repack_options(&self) -> RepackOptions
	{
		return RepackOptions { recache: self.no_cache };
	}
}

fn init_logging(verbose: u8)
{
	let level = match verbose
	{
		0 => "warn",
		1 => "info",
		_ => "debug",
	};
	let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<()>
{
	for path in &cli.paths
	{
		if path.is_dir()
		{
			repack_one(cli, path)?;
		}
		else if path.is_file()
		{
			extract_one(cli, path)?;
		}
		else
		{
			anyhow::bail!("input path {} is neither a file nor a directory", path.display());
		}
	}
	return Ok(());
}

fn extract_one(cli: &Cli, path: &Path) -> Result<()>
{
	let options = cli.extract_options();
	let archive = Archive::load_ifs(path, options.super_policy).with_context(|| format!("Failed to load {}", path.display()))?;

	let default_out = path.with_extension("").with_file_name(format!(
		"{}_ifs",
		path.file_stem().unwrap_or_default().to_string_lossy()
	));
	let out_dir = cli.out_dir.clone().unwrap_or(default_out);

	let mut cache = CachePolicy::new(false);
	archive.extract_all(&out_dir, &options, &mut cache)?;
	if !cli.silent
	{
		println!("extracted {} -> {}", path.display(), out_dir.display());
	}
	return Ok(());
}

fn repack_one(cli: &Cli, path: &Path) -> Result<()>
{
	let mut archive = Archive::load_dir(path).with_context(|| format!("Failed to walk {}", path.display()))?;

	let default_out = path.with_extension("ifs");
	let out_path = match &cli.out_dir
	{
		Some(dir) => dir.join(default_out.file_name().unwrap_or_default()),
		None => default_out,
	};

	let creation_time = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs() as u32)
		.unwrap_or(0);

	let bytes = archive.repack(&cli.repack_options(), creation_time)?;
	std::fs::write(&out_path, &bytes).with_context(|| format!("Failed to write {}", out_path.display()))?;
	if !cli.silent
	{
		println!("repacked {} -> {}", path.display(), out_path.display());
	}
	return Ok(());
}

fn main() -> Result<()>
{
	let cli = Cli::parse();
	init_logging(cli.verbose);
	return run(&cli);
}
