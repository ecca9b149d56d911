#![allow(non_snake_case, non_upper_case_globals)]

/**
Typed error kinds for the IFS container/manifest/texture core.

These are the semantic failures called out in the design ("Error Handling
Design"); everything else propagates as `anyhow::Error` with `.context(...)`
breadcrumbs the way the rest of this crate reports failures. `CacheMiss` is
intentionally not part of this enum — it is an internal signal used only
inside the cache module and is never surfaced to a caller.
*/
#[derive(Debug, thiserror::Error)]
pub enum IfsError
{
	#[error("not an IFS file: bad signature {0:#010x}")]
	InvalidContainer(u32),

	#[error("IFS file version mismatch: version {version:#06x}, complement {complement:#06x}")]
	BadVersionComplement { version: u16, complement: u16 },

	#[error("file entry start+size ({start}+{size}) exceeds data blob length {blob_len}")]
	TruncatedPayload { start: u32, size: u32, blob_len: usize },

	#[error("failed to decode manifest binary XML")]
	BadBinaryXml,

	#[error("super entry not found for file {0:?}")]
	MissingSuper(String),

	#[error("super reference {0:?} has a checksum mismatch")]
	MismatchSuper(String),

	#[error("unsupported pixel/compression format {0:?}")]
	UnsupportedFormat(String),

	#[error("input path {0:?} is neither a file nor a directory")]
	InvalidFilesystemInput(std::path::PathBuf),
}
