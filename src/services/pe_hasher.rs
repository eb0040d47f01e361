//! `PeHasher` service: the Apple Authenticode-like SHA-256 digest of a PE image.
//!
//! Byte selection, in order:
//! - the 64-byte DOS header
//! - PE header up to the CheckSum field; CheckSum itself is skipped
//! - the rest of the headers, minus the 8-byte security directory descriptor
//!   when the image declares one
//! - section raw data in file order, including gaps ("code caves") between sections
//! - the signature entry preceding the Apple signature directory
//! - anything after the signature directory
//!
//! Images are signed over exactly these ranges, so none of them may be merged
//! or reordered.

use sha2::{Digest, Sha256};

use crate::domain::constants::{
    APPLE_SIGDIR_SIGNATURE_DIRECTORY_SIZE, APPLE_SIGNATURE_SECENTRY_SIZE, CHECKSUM_SIZE,
    DIRECTORY_ENTRY_SECURITY, DOS_HEADER_SIZE,
};
use crate::domain::crypto::ImageDigest;
use crate::domain::cursor::{checked_offset, ByteView};
use crate::domain::pe::{parse_image, read_sections, sorted_by_file_offset, ImageContext};
use crate::infra::error::{VerifyError, VerifyResult};

/// Feeds selected ranges of an image into SHA-256 with range tracing.
struct RangeHasher<'a> {
    view: ByteView<'a>,
    sha: Sha256,
}

impl<'a> RangeHasher<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            view: ByteView::new(data),
            sha: Sha256::new(),
        }
    }

    fn hash_range(&mut self, what: &'static str, start: u64, end: u64) -> VerifyResult<()> {
        let bytes = self.view.range(what, start, end)?;
        log::trace!("hash {what}: [{start:#x}, {end:#x})");
        self.sha.update(bytes);
        Ok(())
    }

    fn hash_bytes(&mut self, what: &'static str, offset: u64, len: u64) -> VerifyResult<()> {
        let bytes = self.view.bytes(what, offset, len)?;
        log::trace!("hash {what}: {offset:#x} +{len:#x}");
        self.sha.update(bytes);
        Ok(())
    }

    fn finish(self) -> ImageDigest {
        ImageDigest::new(self.sha.finalize().into())
    }
}

fn malformed_section(msg: String) -> VerifyError {
    log::debug!("Digest failure: {msg}");
    VerifyError::MalformedSection(msg)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeHasher;

impl PeHasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `data` and digest it.
    pub fn hash(&self, data: &[u8]) -> VerifyResult<ImageDigest> {
        let ctx = parse_image(data)?;
        self.digest(data, &ctx)
    }

    /// Digest an image whose headers were already parsed into `ctx`.
    pub fn digest(&self, data: &[u8], ctx: &ImageContext) -> VerifyResult<ImageDigest> {
        let mut hasher = RangeHasher::new(data);
        let size_of_headers = u64::from(ctx.size_of_headers);

        hasher.hash_bytes("DOS header", 0, DOS_HEADER_SIZE as u64)?;
        hasher.hash_range("PE header", ctx.pe_header_offset, ctx.checksum_offset)?;
        let after_checksum = ctx.checksum_offset + CHECKSUM_SIZE as u64;

        if ctx.number_of_rva_and_sizes <= DIRECTORY_ENTRY_SECURITY {
            hasher.hash_range("optional header", after_checksum, size_of_headers)?;
        } else {
            let security = ctx.security_dir;
            let reloc = ctx.reloc_dir;
            // The skipped window is exactly the security descriptor only if the
            // relocation descriptor follows it.
            if reloc.entry_offset < security.entry_end() {
                return Err(VerifyError::MalformedHeader(format!(
                    "relocation directory entry {:#x} precedes end of security entry {:#x}",
                    reloc.entry_offset,
                    security.entry_end()
                )));
            }
            hasher.hash_range("optional header", after_checksum, security.entry_offset)?;
            hasher.hash_range("data directories", reloc.entry_offset, size_of_headers)?;
        }

        let view = ByteView::new(data);
        let sections = sorted_by_file_offset(read_sections(&view, ctx)?);

        let mut bytes_hashed = size_of_headers;
        let mut section_end: u64 = 0;
        for (index, section) in sections.iter().enumerate() {
            if section.size_of_raw_data == 0 {
                continue;
            }
            let start = u64::from(section.pointer_to_raw_data);
            if start != section_end && index > 0 {
                let cave = start.checked_sub(section_end).ok_or_else(|| {
                    malformed_section(format!(
                        "section at {start:#x} overlaps previous section ending at {section_end:#x}"
                    ))
                })?;
                hasher
                    .hash_bytes("code cave", section_end, cave)
                    .map_err(|e| malformed_section(format!("code cave outside image: {e}")))?;
                bytes_hashed = checked_offset("hashed byte count", bytes_hashed, cave)?;
            }

            let size = u64::from(section.size_of_raw_data);
            hasher
                .hash_bytes("section", start, size)
                .map_err(|e| malformed_section(format!("section raw data outside image: {e}")))?;
            section_end = section.end();
            bytes_hashed = checked_offset("hashed byte count", bytes_hashed, size)?;
        }

        let image_len = view.len();
        if image_len > bytes_hashed {
            let security = ctx.security_dir;
            let entry_size = u64::from(security.size);
            let directory = u64::from(security.virtual_address);
            let entry_start = directory.checked_sub(entry_size).ok_or_else(|| {
                VerifyError::MalformedHeader(format!(
                    "security entry of {entry_size:#x} bytes does not fit before {directory:#x}"
                ))
            })?;
            hasher.hash_bytes("signature entry", entry_start, entry_size)?;

            let signature_directory_size = u64::from(view.u32_le(
                "SignatureDirectorySize",
                directory + APPLE_SIGDIR_SIGNATURE_DIRECTORY_SIZE as u64,
            )?);
            bytes_hashed = checked_offset(
                "hashed byte count",
                bytes_hashed,
                entry_size + APPLE_SIGNATURE_SECENTRY_SIZE + signature_directory_size,
            )?;
        }

        if image_len > bytes_hashed {
            hasher.hash_range("trailing data", bytes_hashed, image_len)?;
        }

        let digest = hasher.finish();
        log::debug!("Image digest: {digest}");
        Ok(digest)
    }
}
