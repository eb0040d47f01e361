//! PE/COFF domain types and header parsing.
//!
//! Provides the normalized [`ImageContext`] produced by [`parse_image`] and the
//! [`SectionRecord`] scratch type consumed by the digest engine. Nothing here
//! owns image memory; every field is an offset or length into the caller's buffer.

mod context;
mod parse;
mod section;

pub use context::{DataDirectoryEntry, ImageContext, ImageFormat, OptionalHeader};
pub use parse::parse_image;
pub use section::{read_sections, sorted_by_file_offset, SectionRecord};
