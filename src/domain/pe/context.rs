use std::fmt;

use crate::domain::constants::DATA_DIRECTORY_SIZE;

/// Optional header width selected once by the header parser.
///
/// Only the fields that differ between the two layouts and are used after
/// parsing are carried here; everything else lives in [`ImageContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32 { image_base: u32 },
    Pe32Plus { image_base: u64 },
}

impl OptionalHeader {
    #[must_use]
    pub fn image_base(&self) -> u64 {
        match *self {
            OptionalHeader::Pe32 { image_base } => u64::from(image_base),
            OptionalHeader::Pe32Plus { image_base } => image_base,
        }
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        match self {
            OptionalHeader::Pe32 { .. } => ImageFormat::Pe32,
            OptionalHeader::Pe32Plus { .. } => ImageFormat::Pe32Plus,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Pe32,
    Pe32Plus,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Pe32 => f.write_str("PE32"),
            ImageFormat::Pe32Plus => f.write_str("PE32+"),
        }
    }
}

/// A data directory descriptor and the file offset where it is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataDirectoryEntry {
    /// File offset of the 8-byte descriptor itself
    pub entry_offset: u64,
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectoryEntry {
    /// File offset just past the descriptor.
    #[must_use]
    pub fn entry_end(&self) -> u64 {
        self.entry_offset + DATA_DIRECTORY_SIZE as u64
    }
}

/// Normalized view of one PE/COFF image, expressed as offsets into the buffer
/// it was parsed from. Produced only by [`super::parse_image`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageContext {
    pub optional_header: OptionalHeader,
    /// File offset of the "PE\0\0" signature (0 for images without a DOS stub)
    pub pe_header_offset: u64,
    pub machine: u16,
    pub entry_point: u32,
    /// Declared SizeOfImage
    pub image_size: u32,
    pub size_of_headers: u32,
    pub size_of_optional_header: u16,
    pub number_of_sections: u16,
    pub number_of_rva_and_sizes: u32,
    /// File offset of the first section header
    pub first_section_offset: u64,
    /// File offset of the 4-byte CheckSum field
    pub checksum_offset: u64,
    pub reloc_dir: DataDirectoryEntry,
    pub security_dir: DataDirectoryEntry,
    /// Sum of every section's SizeOfRawData
    pub sum_of_section_bytes: u32,
}

impl ImageContext {
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.optional_header.format()
    }

    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.optional_header.image_base()
    }
}
