//! Header parser: validates untrusted PE/COFF headers and builds an [`ImageContext`].
//!
//! Rules follow the EDK2-derived loader used by Apple's EFI signing tool. The
//! division-based section checks and the `<=` / `<` boundaries below are
//! deliberate and must not be "simplified".

use crate::domain::constants::*;
use crate::domain::cursor::ByteView;
use crate::infra::error::{VerifyError, VerifyResult};

use super::context::{DataDirectoryEntry, ImageContext, OptionalHeader};
use super::section::read_section;

/// Field positions that differ between the two optional header widths.
struct Layout {
    fixed_size: usize,
    number_of_rva_and_sizes: usize,
    data_directories: usize,
}

const PE32_LAYOUT: Layout = Layout {
    fixed_size: PE32_OPT_DATA_DIRECTORIES,
    number_of_rva_and_sizes: PE32_OPT_NUMBER_OF_RVA_AND_SIZES,
    data_directories: PE32_OPT_DATA_DIRECTORIES,
};

const PE32_PLUS_LAYOUT: Layout = Layout {
    fixed_size: PE32_PLUS_OPT_DATA_DIRECTORIES,
    number_of_rva_and_sizes: PE32_PLUS_OPT_NUMBER_OF_RVA_AND_SIZES,
    data_directories: PE32_PLUS_OPT_DATA_DIRECTORIES,
};

fn malformed(msg: &str) -> VerifyError {
    log::debug!("Rejecting image: {msg}");
    VerifyError::MalformedHeader(msg.to_string())
}

/// Locate the PE header: after the DOS stub when `MZ` is present, otherwise at 0.
fn locate_pe_header(view: &ByteView<'_>) -> VerifyResult<u64> {
    if view.u16_le("DOS magic", 0)? != DOS_MAGIC {
        log::debug!("No DOS header, treating buffer as a bare PE header");
        return Ok(0);
    }
    let e_lfanew = u64::from(view.u32_le("e_lfanew", DOS_LFANEW_OFFSET as u64)?);
    if e_lfanew > view.len() {
        return Err(VerifyError::OutOfBounds {
            what: "PE header offset",
            offset: e_lfanew,
            len: 0,
            size: view.len(),
        });
    }
    // Room for the whole optional header union at e_lfanew.
    if view.len() - (OPTIONAL_HEADER_UNION_SIZE as u64) < e_lfanew {
        return Err(VerifyError::OutOfBounds {
            what: "PE header",
            offset: e_lfanew,
            len: OPTIONAL_HEADER_UNION_SIZE as u64,
            size: view.len(),
        });
    }
    Ok(e_lfanew)
}

/// Optional header magic with the Itanium loader quirk applied: some ELILO
/// builds for IA64 carry the PE32 magic on a PE32+ header.
fn effective_magic(machine: u16, magic: u16) -> u16 {
    if machine == IMAGE_FILE_MACHINE_IA64 && magic == PE32_MAGIC {
        PE32_PLUS_MAGIC
    } else {
        magic
    }
}

fn read_directory(
    view: &ByteView<'_>,
    directories: u64,
    index: u32,
) -> VerifyResult<DataDirectoryEntry> {
    let entry_offset = directories + u64::from(index) * DATA_DIRECTORY_SIZE as u64;
    Ok(DataDirectoryEntry {
        entry_offset,
        virtual_address: view.u32_le("data directory VirtualAddress", entry_offset)?,
        size: view.u32_le("data directory Size", entry_offset + 4)?,
    })
}

/// Parse and validate the headers of a single PE/COFF image.
pub fn parse_image(data: &[u8]) -> VerifyResult<ImageContext> {
    let view = ByteView::new(data);

    if data.len() < MIN_IMAGE_HEADER_SIZE {
        log::debug!(
            "Rejecting image: {} bytes is below the {MIN_IMAGE_HEADER_SIZE} byte header minimum",
            data.len()
        );
        return Err(VerifyError::TruncatedInput {
            what: "image headers",
            needed: MIN_IMAGE_HEADER_SIZE as u64,
            actual: view.len(),
        });
    }

    let pe = locate_pe_header(&view)?;
    let file_header = pe + PE_SIGNATURE_SIZE as u64;
    let opt = pe + OPTIONAL_HEADER_OFFSET as u64;

    let machine = view.u16_le("Machine", file_header + FILE_HEADER_MACHINE as u64)?;
    let number_of_sections =
        view.u16_le("NumberOfSections", file_header + FILE_HEADER_NUMBER_OF_SECTIONS as u64)?;
    let size_of_optional_header = view.u16_le(
        "SizeOfOptionalHeader",
        file_header + FILE_HEADER_SIZE_OF_OPTIONAL_HEADER as u64,
    )?;
    let characteristics =
        view.u16_le("Characteristics", file_header + FILE_HEADER_CHARACTERISTICS as u64)?;
    let magic = effective_magic(machine, view.u16_le("optional header Magic", opt)?);

    let layout = match magic {
        PE32_MAGIC => &PE32_LAYOUT,
        PE32_PLUS_MAGIC => &PE32_PLUS_LAYOUT,
        other => return Err(malformed(&format!("Unsupported PE header magic {other:#06x}"))),
    };

    let number_of_rva_and_sizes = view.u32_le(
        "NumberOfRvaAndSizes",
        opt + layout.number_of_rva_and_sizes as u64,
    )?;
    if number_of_rva_and_sizes > NUMBER_OF_DIRECTORY_ENTRIES {
        return Err(malformed(&format!(
            "NumberOfRvaAndSizes {number_of_rva_and_sizes} exceeds {NUMBER_OF_DIRECTORY_ENTRIES} directory entries"
        )));
    }

    let fixed = layout.fixed_size as u32;
    let declared = u32::from(size_of_optional_header);
    if declared < fixed
        || declared - fixed != number_of_rva_and_sizes * DATA_DIRECTORY_SIZE as u32
    {
        return Err(malformed(&format!(
            "SizeOfOptionalHeader {declared} does not match {number_of_rva_and_sizes} data directories"
        )));
    }

    let section_header_offset = pe
        + (PE_SIGNATURE_SIZE + FILE_HEADER_SIZE) as u64
        + u64::from(size_of_optional_header);

    let image_size = view.u32_le("SizeOfImage", opt + OPT_SIZE_OF_IMAGE as u64)?;
    let size_of_headers = view.u32_le("SizeOfHeaders", opt + OPT_SIZE_OF_HEADERS as u64)?;
    let sections = u64::from(number_of_sections);
    let header_size = SECTION_HEADER_SIZE as u64;

    if u64::from(image_size) < section_header_offset
        || (u64::from(image_size) - section_header_offset) / header_size <= sections
    {
        return Err(malformed("Image sections overflow image size"));
    }
    if u64::from(size_of_headers) < section_header_offset
        || (u64::from(size_of_headers) - section_header_offset) / header_size < sections
    {
        return Err(malformed("Image sections overflow section headers"));
    }

    if view.u16_le("PE signature", pe)? != PE_SIGNATURE {
        return Err(malformed("Unsupported image type"));
    }
    if characteristics & IMAGE_FILE_RELOCS_STRIPPED != 0 {
        return Err(malformed("Unsupported image: relocations have been stripped"));
    }

    let optional_header = if magic == PE32_MAGIC {
        OptionalHeader::Pe32 {
            image_base: view.u32_le("ImageBase", opt + PE32_OPT_IMAGE_BASE as u64)?,
        }
    } else {
        OptionalHeader::Pe32Plus {
            image_base: view.u64_le("ImageBase", opt + PE32_PLUS_OPT_IMAGE_BASE as u64)?,
        }
    };

    let mut sum_of_section_bytes: u32 = 0;
    for index in 0..number_of_sections {
        let section = read_section(&view, section_header_offset, index)?;
        sum_of_section_bytes = sum_of_section_bytes
            .checked_add(section.size_of_raw_data)
            .ok_or_else(|| {
                log::debug!("Rejecting image: section raw sizes wrap at section {index}");
                VerifyError::IntegerOverflow(format!(
                    "sum of section raw sizes wraps at section {index}"
                ))
            })?;
    }
    if u64::from(sum_of_section_bytes) >= view.len() {
        log::debug!(
            "Rejecting image: sections claim {sum_of_section_bytes:#x} of {:#x} bytes",
            view.len()
        );
        return Err(VerifyError::MalformedSection(format!(
            "section raw data ({sum_of_section_bytes:#x} bytes) does not fit in image of {:#x} bytes",
            view.len()
        )));
    }

    if image_size < size_of_headers {
        return Err(malformed("SizeOfImage is smaller than SizeOfHeaders"));
    }

    let directories = opt + layout.data_directories as u64;
    // Storage of the security descriptor must be inside the buffer.
    let security_entry =
        directories + u64::from(DIRECTORY_ENTRY_SECURITY) * DATA_DIRECTORY_SIZE as u64;
    if security_entry > view.len() - DATA_DIRECTORY_SIZE as u64 {
        return Err(VerifyError::OutOfBounds {
            what: "security directory entry",
            offset: security_entry,
            len: DATA_DIRECTORY_SIZE as u64,
            size: view.len(),
        });
    }
    let security_dir = read_directory(&view, directories, DIRECTORY_ENTRY_SECURITY)?;
    let reloc_dir = read_directory(&view, directories, DIRECTORY_ENTRY_BASERELOC)?;
    if u64::from(security_dir.virtual_address) >= view.len() {
        return Err(malformed("Malformed security header"));
    }

    let ctx = ImageContext {
        optional_header,
        pe_header_offset: pe,
        machine,
        entry_point: view.u32_le(
            "AddressOfEntryPoint",
            opt + OPT_ADDRESS_OF_ENTRY_POINT as u64,
        )?,
        image_size,
        size_of_headers,
        size_of_optional_header,
        number_of_sections,
        number_of_rva_and_sizes,
        first_section_offset: section_header_offset,
        checksum_offset: opt + OPT_CHECKSUM as u64,
        reloc_dir,
        security_dir,
        sum_of_section_bytes,
    };
    log::debug!(
        "Parsed {} image: base={:#x} size={:#x} headers={:#x} sections={} security={:#x}+{:#x}",
        ctx.format(),
        ctx.image_base(),
        ctx.image_size,
        ctx.size_of_headers,
        ctx.number_of_sections,
        ctx.security_dir.virtual_address,
        ctx.security_dir.size
    );
    Ok(ctx)
}
