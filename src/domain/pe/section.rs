use crate::domain::constants::{
    SECTION_HEADER_SIZE, SECTION_POINTER_TO_RAW_DATA, SECTION_SIZE_OF_RAW_DATA,
};
use crate::domain::cursor::ByteView;
use crate::infra::error::VerifyResult;

use super::ImageContext;

/// Raw-data placement of one section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionRecord {
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
}

impl SectionRecord {
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.pointer_to_raw_data) + u64::from(self.size_of_raw_data)
    }
}

/// Read the `index`-th section header of the table starting at `table_offset`.
pub(crate) fn read_section(
    view: &ByteView<'_>,
    table_offset: u64,
    index: u16,
) -> VerifyResult<SectionRecord> {
    let header = table_offset + u64::from(index) * SECTION_HEADER_SIZE as u64;
    Ok(SectionRecord {
        pointer_to_raw_data: view.u32_le(
            "section PointerToRawData",
            header + SECTION_POINTER_TO_RAW_DATA as u64,
        )?,
        size_of_raw_data: view.u32_le(
            "section SizeOfRawData",
            header + SECTION_SIZE_OF_RAW_DATA as u64,
        )?,
    })
}

/// Collect the image's section records in file order.
///
/// The scratch vector is reserved up front so an allocation failure surfaces
/// as `AllocationFailure` instead of aborting.
pub fn read_sections(view: &ByteView<'_>, ctx: &ImageContext) -> VerifyResult<Vec<SectionRecord>> {
    let mut sections = Vec::new();
    sections.try_reserve_exact(usize::from(ctx.number_of_sections))?;
    for index in 0..ctx.number_of_sections {
        sections.push(read_section(view, ctx.first_section_offset, index)?);
    }
    Ok(sections)
}

/// Return the records ordered by raw-data file pointer (stable for ties).
#[must_use]
pub fn sorted_by_file_offset(mut sections: Vec<SectionRecord>) -> Vec<SectionRecord> {
    sections.sort_by_key(|s| s.pointer_to_raw_data);
    sections
}
