//! Apple EFI fat container header.
//!
//! Layout (little-endian): `Magic`, `NumArchs`, then `NumArchs` records of
//! `CpuType`, `CpuSubtype`, `Offset`, `Size`, `Align`.

use crate::domain::constants::{
    CPU_TYPE_X86, CPU_TYPE_X86_64, EFI_FAT_MAGIC, FAT_ARCH_HEADER_SIZE, FAT_HEADER_SIZE,
};
use crate::domain::cursor::ByteView;
use crate::infra::error::{VerifyError, VerifyResult};

/// One architecture slot of a fat container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FatArch {
    pub cpu_type: u32,
    pub cpu_subtype: u32,
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

impl FatArch {
    /// Only x86 and x86_64 slices carry verifiable PE images.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.cpu_type == CPU_TYPE_X86 || self.cpu_type == CPU_TYPE_X86_64
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FatContainer {
    pub magic: u32,
    pub arch_count: u32,
    pub archs: Vec<FatArch>,
}

impl FatContainer {
    /// Bytes covered by the fat header and its arch table.
    #[must_use]
    pub fn header_size(&self) -> u64 {
        FAT_HEADER_SIZE + u64::from(self.arch_count) * FAT_ARCH_HEADER_SIZE
    }

    /// Parse the container header.
    ///
    /// Returns `Ok(None)` when the buffer does not start with the fat magic and
    /// should be treated as a single image.
    pub fn parse(data: &[u8]) -> VerifyResult<Option<Self>> {
        let view = ByteView::new(data);
        if view.len() < FAT_HEADER_SIZE {
            return Err(VerifyError::TruncatedInput {
                what: "fat header",
                needed: FAT_HEADER_SIZE,
                actual: view.len(),
            });
        }

        let magic = view.u32_le("fat magic", 0)?;
        if magic != EFI_FAT_MAGIC {
            return Ok(None);
        }

        let arch_count = view.u32_le("fat NumArchs", 4)?;
        let table = u64::from(arch_count)
            .checked_mul(FAT_ARCH_HEADER_SIZE)
            .and_then(|t| t.checked_add(FAT_HEADER_SIZE))
            .ok_or_else(|| {
                VerifyError::IntegerOverflow(format!("fat arch table for {arch_count} archs"))
            })?;
        if table > view.len() {
            log::debug!(
                "Rejecting fat binary: {arch_count} arch headers need {table:#x} bytes, have {:#x}",
                view.len()
            );
            return Err(VerifyError::MalformedHeader(format!(
                "fat header declares {arch_count} architectures ({table:#x} bytes) in {:#x} byte image",
                view.len()
            )));
        }

        let mut archs = Vec::new();
        archs.try_reserve_exact(arch_count as usize)?;
        for index in 0..u64::from(arch_count) {
            let record = FAT_HEADER_SIZE + index * FAT_ARCH_HEADER_SIZE;
            archs.push(FatArch {
                cpu_type: view.u32_le("fat CpuType", record)?,
                cpu_subtype: view.u32_le("fat CpuSubtype", record + 4)?,
                offset: view.u32_le("fat Offset", record + 8)?,
                size: view.u32_le("fat Size", record + 12)?,
                align: view.u32_le("fat Align", record + 16)?,
            });
        }

        Ok(Some(Self {
            magic,
            arch_count,
            archs,
        }))
    }
}
