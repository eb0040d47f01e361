//! Centralized binary layout constants for PE/COFF, the Apple signature
//! directory and the Apple EFI fat container.
//! Offsets are in bytes; "relative to" names the structure they index into.

// === DOS Header ===

/// Size of `EFI_IMAGE_DOS_HEADER`
pub const DOS_HEADER_SIZE: usize = 64;

/// DOS header magic ("MZ")
pub const DOS_MAGIC: u16 = 0x5A4D;

/// Offset of `e_lfanew` (file offset of the PE header)
pub const DOS_LFANEW_OFFSET: usize = 0x3C;

// === PE Signature + COFF File Header ===

/// PE signature as read through the 16-bit TE/PE signature field ("PE")
pub const PE_SIGNATURE: u16 = 0x4550;

/// Size of the "PE\0\0" signature
pub const PE_SIGNATURE_SIZE: usize = 4;

/// Size of `EFI_IMAGE_FILE_HEADER`
pub const FILE_HEADER_SIZE: usize = 20;

/// Machine field, relative to the file header
pub const FILE_HEADER_MACHINE: usize = 0;

/// NumberOfSections field, relative to the file header
pub const FILE_HEADER_NUMBER_OF_SECTIONS: usize = 2;

/// SizeOfOptionalHeader field, relative to the file header
pub const FILE_HEADER_SIZE_OF_OPTIONAL_HEADER: usize = 16;

/// Characteristics field, relative to the file header
pub const FILE_HEADER_CHARACTERISTICS: usize = 18;

/// Itanium machine type (triggers the PE32 -> PE32+ magic override)
pub const IMAGE_FILE_MACHINE_IA64: u16 = 0x0200;

/// Characteristics flag: relocation information stripped
pub const IMAGE_FILE_RELOCS_STRIPPED: u16 = 0x0001;

/// Offset of the optional header from the start of the PE header
pub const OPTIONAL_HEADER_OFFSET: usize = PE_SIGNATURE_SIZE + FILE_HEADER_SIZE;

/// Size of `EFI_IMAGE_OPTIONAL_HEADER_UNION` (the PE32+ NT headers are the largest member)
pub const OPTIONAL_HEADER_UNION_SIZE: usize = OPTIONAL_HEADER_OFFSET + PE32_PLUS_OPTIONAL_HEADER_SIZE;

/// Smallest buffer the header parser accepts
pub const MIN_IMAGE_HEADER_SIZE: usize = if DOS_HEADER_SIZE >= OPTIONAL_HEADER_UNION_SIZE {
    DOS_HEADER_SIZE
} else {
    OPTIONAL_HEADER_UNION_SIZE
};

// === Optional Header ===

/// PE32 optional header magic
pub const PE32_MAGIC: u16 = 0x010B;

/// PE32+ optional header magic
pub const PE32_PLUS_MAGIC: u16 = 0x020B;

/// Full PE32 optional header size (16 data directories)
pub const PE32_OPTIONAL_HEADER_SIZE: usize = 224;

/// Full PE32+ optional header size (16 data directories)
pub const PE32_PLUS_OPTIONAL_HEADER_SIZE: usize = 240;

/// Magic field, relative to the optional header
pub const OPT_MAGIC: usize = 0;

/// AddressOfEntryPoint field, relative to the optional header
pub const OPT_ADDRESS_OF_ENTRY_POINT: usize = 16;

/// ImageBase field (u32) in PE32
pub const PE32_OPT_IMAGE_BASE: usize = 28;

/// ImageBase field (u64) in PE32+
pub const PE32_PLUS_OPT_IMAGE_BASE: usize = 24;

/// SizeOfImage field, relative to the optional header (same for both widths)
pub const OPT_SIZE_OF_IMAGE: usize = 56;

/// SizeOfHeaders field, relative to the optional header (same for both widths)
pub const OPT_SIZE_OF_HEADERS: usize = 60;

/// CheckSum field, relative to the optional header (same for both widths)
pub const OPT_CHECKSUM: usize = 64;

/// Size of the CheckSum field
pub const CHECKSUM_SIZE: usize = 4;

/// NumberOfRvaAndSizes field in PE32
pub const PE32_OPT_NUMBER_OF_RVA_AND_SIZES: usize = 92;

/// NumberOfRvaAndSizes field in PE32+
pub const PE32_PLUS_OPT_NUMBER_OF_RVA_AND_SIZES: usize = 108;

/// Start of the data directory array in PE32
pub const PE32_OPT_DATA_DIRECTORIES: usize = 96;

/// Start of the data directory array in PE32+
pub const PE32_PLUS_OPT_DATA_DIRECTORIES: usize = 112;

// === Data Directories ===

/// `EFI_IMAGE_NUMBER_OF_DIRECTORY_ENTRIES`
pub const NUMBER_OF_DIRECTORY_ENTRIES: u32 = 16;

/// Size of one `EFI_IMAGE_DATA_DIRECTORY` (VirtualAddress + Size)
pub const DATA_DIRECTORY_SIZE: usize = 8;

/// Security (certificate) directory index
pub const DIRECTORY_ENTRY_SECURITY: u32 = 4;

/// Base relocation directory index
pub const DIRECTORY_ENTRY_BASERELOC: u32 = 5;

// === Section Headers ===

/// `EFI_IMAGE_SIZEOF_SECTION_HEADER`
pub const SECTION_HEADER_SIZE: usize = 40;

/// SizeOfRawData field, relative to a section header
pub const SECTION_SIZE_OF_RAW_DATA: usize = 16;

/// PointerToRawData field, relative to a section header
pub const SECTION_POINTER_TO_RAW_DATA: usize = 20;

// === Apple Signature Directory ===

/// Size of the signature entry that precedes the Apple signature directory
pub const APPLE_SIGNATURE_SECENTRY_SIZE: u64 = 8;

/// SignatureDirectorySize field, relative to the signature directory
pub const APPLE_SIGDIR_SIGNATURE_DIRECTORY_SIZE: usize = 4;

/// PublicKey field, relative to the signature directory
pub const APPLE_SIGDIR_PUBLIC_KEY: usize = 48;

/// Signature field, relative to the signature directory
pub const APPLE_SIGDIR_SIGNATURE: usize = APPLE_SIGDIR_PUBLIC_KEY + RSA_KEY_SIZE;

/// Total size of `APPLE_SIGNATURE_DIRECTORY`
pub const APPLE_SIGNATURE_DIRECTORY_SIZE: usize = APPLE_SIGDIR_SIGNATURE + RSA_KEY_SIZE;

/// RSA-2048 modulus and signature size
pub const RSA_KEY_SIZE: usize = 256;

/// Public exponent used by every known Apple EFI signing key (F4)
pub const RSA_DEFAULT_EXPONENT: u32 = 65537;

/// SHA-256 digest size
pub const SHA256_DIGEST_SIZE: usize = 32;

/// DER `DigestInfo` prefix for SHA-256 (PKCS#1 v1.5, RFC 8017 section 9.2)
pub const SHA256_DIGEST_INFO_PREFIX: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05,
    0x00, 0x04, 0x20,
];

// === Apple EFI Fat Container ===

/// `EFI_FAT_MAGIC`
pub const EFI_FAT_MAGIC: u32 = 0x0EF1_FAB9;

/// Size of `EFIFatHeader` (Magic + NumArchs)
pub const FAT_HEADER_SIZE: u64 = 8;

/// Size of one `EFIFatArchHeader`
pub const FAT_ARCH_HEADER_SIZE: u64 = 20;

/// Mach CPU type: x86
pub const CPU_TYPE_X86: u32 = 7;

/// Mach CPU type: x86_64 (`CPU_TYPE_X86 | CPU_ARCH_ABI64`)
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;
