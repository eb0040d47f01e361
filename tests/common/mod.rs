//! Synthetic Apple-signed EFI image builder shared by integration tests.
//!
//! Default layout (PE32, all 16 data directories):
//!
//! ```text
//! 0x000  DOS header, e_lfanew = 0x80
//! 0x080  "PE\0\0", file header, optional header, section table
//! 0x200  .text raw data (0x200 bytes)
//! 0x400  .data raw data (0x200 bytes), listed first in the section table
//! 0x600  8-byte signature entry
//! 0x608  Apple signature directory (560 bytes), key at +48, signature at +304
//! 0x838  optional trailing data
//! ```

#![allow(dead_code)]

use apple_efi_verifier::{compute_image_digest, TrustedKey};
use openssl::pkey::Private;
use openssl::rsa::{Padding, Rsa};

pub const PE_OFFSET: usize = 0x80;
pub const OPT_OFFSET: usize = PE_OFFSET + 24;
pub const SIZE_OF_HEADERS: usize = 0x200;
pub const SIZE_OF_IMAGE: u32 = 0x4000;
pub const SECTION_SIZE: usize = 0x200;
pub const SIG_DIR_LEN: usize = 560;
pub const CHECKSUM_OFFSET: usize = OPT_OFFSET + 64;
pub const DOS_STUB_BYTE: usize = 0x70;

const DIGEST_INFO_PREFIX: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

#[derive(Clone, Debug)]
pub struct ImageBuilder {
    pub pe32_plus: bool,
    pub nrva: u32,
    /// Added to the consistent SizeOfOptionalHeader
    pub soh_delta: i32,
    /// Gap left between .text and .data
    pub cave: usize,
    /// Append signature entry and Apple signature directory
    pub signed: bool,
    pub trailing: Vec<u8>,
    pub machine: Option<u16>,
    pub characteristics: u16,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            pe32_plus: false,
            nrva: 16,
            soh_delta: 0,
            cave: 0,
            signed: true,
            trailing: Vec::new(),
            machine: None,
            characteristics: 0x0102,
        }
    }
}

/// Offsets of interesting structures inside a built image.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    pub directories: usize,
    pub security_entry: usize,
    pub reloc_entry: usize,
    pub text: usize,
    pub data: usize,
    pub sections_end: usize,
    pub sig_entry: usize,
    pub sig_dir: usize,
    pub sig_dir_end: usize,
}

pub fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        Self::default()
    }

    pub fn pe32_plus() -> Self {
        Self {
            pe32_plus: true,
            characteristics: 0x0022,
            ..Self::default()
        }
    }

    fn fixed_optional_size(&self) -> usize {
        if self.pe32_plus {
            112
        } else {
            96
        }
    }

    pub fn size_of_optional_header(&self) -> u16 {
        let consistent = (self.fixed_optional_size() + 8 * self.nrva as usize) as i32;
        (consistent + self.soh_delta) as u16
    }

    pub fn layout(&self) -> Layout {
        let directories = OPT_OFFSET + self.fixed_optional_size();
        let text = SIZE_OF_HEADERS;
        let data = text + SECTION_SIZE + self.cave;
        let sections_end = data + SECTION_SIZE;
        let sig_entry = sections_end;
        let sig_dir = sig_entry + 8;
        Layout {
            directories,
            security_entry: directories + 4 * 8,
            reloc_entry: directories + 5 * 8,
            text,
            data,
            sections_end,
            sig_entry,
            sig_dir,
            sig_dir_end: sig_dir + SIG_DIR_LEN,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = self.layout();
        let body_end = if self.signed {
            layout.sig_dir_end
        } else {
            layout.sections_end
        };
        let mut img = vec![0u8; body_end];

        // DOS header + stub
        img[0..2].copy_from_slice(b"MZ");
        put_u32(&mut img, 0x3C, PE_OFFSET as u32);
        for (i, b) in img[0x40..PE_OFFSET].iter_mut().enumerate() {
            *b = 0xD0 ^ i as u8;
        }

        // File header
        img[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
        let fh = PE_OFFSET + 4;
        let machine = self
            .machine
            .unwrap_or(if self.pe32_plus { 0x8664 } else { 0x014c });
        put_u16(&mut img, fh, machine);
        put_u16(&mut img, fh + 2, 2);
        put_u32(&mut img, fh + 4, 0x5F5E_1000);
        put_u16(&mut img, fh + 16, self.size_of_optional_header());
        put_u16(&mut img, fh + 18, self.characteristics);

        // Optional header
        let opt = OPT_OFFSET;
        put_u16(&mut img, opt, if self.pe32_plus { 0x020B } else { 0x010B });
        img[opt + 2] = 14;
        put_u32(&mut img, opt + 4, SECTION_SIZE as u32);
        put_u32(&mut img, opt + 16, 0x1010);
        if self.pe32_plus {
            put_u64(&mut img, opt + 24, 0x0000_0001_0000_0000);
        } else {
            put_u32(&mut img, opt + 28, 0x1000_0000);
        }
        put_u32(&mut img, opt + 32, 0x1000);
        put_u32(&mut img, opt + 36, 0x200);
        put_u32(&mut img, opt + 56, SIZE_OF_IMAGE);
        put_u32(&mut img, opt + 60, SIZE_OF_HEADERS as u32);
        put_u32(&mut img, opt + 64, 0xDEAD_BEEF);
        put_u16(&mut img, opt + 68, 10);
        let nrva_offset = if self.pe32_plus { opt + 108 } else { opt + 92 };
        put_u32(&mut img, nrva_offset, self.nrva);

        // Data directories
        for index in 0..self.nrva as usize {
            let entry = layout.directories + index * 8;
            match index {
                4 if self.signed => {
                    put_u32(&mut img, entry, layout.sig_dir as u32);
                    put_u32(&mut img, entry + 4, 8);
                }
                4 => {}
                5 => {
                    put_u32(&mut img, entry, 0x3000);
                    put_u32(&mut img, entry + 4, 0x0C);
                }
                _ => {
                    put_u32(&mut img, entry, 0x100 * (index as u32 + 1));
                    put_u32(&mut img, entry + 4, 0x10 + index as u32);
                }
            }
        }

        // Section table: .data listed before .text; names left zeroed
        let table = PE_OFFSET + 24 + self.size_of_optional_header() as usize;
        let sections = [(layout.data, 0x2000u32), (layout.text, 0x1000u32)];
        for (i, (pointer, va)) in sections.iter().enumerate() {
            let header = table + i * 40;
            put_u32(&mut img, header + 8, SECTION_SIZE as u32);
            put_u32(&mut img, header + 12, *va);
            put_u32(&mut img, header + 16, SECTION_SIZE as u32);
            put_u32(&mut img, header + 20, *pointer as u32);
        }

        // Section contents, and any code cave between them
        for (i, b) in img[layout.text..layout.sections_end].iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(31).wrapping_add(7);
        }

        if self.signed {
            img[layout.sig_entry..layout.sig_dir]
                .copy_from_slice(&[0x38, 0x02, 0x00, 0x00, 0x00, 0x02, 0xF1, 0x0E]);
            let dir = layout.sig_dir;
            put_u32(&mut img, dir, layout.sections_end as u32);
            put_u32(&mut img, dir + 4, (SIG_DIR_LEN - 8) as u32);
            put_u32(&mut img, dir + 8, 256);
            put_u16(&mut img, dir + 14, 0x0001);
            for b in &mut img[dir + 16..dir + 48] {
                *b = 0x5C;
            }
        }

        img.extend_from_slice(&self.trailing);
        img
    }
}

/// RSA-2048 test signer.
pub struct TestSigner {
    pub rsa: Rsa<Private>,
}

impl TestSigner {
    pub fn generate() -> Self {
        Self {
            rsa: Rsa::generate(2048).expect("generate RSA key"),
        }
    }

    /// Modulus as stored inside images (little-endian).
    pub fn modulus_le(&self) -> [u8; 256] {
        let mut n: [u8; 256] = self.rsa.n().to_vec().try_into().expect("2048-bit modulus");
        n.reverse();
        n
    }

    pub fn trusted_key(&self, name: &str) -> TrustedKey {
        TrustedKey::from_le_modulus(name, &self.modulus_le(), 65537).expect("trusted key")
    }

    /// Raw PKCS#1 v1.5 signature (big-endian) over a SHA-256 digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 256] {
        let mut info = DIGEST_INFO_PREFIX.to_vec();
        info.extend_from_slice(digest);
        let mut sig = vec![0u8; self.rsa.size() as usize];
        let len = self
            .rsa
            .private_encrypt(&info, &mut sig, Padding::PKCS1)
            .expect("sign");
        sig[..len].try_into().expect("256-byte signature")
    }

    /// Write the key and a valid signature into the Apple signature directory.
    pub fn sign_image(&self, image: &mut [u8], sig_dir: usize) {
        image[sig_dir + 48..sig_dir + 304].copy_from_slice(&self.modulus_le());
        let digest = compute_image_digest(image).expect("digest");
        let mut sig = self.sign_digest(digest.as_bytes());
        sig.reverse();
        image[sig_dir + 304..sig_dir + 560].copy_from_slice(&sig);
    }
}

/// Build and sign an image in one step.
pub fn signed_image(builder: &ImageBuilder, signer: &TestSigner) -> Vec<u8> {
    let mut image = builder.build();
    signer.sign_image(&mut image, builder.layout().sig_dir);
    image
}

/// Apple fat container around `slots` of `(cpu_type, image)`, packed back to back.
pub fn fat_binary(slots: &[(u32, &[u8])]) -> Vec<u8> {
    let header = 8 + slots.len() * 20;
    let mut out = vec![0u8; header];
    put_u32(&mut out, 0, 0x0EF1_FAB9);
    put_u32(&mut out, 4, slots.len() as u32);
    let mut offset = header;
    for (i, (cpu, image)) in slots.iter().enumerate() {
        let record = 8 + i * 20;
        put_u32(&mut out, record, *cpu);
        put_u32(&mut out, record + 4, 3);
        put_u32(&mut out, record + 8, offset as u32);
        put_u32(&mut out, record + 12, image.len() as u32);
        put_u32(&mut out, record + 16, 0);
        offset += image.len();
    }
    for (_, image) in slots {
        out.extend_from_slice(image);
    }
    out
}
