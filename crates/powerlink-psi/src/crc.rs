// crates/powerlink-psi/src/crc.rs
//! CRC-32 used to protect stored parameter sets.
//!
//! Polynomial `0xF4ACFB13`, processed MSB first, no reflection and no
//! final XOR. The initial value is supplied by the caller.

pub const CRC32_POLYNOMIAL: u32 = 0xF4AC_FB13;

static CRC32_TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continues a CRC-32 computation from `init` over `data`.
pub fn crc32(init: u32, data: &[u8]) -> u32 {
    data.iter().fold(init, |crc, &byte| {
        let index = ((crc >> 24) ^ byte as u32) & 0xFF;
        (crc << 8) ^ CRC32_TABLE[index as usize]
    })
}
