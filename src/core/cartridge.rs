//! Loading iNES images into the console.
//!
//! Only the fixed two bank layout is supported: one or two 16 KiB banks of program ROM mapped
//! at `$8000` and `$C000`, and any number of 8 KiB pattern banks copied into the PPU.
use log::*;
use thiserror::Error;

use crate::core::{Memory, Mirroring, Ppu, PrgSlot, PRG_BANK_SIZE};

/// Size of the iNES header.
pub const HEADER_SIZE: usize = 16;
/// Size of a bank of pattern (CHR) data.
pub const PATTERN_BANK_SIZE: usize = 0x2000;
const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// Reasons a ROM image can be refused.
///
/// All of these are detected before any memory is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("ROM is {0} bytes long, shorter than the 16 byte header")]
    TooShort(usize),
    #[error("Unsupported number of 16 KiB program banks: {0} (expected 1 or 2)")]
    InvalidPrgBankCount(u8),
    #[error("ROM declares {expected} bytes of data but is only {actual} bytes long")]
    Truncated { expected: usize, actual: usize },
    #[error("A ROM has already been loaded")]
    AlreadyLoaded,
}

/// Where the program banks go.
///
/// Bank 0 is always mapped to the lower slot.
/// With a single bank, it is mapped a second time into the upper slot so that the
/// interrupt vectors at the top of the address space are still there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMapping {
    /// Index of the bank mapped at `$8000`
    pub lower: usize,
    /// Index of the bank mapped at `$C000`
    pub upper: usize,
}

impl BankMapping {
    /// ```
    /// use nes_tandem::core::BankMapping;
    /// assert_eq!(BankMapping::for_bank_count(1).unwrap().upper, 0);
    /// assert_eq!(BankMapping::for_bank_count(2).unwrap().upper, 1);
    /// assert!(BankMapping::for_bank_count(4).is_err());
    /// ```
    pub fn for_bank_count(prg_banks: u8) -> Result<BankMapping, RomError> {
        match prg_banks {
            1 => Ok(BankMapping { lower: 0, upper: 0 }),
            2 => Ok(BankMapping { lower: 0, upper: 1 }),
            n => Err(RomError::InvalidPrgBankCount(n)),
        }
    }
}

/// The part of the iNES header this console cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomHeader {
    /// Number of 16 KiB program banks
    pub prg_banks: u8,
    /// Number of 8 KiB pattern banks
    pub chr_banks: u8,
    pub mirroring: Mirroring,
}

impl RomHeader {
    /// Parse and validate the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<RomHeader, RomError> {
        if bytes.len() < HEADER_SIZE {
            return Err(RomError::TooShort(bytes.len()));
        }
        debug!("ROM header: {:X?}", &bytes[0..HEADER_SIZE]);
        if bytes[0..4] != MAGIC {
            warn!("ROM is missing the iNES magic number, loading anyway");
        }
        let prg_banks = bytes[4];
        BankMapping::for_bank_count(prg_banks)?;
        let mirroring = if bytes[6] & 0x01 == 0 {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        };
        Ok(RomHeader {
            prg_banks,
            chr_banks: bytes[5],
            mirroring,
        })
    }
    /// Total size of the image the header describes.
    pub fn image_size(&self) -> usize {
        HEADER_SIZE
            + PRG_BANK_SIZE * self.prg_banks as usize
            + PATTERN_BANK_SIZE * self.chr_banks as usize
    }
}

fn prg_bank(bytes: &[u8], index: usize) -> &[u8] {
    let start = HEADER_SIZE + PRG_BANK_SIZE * index;
    &bytes[start..start + PRG_BANK_SIZE]
}

fn chr_bank<'a>(bytes: &'a [u8], header: &RomHeader, index: usize) -> &'a [u8] {
    let start = HEADER_SIZE + PRG_BANK_SIZE * header.prg_banks as usize + PATTERN_BANK_SIZE * index;
    &bytes[start..start + PATTERN_BANK_SIZE]
}

/// Load an iNES image into memory and the PPU.
///
/// Copies the program banks into the two program slots according to [BankMapping],
/// every pattern bank into the PPU in order, and sets the PPU's mirroring from bit 0 of header byte 6.
/// The whole image is validated first, so on error neither `memory` nor `ppu` has been touched.
pub fn load_rom<P: Ppu>(bytes: &[u8], memory: &mut Memory, ppu: &mut P) -> Result<RomHeader, RomError> {
    let header = RomHeader::parse(bytes)?;
    let expected = header.image_size();
    if bytes.len() < expected {
        return Err(RomError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    if bytes.len() > expected {
        debug!("Ignoring {} trailing bytes", bytes.len() - expected);
    }
    let mapping = BankMapping::for_bank_count(header.prg_banks)?;
    debug!("Mapping program banks {:?}", mapping);
    memory.load_prg_bank(PrgSlot::Lower, prg_bank(bytes, mapping.lower));
    memory.load_prg_bank(PrgSlot::Upper, prg_bank(bytes, mapping.upper));
    (0..header.chr_banks as usize).for_each(|i| ppu.load_pattern_bank(i, chr_bank(bytes, &header, i)));
    ppu.set_mirroring(header.mirroring);
    info!(
        "Loaded ROM: {} program bank(s), {} pattern bank(s), {:?} mirroring",
        header.prg_banks, header.chr_banks, header.mirroring
    );
    Ok(header)
}
