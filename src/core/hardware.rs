//! The processors the [Console][crate::core::Console] drives.
//!
//! The console does not decode instructions or draw scanlines itself.
//! It is generic over a [Cpu] and a [Ppu], and only relies on the small surface defined here.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Memory;

/// An interrupt line on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Non-maskable interrupt, raised by the PPU at the start of vblank.
    Nmi,
    /// Maskable interrupt request.
    Irq,
    /// Reset line.
    Reset,
}

/// An unrecoverable error raised while executing an instruction.
///
/// Stops the driver loop; the frame in progress is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CPU fault at {pc:#06X}: {message}")]
pub struct CpuFault {
    /// Program counter of the faulting instruction
    pub pc: u16,
    /// What went wrong
    pub message: String,
}

impl CpuFault {
    pub fn new(pc: u16, message: impl Into<String>) -> CpuFault {
        CpuFault {
            pc,
            message: message.into(),
        }
    }
}

/// How the two physical nametables are mirrored into the four logical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    /// `$2000 = $2400` and `$2800 = $2C00`
    Horizontal,
    /// `$2000 = $2800` and `$2400 = $2C00`
    Vertical,
}

/// Frame geometry in PPU clock units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemTiming {
    /// PPU clocks (dots) per scanline, hblank included
    pub dots_per_scanline: u32,
    /// Scanlines per frame, vblank and prerender included
    pub scanlines: u32,
    /// Scanlines actually drawn to the screen
    pub visible_scanlines: u32,
}

impl SystemTiming {
    /// The NTSC console.
    pub const NTSC: SystemTiming = SystemTiming {
        dots_per_scanline: 341,
        scanlines: 262,
        visible_scanlines: 240,
    };
    /// Total number of PPU clocks in one frame.
    /// ```
    /// use nes_tandem::core::SystemTiming;
    /// assert_eq!(SystemTiming::NTSC.clocks_per_frame(), 89_342);
    /// ```
    pub fn clocks_per_frame(&self) -> u32 {
        self.dots_per_scanline * self.scanlines
    }
}

impl Default for SystemTiming {
    fn default() -> Self {
        SystemTiming::NTSC
    }
}

/// The central processing unit.
pub trait Cpu: Send + 'static {
    /// Called once, before the first instruction of the first run.
    /// Usually loads the program counter from the reset vector.
    fn power_on(&mut self, bus: &mut Memory);
    /// Execute a single instruction and return the number of CPU cycles it took.
    fn exec(&mut self, bus: &mut Memory) -> Result<u32, CpuFault>;
    /// Raise an interrupt.
    ///
    /// Whether a masked interrupt is ignored is up to the CPU.
    fn interrupt(&mut self, kind: Interrupt);
    /// Turn instruction tracing on or off. Set from [Settings::debug][crate::core::Settings::debug] at power on.
    fn set_debug(&mut self, _debug: bool) {}
}

/// The picture processing unit.
pub trait Ppu: Send + 'static {
    /// Called once, before the first instruction of the first run.
    fn power_on(&mut self) {}
    /// Called on the first CPU step of every frame.
    fn begin_frame(&mut self) {}
    /// Set the frame geometry, in PPU clocks.
    fn set_system_timing(&mut self, timing: SystemTiming);
    /// Set how the nametables are mirrored.
    fn set_mirroring(&mut self, mirroring: Mirroring);
    /// Copy an 8 KiB bank of pattern data into pattern memory.
    fn load_pattern_bank(&mut self, index: usize, bank: &[u8]);
    /// Advance the PPU by `clocks` PPU clocks.
    ///
    /// Returns `true` if vblank started during the advance.
    fn advance(&mut self, bus: &mut Memory, clocks: u32) -> bool;
    /// Whether the last call to [Ppu::advance] finished the frame.
    fn frame_complete(&self) -> bool;
    /// The picture output, one byte per pixel.
    fn frame_buffer(&self) -> &[u8];
}
