//! The actual emulation code.
//!
//! Runs a [Cpu] and a [Ppu] in lock step on a background thread, three PPU clocks per CPU cycle,
//! raising an NMI on the CPU whenever the PPU enters vblank and pacing every frame to the refresh rate.
//! The CPU sees memory through [Memory], where peripherals such as the [controller port](ControllerPort)
//! hook into individual addresses as bus observers.
//! ```rust,ignore
//! use nes_tandem::core::{Console, Controller, Settings};
//! // The console, generic over the CPU and PPU implementations
//! let mut console = Console::new(cpu, ppu, Settings::default());
//! // Map the game's banks into memory
//! console.load_rom(include_bytes!("game.nes"))?;
//! // Receive a frame every vblank
//! console.on_frame(|frame| println!("Top left pixel is {}", frame[0]))?;
//! // Start the emulation thread
//! console.run()?;
//! // Press start
//! console.set_buttons(Controller { start: true, ..Controller::default() });
//! // Stop and wait for the thread
//! console.stop();
//! let reason = console.wait()?;
//! ```
mod cartridge;
pub use cartridge::{load_rom, BankMapping, RomError, RomHeader, HEADER_SIZE, PATTERN_BANK_SIZE};
mod console;
pub use console::{Console, ConsoleError, RunState};
mod controller;
pub use controller::{
    ButtonHandle, Controller, ControllerPort, Joypad, StrobeLatch, StrobePhase,
    CONTROLLER_PORT_ADDR, STROBE_POLL_PATTERN,
};
mod driver;
pub(crate) use driver::{Driver, Machine};
pub use driver::{advance_ppu, ExitReason, FrameCallback, Metrics, StartCallback, StepPredicate};
mod hardware;
pub use hardware::{Cpu, CpuFault, Interrupt, Mirroring, Ppu, SystemTiming};
mod logging;
pub use logging::init_logger;
mod memory;
pub use memory::{Memory, PrgSlot, ADDRESS_SPACE_SIZE, PRG_BANK_SIZE};
mod observer;
pub use observer::{Access, Observer, ObserverRegistry, ReadObserver, WriteAction, WriteObserver};
mod pacer;
pub use pacer::{FramePacer, FrameReport};
mod settings;
pub use settings::{Settings, SettingsError};

/// The location of the reset interrupt vector.
pub const RESET_VECTOR_ADDR: u16 = 0xFFFC;
