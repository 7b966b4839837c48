use std::sync::{
    atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering},
    Arc,
};

use log::*;
use serde::{Deserialize, Serialize};

use crate::core::{Memory, WriteAction};

/// The memory mapped controller register.
pub const CONTROLLER_PORT_ADDR: u16 = 0x4016;
/// The value the two strobe writes have to assemble to for the controller to be polled.
pub const STROBE_POLL_PATTERN: u16 = 0x0100;

/// An NES controller
///
/// Used to represent the controller's state in the emulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pub up: bool,
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub start: bool,
    pub select: bool,
    pub a: bool,
    pub b: bool,
}

impl Controller {
    pub fn new() -> Controller {
        Controller::default()
    }
    /// Pack the buttons into a byte, bit 0 being the first button shifted out.
    ///
    /// The shift order is A, B, Select, Start, Up, Down, Left, Right.
    /// ```
    /// use nes_tandem::core::Controller;
    /// let c = Controller { a: true, right: true, ..Controller::default() };
    /// assert_eq!(c.to_byte(), 0b1000_0001);
    /// ```
    pub fn to_byte(&self) -> u8 {
        [
            self.a,
            self.b,
            self.select,
            self.start,
            self.up,
            self.down,
            self.left,
            self.right,
        ]
        .iter()
        .enumerate()
        .fold(0, |acc, (i, pressed)| acc | ((*pressed as u8) << i))
    }
    /// The inverse of [Controller::to_byte].
    pub fn from_byte(byte: u8) -> Controller {
        let bit = |i: u8| byte & (1 << i) != 0;
        Controller {
            a: bit(0),
            b: bit(1),
            select: bit(2),
            start: bit(3),
            up: bit(4),
            down: bit(5),
            left: bit(6),
            right: bit(7),
        }
    }
}

/// A shared handle to the buttons currently held down.
///
/// Can be cloned and updated from any thread, including while the console is running.
/// The console only sees the new state the next time the game polls the controller.
#[derive(Clone, Debug, Default)]
pub struct ButtonHandle(Arc<AtomicU8>);

impl ButtonHandle {
    pub fn set(&self, controller: Controller) {
        self.0.store(controller.to_byte(), Ordering::Relaxed);
    }
    pub fn get(&self) -> Controller {
        Controller::from_byte(self.0.load(Ordering::Relaxed))
    }
}

/// The input latch of the controller.
///
/// Holds a snapshot of the buttons taken on [Joypad::reset] and shifts it out one button per read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Joypad {
    latched: u8,
    cursor: u8,
}

impl Joypad {
    pub fn new() -> Joypad {
        Joypad::default()
    }
    /// Snapshot the held buttons and rewind to the first button.
    pub fn reset(&mut self, buttons: Controller) {
        self.latched = buttons.to_byte();
        self.cursor = 0;
    }
    /// The state of the button under the cursor (1 if pressed), then move to the next button.
    ///
    /// Wraps back to A after Right.
    pub fn next_state(&mut self) -> u8 {
        let state = (self.latched >> self.cursor) & 0x01;
        self.cursor = (self.cursor + 1) % 8;
        state
    }
    /// Index of the next button to be read.
    pub fn cursor(&self) -> u8 {
        self.cursor
    }
    fn to_bits(self) -> u16 {
        (self.latched as u16) << 8 | self.cursor as u16
    }
    fn from_bits(bits: u16) -> Joypad {
        Joypad {
            latched: (bits >> 8) as u8,
            cursor: bits as u8,
        }
    }
}

/// Which half of the strobe word the next write fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrobePhase {
    #[default]
    AwaitingHigh,
    AwaitingLow,
}

/// Assembles the 16 bit strobe word out of two consecutive byte writes.
///
/// The first write fills the high byte and the second the low byte, at which point the word is committed.
/// Games strobe the controller by writing `1` then `0`, which commits [STROBE_POLL_PATTERN].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrobeLatch {
    phase: StrobePhase,
    pending: u16,
    committed: u16,
}

impl StrobeLatch {
    pub fn new() -> StrobeLatch {
        StrobeLatch::default()
    }
    /// Feed a byte written to the controller register.
    ///
    /// Returns `true` if this write completed the poll pattern and the input latch should be reset.
    /// ```
    /// use nes_tandem::core::StrobeLatch;
    /// let mut latch = StrobeLatch::new();
    /// assert!(!latch.write(0x01));
    /// assert!(latch.write(0x00));
    /// assert_eq!(latch.committed(), 0x0100);
    /// ```
    pub fn write(&mut self, value: u8) -> bool {
        match self.phase {
            StrobePhase::AwaitingHigh => {
                self.pending = (self.pending & 0x00FF) | ((value as u16) << 8);
                self.phase = StrobePhase::AwaitingLow;
                false
            }
            StrobePhase::AwaitingLow => {
                self.pending = (self.pending & 0xFF00) | value as u16;
                self.committed = self.pending;
                self.phase = StrobePhase::AwaitingHigh;
                self.committed == STROBE_POLL_PATTERN
            }
        }
    }
    /// Whether reads of the controller register should return button states.
    pub fn is_polling(&self) -> bool {
        self.committed == STROBE_POLL_PATTERN
    }
    pub fn phase(&self) -> StrobePhase {
        self.phase
    }
    /// The last fully assembled strobe word.
    pub fn committed(&self) -> u16 {
        self.committed
    }
    // committed in bits 0..16, pending in 16..32, phase in bit 32
    fn to_bits(self) -> u64 {
        let phase: u64 = match self.phase {
            StrobePhase::AwaitingHigh => 0,
            StrobePhase::AwaitingLow => 1,
        };
        phase << 32 | (self.pending as u64) << 16 | self.committed as u64
    }
    fn from_bits(bits: u64) -> StrobeLatch {
        StrobeLatch {
            phase: if bits & (1 << 32) == 0 {
                StrobePhase::AwaitingHigh
            } else {
                StrobePhase::AwaitingLow
            },
            pending: (bits >> 16) as u16,
            committed: bits as u16,
        }
    }
}

/// The controller peripheral: the strobe protocol in front of the input latch.
///
/// Only the emulation thread changes it, through the observers registered by [ControllerPort::attach].
/// Its state is kept in atomics so the owning context can take snapshots without holding the worker up.
#[derive(Debug, Default)]
pub struct ControllerPort {
    buttons: ButtonHandle,
    strobe: AtomicU64,
    joypad: AtomicU16,
}

impl ControllerPort {
    pub fn new(buttons: ButtonHandle) -> ControllerPort {
        ControllerPort {
            buttons,
            strobe: AtomicU64::new(StrobeLatch::new().to_bits()),
            joypad: AtomicU16::new(Joypad::new().to_bits()),
        }
    }
    /// A copy of the strobe latch.
    pub fn strobe(&self) -> StrobeLatch {
        StrobeLatch::from_bits(self.strobe.load(Ordering::Acquire))
    }
    /// A copy of the input latch.
    pub fn joypad(&self) -> Joypad {
        Joypad::from_bits(self.joypad.load(Ordering::Acquire))
    }
    /// Handle a write to the controller register.
    pub fn on_write(&self, value: u8) {
        let mut strobe = self.strobe();
        if strobe.write(value) {
            let mut joypad = self.joypad();
            joypad.reset(self.buttons.get());
            self.joypad.store(joypad.to_bits(), Ordering::Release);
        }
        self.strobe.store(strobe.to_bits(), Ordering::Release);
    }
    /// Handle a read of the controller register, returning the value to replace the stored byte with.
    pub fn on_read(&self) -> Option<u8> {
        if !self.strobe().is_polling() {
            return None;
        }
        let mut joypad = self.joypad();
        let state = joypad.next_state();
        self.joypad.store(joypad.to_bits(), Ordering::Release);
        Some(state)
    }
    /// Wire a shared port into memory at [CONTROLLER_PORT_ADDR].
    ///
    /// Registers one write and one read observer, both holding a reference to the port.
    pub fn attach(port: &Arc<ControllerPort>, memory: &mut Memory) {
        let writer = port.clone();
        memory.observe_writes(CONTROLLER_PORT_ADDR, move |_, value| {
            writer.on_write(value);
            WriteAction::Store
        });
        let reader = port.clone();
        memory.observe_reads(CONTROLLER_PORT_ADDR, move |_, _| reader.on_read());
        debug!(
            "Attached controller port at {:#06X}",
            CONTROLLER_PORT_ADDR
        );
    }
}
