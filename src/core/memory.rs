use crate::core::{Access, Observer, ObserverRegistry, WriteAction};

/// Size of the CPU address space.
pub const ADDRESS_SPACE_SIZE: usize = 0x10000;
/// Size of a bank of program ROM.
pub const PRG_BANK_SIZE: usize = 0x4000;

/// One of the two 16 KiB windows program ROM is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrgSlot {
    /// `$8000..$C000`
    Lower,
    /// `$C000..$10000`, which holds the interrupt vectors
    Upper,
}

impl PrgSlot {
    /// First CPU address of the slot.
    pub fn base(self) -> usize {
        match self {
            PrgSlot::Lower => 0x8000,
            PrgSlot::Upper => 0xC000,
        }
    }
}

/// The CPU's view of memory.
///
/// A flat 64 KiB store with an [ObserverRegistry] in front of it.
/// [Memory::read] and [Memory::write] are what the CPU uses and go through the observers,
/// [Memory::peek] and [Memory::poke] touch the cells directly.
#[derive(Debug)]
pub struct Memory {
    data: Box<[u8]>,
    observers: ObserverRegistry,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Create a new, zeroed, unobserved memory store.
    pub fn new() -> Memory {
        Memory {
            data: vec![0; ADDRESS_SPACE_SIZE].into_boxed_slice(),
            observers: ObserverRegistry::new(),
        }
    }
    /// Read a byte as the CPU would.
    ///
    /// Read observers at `addr` may replace the stored value.
    /// ```
    /// let mut mem = nes_tandem::core::Memory::new();
    /// mem.poke(0x4016, 0x40);
    /// mem.observe_reads(0x4016, |_, value| Some(value | 0x01));
    /// assert_eq!(mem.read(0x4016), 0x41);
    /// assert_eq!(mem.peek(0x4016), 0x40);
    /// ```
    pub fn read(&mut self, addr: u16) -> u8 {
        let stored = self.data[addr as usize];
        self.observers.dispatch_read(addr, stored)
    }
    /// Write a byte as the CPU would.
    ///
    /// Write observers at `addr` run first, and the value is stored unless one of them discards it.
    pub fn write(&mut self, addr: u16, value: u8) {
        if self.observers.dispatch_write(addr, value) == WriteAction::Store {
            self.data[addr as usize] = value;
        }
    }
    /// Read a little endian word, going through the observers.
    /// ```
    /// let mut mem = nes_tandem::core::Memory::new();
    /// mem.poke(0xFFFC, 0x34);
    /// mem.poke(0xFFFD, 0x12);
    /// assert_eq!(mem.read_u16(0xFFFC), 0x1234);
    /// ```
    pub fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }
    /// Read the stored byte, bypassing observers.
    pub fn peek(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }
    /// Store a byte, bypassing observers.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.data[addr as usize] = value;
    }
    /// Copy a 16 KiB bank of program ROM into one of the program slots.
    ///
    /// Anything past the first 16 KiB of `bank` is ignored.
    pub fn load_prg_bank(&mut self, slot: PrgSlot, bank: &[u8]) {
        let len = bank.len().min(PRG_BANK_SIZE);
        let base = slot.base();
        self.data[base..base + len].copy_from_slice(&bank[..len]);
    }
    /// The contents of a program slot.
    pub fn prg_slot(&self, slot: PrgSlot) -> &[u8] {
        &self.data[slot.base()..slot.base() + PRG_BANK_SIZE]
    }
    /// Register a read observer at `addr`.
    pub fn observe_reads<F>(&mut self, addr: u16, f: F)
    where
        F: FnMut(u16, u8) -> Option<u8> + Send + 'static,
    {
        self.observers.register(addr, Observer::Read(Box::new(f)));
    }
    /// Register a write observer at `addr`.
    pub fn observe_writes<F>(&mut self, addr: u16, f: F)
    where
        F: FnMut(u16, u8) -> WriteAction + Send + 'static,
    {
        self.observers.register(addr, Observer::Write(Box::new(f)));
    }
    /// The observers registered on this memory.
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }
    /// Number of read and write observers at `addr`.
    pub fn observer_count(&self, addr: u16) -> usize {
        self.observers.count(addr, Access::Read) + self.observers.count(addr, Access::Write)
    }
}
