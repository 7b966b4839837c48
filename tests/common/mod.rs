use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use nes_tandem::core::{
    Cpu, CpuFault, Interrupt, Memory, Mirroring, Ppu, Settings, SystemTiming, HEADER_SIZE,
    PATTERN_BANK_SIZE, PRG_BANK_SIZE, RESET_VECTOR_ADDR,
};

/// A single bus access a [TestCpu] makes instead of an instruction
#[derive(Debug, Clone, Copy)]
pub enum BusOp {
    Read(u16),
    Write(u16, u8),
}

/// A CPU that doesn't decode anything.
///
/// Every step takes the next number of cycles out of `pattern` (looping),
/// and performs the next [BusOp] in `script` if there is one.
#[derive(Debug)]
pub struct TestCpu {
    pub pattern: Vec<u32>,
    pub script: VecDeque<BusOp>,
    pub reads: Vec<u8>,
    pub steps: u64,
    pub cycles: u64,
    pub nmis: u64,
    pub power_ons: u32,
    pub reset_vector: Option<u16>,
    pub fault_at: Option<u64>,
    pub debug: Option<bool>,
    // Shared so it can be watched while the CPU is on the emulation thread
    pub step_counter: Arc<AtomicU64>,
}

impl TestCpu {
    pub fn new(pattern: &[u32]) -> TestCpu {
        TestCpu {
            pattern: pattern.to_vec(),
            script: VecDeque::new(),
            reads: Vec::new(),
            steps: 0,
            cycles: 0,
            nmis: 0,
            power_ons: 0,
            reset_vector: None,
            fault_at: None,
            debug: None,
            step_counter: Arc::new(AtomicU64::new(0)),
        }
    }
    pub fn with_script(pattern: &[u32], script: &[BusOp]) -> TestCpu {
        let mut cpu = TestCpu::new(pattern);
        cpu.script = script.iter().copied().collect();
        cpu
    }
    pub fn faulting_at(pattern: &[u32], step: u64) -> TestCpu {
        let mut cpu = TestCpu::new(pattern);
        cpu.fault_at = Some(step);
        cpu
    }
}

impl Cpu for TestCpu {
    fn power_on(&mut self, bus: &mut Memory) {
        self.power_ons += 1;
        self.reset_vector = Some(bus.read_u16(RESET_VECTOR_ADDR));
    }
    fn exec(&mut self, bus: &mut Memory) -> Result<u32, CpuFault> {
        if self.fault_at == Some(self.steps) {
            return Err(CpuFault::new(0x8000, "illegal opcode $02"));
        }
        match self.script.pop_front() {
            Some(BusOp::Read(addr)) => self.reads.push(bus.read(addr)),
            Some(BusOp::Write(addr, value)) => bus.write(addr, value),
            None => {}
        }
        let cycles = self.pattern[self.steps as usize % self.pattern.len()];
        self.steps += 1;
        self.cycles += cycles as u64;
        self.step_counter.fetch_add(1, Ordering::Relaxed);
        Ok(cycles)
    }
    fn interrupt(&mut self, kind: Interrupt) {
        if kind == Interrupt::Nmi {
            self.nmis += 1;
        }
    }
    fn set_debug(&mut self, debug: bool) {
        self.debug = Some(debug);
    }
}

/// A PPU that only counts clocks.
///
/// Enters vblank on the scanline after the last visible one, and finishes the frame after the last scanline.
#[derive(Debug)]
pub struct TestPpu {
    pub timing: Option<SystemTiming>,
    pub mirroring: Option<Mirroring>,
    pub pattern_banks: Vec<(usize, Vec<u8>)>,
    pub dot: u32,
    pub total_clocks: u64,
    pub vblanks: u64,
    pub frames: u64,
    pub begun_frames: u64,
    complete: bool,
    buffer: Vec<u8>,
}

impl TestPpu {
    pub fn new() -> TestPpu {
        TestPpu {
            timing: None,
            mirroring: None,
            pattern_banks: Vec::new(),
            dot: 0,
            total_clocks: 0,
            vblanks: 0,
            frames: 0,
            begun_frames: 0,
            complete: false,
            buffer: vec![0; 256 * 240],
        }
    }
}

impl Ppu for TestPpu {
    fn begin_frame(&mut self) {
        self.begun_frames += 1;
    }
    fn set_system_timing(&mut self, timing: SystemTiming) {
        self.timing = Some(timing);
    }
    fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = Some(mirroring);
    }
    fn load_pattern_bank(&mut self, index: usize, bank: &[u8]) {
        self.pattern_banks.push((index, bank.to_vec()));
    }
    fn advance(&mut self, _bus: &mut Memory, clocks: u32) -> bool {
        let timing = self.timing.unwrap_or_default();
        let vblank_start = timing.dots_per_scanline * (timing.visible_scanlines + 1);
        self.complete = false;
        self.total_clocks += clocks as u64;
        let before = self.dot;
        self.dot += clocks;
        let vblank = before < vblank_start && self.dot >= vblank_start;
        if vblank {
            self.vblanks += 1;
            self.buffer[0] = self.vblanks as u8;
        }
        if self.dot >= timing.clocks_per_frame() {
            self.dot -= timing.clocks_per_frame();
            self.frames += 1;
            self.complete = true;
        }
        vblank
    }
    fn frame_complete(&self) -> bool {
        self.complete
    }
    fn frame_buffer(&self) -> &[u8] {
        &self.buffer
    }
}

/// Settings that don't sleep, so tests run as fast as possible
pub fn fast_settings() -> Settings {
    Settings {
        limit_speed: false,
        ..Settings::default()
    }
}

/// Build an iNES image.
///
/// Every byte of program bank `i` is `0x10 * (i + 1)` except its vectors,
/// which all point to `0x8000 + 0x100 * i`. Every byte of pattern bank `i` is `0xC0 + i`.
pub fn build_rom(prg_banks: u8, chr_banks: u8, flags6: u8) -> Vec<u8> {
    let mut rom = vec![b'N', b'E', b'S', 0x1A, prg_banks, chr_banks, flags6];
    rom.resize(HEADER_SIZE, 0);
    for i in 0..prg_banks as usize {
        let mut bank = vec![0x10 * (i as u8 + 1); PRG_BANK_SIZE];
        let vector = (0x8000 + 0x100 * i as u16).to_le_bytes();
        bank[PRG_BANK_SIZE - 6..]
            .chunks_mut(2)
            .for_each(|v| v.copy_from_slice(&vector));
        rom.extend(bank);
    }
    for i in 0..chr_banks as usize {
        rom.extend(vec![0xC0 + i as u8; PATTERN_BANK_SIZE]);
    }
    rom
}

#[macro_export]
macro_rules! console_with_rom {
    ($cpu: expr, $rom: expr) => {{
        let mut console = Console::new($cpu, TestPpu::new(), common::fast_settings());
        console.load_rom($rom).unwrap();
        console
    }};
}
