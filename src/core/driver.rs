use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::*;

use crate::core::{Cpu, CpuFault, FramePacer, FrameReport, Interrupt, Memory, Ppu, Settings};

/// Called with the PPU's frame buffer every time vblank starts.
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send>;
/// Called after every CPU step; returning `false` ends the run.
pub type StepPredicate<C> = Box<dyn FnMut(&C) -> bool + Send>;
/// Called on the emulation thread at the start of every run, before the first CPU step.
pub type StartCallback = Box<dyn FnMut() + Send>;

/// Why the driver loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// [Console::stop][crate::core::Console::stop] was called.
    Stopped,
    /// The step predicate returned `false`.
    Declined,
    /// The CPU could not execute an instruction.
    CpuFault(CpuFault),
    /// An instruction took more cycles than the PPU clock can count at the configured ratio.
    ClockOverflow { cycles: u32, ratio: u32 },
}

// All of the hardware state of the console
pub(crate) struct Machine<C, P> {
    pub(crate) cpu: C,
    pub(crate) ppu: P,
    pub(crate) memory: Memory,
}

/// Timing metrics of the last completed frame.
///
/// Written by the emulation thread and read from anywhere; readers may see a value from the previous frame.
#[derive(Debug, Default)]
pub struct Metrics {
    cycle_time: AtomicU64,
    frame_time: AtomicU64,
    render_time: AtomicU64,
    frames: AtomicU64,
}

impl Metrics {
    fn record(&self, report: &FrameReport, render_time: Duration) {
        self.cycle_time
            .store(report.cycle_time.as_nanos() as u64, Ordering::Relaxed);
        self.frame_time
            .store(report.frame_time.as_nanos() as u64, Ordering::Relaxed);
        self.render_time
            .store(render_time.as_nanos() as u64, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
    /// Average wall clock time per CPU cycle
    pub fn cycle_time(&self) -> Duration {
        Duration::from_nanos(self.cycle_time.load(Ordering::Relaxed))
    }
    /// Wall clock time of the whole frame, pacing included
    pub fn frame_time(&self) -> Duration {
        Duration::from_nanos(self.frame_time.load(Ordering::Relaxed))
    }
    /// Time spent in the frame callback
    pub fn render_time(&self) -> Duration {
        Duration::from_nanos(self.render_time.load(Ordering::Relaxed))
    }
    /// Number of frames completed since the console was created
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

/// Advance the PPU, forwarding the start of vblank to the CPU as an NMI.
///
/// Returns whether vblank started.
pub fn advance_ppu<C: Cpu, P: Ppu>(cpu: &mut C, ppu: &mut P, memory: &mut Memory, clocks: u32) -> bool {
    let vblank = ppu.advance(memory, clocks);
    if vblank {
        cpu.interrupt(Interrupt::Nmi);
    }
    vblank
}

// Counters for the frame in progress
#[derive(Debug, Default)]
struct FrameTiming {
    started: Option<Instant>,
    cycles: u64,
    render_time: Duration,
}

/// Runs the CPU and PPU in lock step.
///
/// Owned by the [Console][crate::core::Console] while idle and moved onto the emulation thread while running.
pub(crate) struct Driver<C, P> {
    pub(crate) machine: Machine<C, P>,
    pub(crate) frame_ready: Option<FrameCallback>,
    pub(crate) keep_running: Option<StepPredicate<C>>,
    pub(crate) will_run: Option<StartCallback>,
    settings: Settings,
    pacer: FramePacer,
    timing: FrameTiming,
    powered_on: bool,
    stop: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
}

impl<C: Cpu, P: Ppu> Driver<C, P> {
    pub(crate) fn new(
        machine: Machine<C, P>,
        settings: Settings,
        stop: Arc<AtomicBool>,
        metrics: Arc<Metrics>,
    ) -> Driver<C, P> {
        Driver {
            machine,
            frame_ready: None,
            keep_running: None,
            will_run: None,
            pacer: FramePacer::from_refresh_rate(settings.refresh_rate),
            settings,
            timing: FrameTiming::default(),
            powered_on: false,
            stop,
            metrics,
        }
    }

    fn power_on(&mut self) {
        let m = &mut self.machine;
        m.ppu.set_system_timing(self.settings.timing);
        m.ppu.power_on();
        m.cpu.set_debug(self.settings.debug);
        m.cpu.power_on(&mut m.memory);
        self.powered_on = true;
        debug!(
            "Powered on with {:?}, {} PPU clocks per CPU cycle, {:?} per frame",
            self.settings.timing,
            self.settings.ppu_clocks_per_cpu_cycle,
            self.pacer.target()
        );
    }

    /// Execute one CPU step and everything it triggers.
    ///
    /// Returns `true` if the step finished a frame, or the reason the run has to end.
    pub(crate) fn step(&mut self) -> Result<bool, ExitReason> {
        let m = &mut self.machine;
        if self.timing.started.is_none() {
            self.timing.started = Some(Instant::now());
            m.ppu.begin_frame();
        }
        let cycles = m.cpu.exec(&mut m.memory).map_err(ExitReason::CpuFault)?;
        self.timing.cycles += cycles as u64;
        let ratio = self.settings.ppu_clocks_per_cpu_cycle;
        let clocks = cycles
            .checked_mul(ratio)
            .ok_or(ExitReason::ClockOverflow { cycles, ratio })?;
        if advance_ppu(&mut m.cpu, &mut m.ppu, &mut m.memory, clocks) {
            if let Some(frame_ready) = &mut self.frame_ready {
                let render_start = Instant::now();
                frame_ready(m.ppu.frame_buffer());
                self.timing.render_time += render_start.elapsed();
            }
        }
        if m.ppu.frame_complete() {
            self.finish_frame();
            return Ok(true);
        }
        Ok(false)
    }

    fn finish_frame(&mut self) {
        let timing = std::mem::take(&mut self.timing);
        let started = timing.started.unwrap_or_else(Instant::now);
        let report = self.pacer.finish_frame(
            started,
            timing.cycles,
            self.settings.limit_speed,
            &self.stop,
        );
        self.metrics.record(&report, timing.render_time);
        if self.settings.debug {
            debug!(
                "Frame {}: {} CPU cycles, busy {:?}, total {:?}, {:?} per cycle, {:?} rendering",
                self.metrics.frames(),
                timing.cycles,
                report.busy,
                report.frame_time,
                report.cycle_time,
                timing.render_time
            );
        }
    }

    /// Run until a step fails, the step predicate declines or a stop is requested.
    ///
    /// A frame left unfinished is discarded; the next run starts timing a fresh one.
    pub(crate) fn run(&mut self) -> ExitReason {
        if !self.powered_on {
            self.power_on();
        }
        if let Some(will_run) = &mut self.will_run {
            will_run();
        }
        let reason = loop {
            if let Err(reason) = self.step() {
                error!("Stopping after {:?}", reason);
                break reason;
            }
            if let Some(keep_running) = &mut self.keep_running {
                if !keep_running(&self.machine.cpu) {
                    break ExitReason::Declined;
                }
            }
            if self.stop.load(Ordering::Acquire) {
                break ExitReason::Stopped;
            }
        };
        self.timing = FrameTiming::default();
        reason
    }
}
