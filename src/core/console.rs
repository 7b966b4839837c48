use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::*;
use thiserror::Error;

use crate::core::{
    cartridge::{self, RomError, RomHeader},
    ButtonHandle, Controller, ControllerPort, Cpu, Driver, ExitReason, Machine, Memory, Metrics,
    Ppu, Settings, SettingsError, StrobeLatch,
};

/// Where the console is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not running, the hardware can be inspected.
    Idle,
    /// The emulation thread is running.
    Running,
    /// The emulation thread is finishing up or has exited and not been joined yet.
    Stopping,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("The console is already running")]
    AlreadyRunning,
    #[error("The hardware is owned by the emulation thread, stop the console first")]
    Busy,
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Unable to start the emulation thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("The emulation thread panicked")]
    WorkerPanicked,
}

type Worker<C, P> = JoinHandle<(Driver<C, P>, ExitReason)>;

/// The console.
///
/// Owns the [Cpu], [Ppu], [Memory] and controller, and runs them on a background thread.
/// ```rust,ignore
/// let mut console = Console::new(cpu, ppu, Settings::default());
/// console.load_rom(&rom)?;
/// console.on_frame(|frame| screen.present(frame))?;
/// console.run()?;
/// // Later
/// console.stop();
/// let reason = console.wait()?;
/// ```
/// Dropping a running console stops it and waits for the thread to exit.
pub struct Console<C: Cpu, P: Ppu> {
    settings: Settings,
    driver: Option<Driver<C, P>>,
    worker: Option<Worker<C, P>>,
    stop: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    port: Arc<ControllerPort>,
    buttons: ButtonHandle,
    header: Option<RomHeader>,
}

impl<C: Cpu, P: Ppu> Console<C, P> {
    /// Create an idle console with no ROM loaded.
    ///
    /// The controller port is wired into memory here.
    pub fn new(cpu: C, ppu: P, settings: Settings) -> Console<C, P> {
        let buttons = ButtonHandle::default();
        let port = Arc::new(ControllerPort::new(buttons.clone()));
        let mut memory = Memory::new();
        ControllerPort::attach(&port, &mut memory);
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(Metrics::default());
        let machine = Machine { cpu, ppu, memory };
        Console {
            settings,
            driver: Some(Driver::new(machine, settings, stop.clone(), metrics.clone())),
            worker: None,
            stop,
            metrics,
            port,
            buttons,
            header: None,
        }
    }

    fn idle_driver(&mut self) -> Result<&mut Driver<C, P>, ConsoleError> {
        self.reap()?;
        self.driver.as_mut().ok_or(ConsoleError::Busy)
    }

    /// Load an iNES image.
    ///
    /// Only one ROM can be loaded per console, and only while it is idle.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<RomHeader, ConsoleError> {
        if self.header.is_some() {
            return Err(RomError::AlreadyLoaded.into());
        }
        let driver = self.idle_driver()?;
        let m = &mut driver.machine;
        let header = cartridge::load_rom(rom, &mut m.memory, &mut m.ppu)?;
        self.header = Some(header);
        Ok(header)
    }

    /// Set the function called with the frame buffer every time vblank starts.
    ///
    /// Runs on the emulation thread and holds it up, so it should return quickly.
    pub fn on_frame<F>(&mut self, f: F) -> Result<(), ConsoleError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.idle_driver()?.frame_ready = Some(Box::new(f));
        Ok(())
    }

    /// Set a function called on the emulation thread at the start of every run.
    ///
    /// Runs after the hardware has been powered on and before the first CPU step.
    pub fn on_start<F>(&mut self, f: F) -> Result<(), ConsoleError>
    where
        F: FnMut() + Send + 'static,
    {
        self.idle_driver()?.will_run = Some(Box::new(f));
        Ok(())
    }

    /// Set a predicate checked after every CPU step. The run ends the first time it returns `false`.
    pub fn run_while<F>(&mut self, f: F) -> Result<(), ConsoleError>
    where
        F: FnMut(&C) -> bool + Send + 'static,
    {
        self.idle_driver()?.keep_running = Some(Box::new(f));
        Ok(())
    }

    /// Start emulating on a background thread.
    ///
    /// The first run powers on the CPU and PPU; later runs resume where the last one stopped.
    pub fn run(&mut self) -> Result<(), ConsoleError> {
        self.reap()?;
        if self.worker.is_some() {
            return Err(ConsoleError::AlreadyRunning);
        }
        self.settings.validate()?;
        let mut driver = self.driver.take().ok_or(ConsoleError::WorkerPanicked)?;
        if self.header.is_none() {
            warn!("Running without a ROM loaded");
        }
        self.stop.store(false, Ordering::Release);
        let worker = thread::Builder::new()
            .name("nes-tandem".to_string())
            .spawn(move || {
                let reason = driver.run();
                (driver, reason)
            })?;
        info!("Console started");
        self.worker = Some(worker);
        Ok(())
    }

    /// Ask the emulation thread to stop after the CPU step it is on.
    ///
    /// Does not wait for it, see [Console::wait]. Can be called any number of times, in any state.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = &self.worker {
            // Wake it up if it is waiting out the end of a frame
            worker.thread().unpark();
        }
    }

    /// Wait for the emulation thread to exit and take the hardware back.
    ///
    /// Returns why the thread exited, or [None] if the console wasn't running.
    pub fn wait(&mut self) -> Result<Option<ExitReason>, ConsoleError> {
        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        match worker.join() {
            Ok((driver, reason)) => {
                info!("Console exited: {:?}", reason);
                self.driver = Some(driver);
                Ok(Some(reason))
            }
            Err(_) => {
                error!("The emulation thread panicked, the hardware is lost");
                Err(ConsoleError::WorkerPanicked)
            }
        }
    }

    // Join a thread that exited on its own
    fn reap(&mut self) -> Result<(), ConsoleError> {
        if self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            self.wait()?;
        }
        Ok(())
    }

    pub fn state(&self) -> RunState {
        match &self.worker {
            None => RunState::Idle,
            Some(w) if w.is_finished() || self.stop.load(Ordering::Acquire) => RunState::Stopping,
            Some(_) => RunState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The header of the loaded ROM, if any.
    pub fn header(&self) -> Option<RomHeader> {
        self.header
    }

    /// A handle to set the controller's buttons, usable while running.
    pub fn buttons(&self) -> ButtonHandle {
        self.buttons.clone()
    }

    pub fn set_buttons(&self, controller: Controller) {
        self.buttons.set(controller);
    }

    /// A copy of the controller's strobe latch, readable while running.
    pub fn strobe(&self) -> StrobeLatch {
        self.port.strobe()
    }

    /// The CPU, unless the emulation thread has it.
    pub fn cpu(&self) -> Option<&C> {
        self.driver.as_ref().map(|d| &d.machine.cpu)
    }
    pub fn cpu_mut(&mut self) -> Option<&mut C> {
        self.driver.as_mut().map(|d| &mut d.machine.cpu)
    }
    /// The PPU, unless the emulation thread has it.
    pub fn ppu(&self) -> Option<&P> {
        self.driver.as_ref().map(|d| &d.machine.ppu)
    }
    pub fn ppu_mut(&mut self) -> Option<&mut P> {
        self.driver.as_mut().map(|d| &mut d.machine.ppu)
    }
    /// The memory, unless the emulation thread has it.
    pub fn memory(&self) -> Option<&Memory> {
        self.driver.as_ref().map(|d| &d.machine.memory)
    }
    /// Mutable memory, e.g. to register more bus observers before running.
    pub fn memory_mut(&mut self) -> Option<&mut Memory> {
        self.driver.as_mut().map(|d| &mut d.machine.memory)
    }

    /// Average wall clock time per CPU cycle over the last frame.
    pub fn cpu_cycle_time(&self) -> Duration {
        self.metrics.cycle_time()
    }
    /// Time spent in the frame callback during the last frame.
    pub fn render_time(&self) -> Duration {
        self.metrics.render_time()
    }
    /// Wall clock time of the last frame, including the time spent pacing.
    pub fn frame_time(&self) -> Duration {
        self.metrics.frame_time()
    }
    /// Number of frames completed.
    pub fn frames(&self) -> u64 {
        self.metrics.frames()
    }
    /// All of the timing metrics, readable while running.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl<C: Cpu, P: Ppu> Drop for Console<C, P> {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok((_, reason)) => debug!("Console dropped after exit: {:?}", reason),
                Err(_) => error!("The emulation thread panicked"),
            }
        }
    }
}
