use std::{collections::HashMap, fmt::Debug};

/// Callback run when the CPU reads an observed address.
///
/// Receives the address and the value read so far (the stored byte, or the replacement of an earlier observer).
/// Returning [Some] replaces the value the CPU sees.
pub type ReadObserver = Box<dyn FnMut(u16, u8) -> Option<u8> + Send>;
/// Callback run when the CPU writes to an observed address.
pub type WriteObserver = Box<dyn FnMut(u16, u8) -> WriteAction + Send>;

/// What should happen to the memory cell after the write observers have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    /// Store the value as normal.
    Store,
    /// Do not touch the underlying memory cell.
    Discard,
}

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// A single registered bus observer.
pub enum Observer {
    Read(ReadObserver),
    Write(WriteObserver),
}

impl Observer {
    pub fn access(&self) -> Access {
        match self {
            Observer::Read(_) => Access::Read,
            Observer::Write(_) => Access::Write,
        }
    }
}

impl Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Observer::{:?}", self.access())
    }
}

/// Per-address lists of bus observers.
///
/// Lets memory mapped peripherals hook into the bus without the bus knowing anything about them.
/// Observers for an address run in the order they were registered.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: HashMap<u16, Vec<Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> ObserverRegistry {
        ObserverRegistry::default()
    }
    /// Add an observer to the end of the list for `addr`.
    pub fn register(&mut self, addr: u16, observer: Observer) {
        self.observers.entry(addr).or_default().push(observer);
    }
    /// Number of observers of the given direction registered at `addr`.
    pub fn count(&self, addr: u16, access: Access) -> usize {
        self.observers
            .get(&addr)
            .map_or(0, |list| list.iter().filter(|o| o.access() == access).count())
    }
    /// Run the read observers at `addr` and return the value the CPU should see.
    pub fn dispatch_read(&mut self, addr: u16, stored: u8) -> u8 {
        let Some(list) = self.observers.get_mut(&addr) else {
            return stored;
        };
        list.iter_mut().fold(stored, |value, observer| match observer {
            Observer::Read(f) => f(addr, value).unwrap_or(value),
            Observer::Write(_) => value,
        })
    }
    /// Run the write observers at `addr`.
    ///
    /// Every observer runs, even after one of them has asked to discard the write.
    pub fn dispatch_write(&mut self, addr: u16, value: u8) -> WriteAction {
        let Some(list) = self.observers.get_mut(&addr) else {
            return WriteAction::Store;
        };
        let mut action = WriteAction::Store;
        for observer in list.iter_mut() {
            if let Observer::Write(f) = observer {
                if f(addr, value) == WriteAction::Discard {
                    action = WriteAction::Discard;
                }
            }
        }
        action
    }
}
