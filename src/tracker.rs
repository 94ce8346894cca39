//! Power state change detection across watchdog runs.
//!
//! The last observed power state is kept in a [`StateStore`] so that separate
//! invocations can tell whether the compressor switched since the previous run.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::status::ActualPower;

/// Assumed previous state when nothing has been persisted yet.
pub const DEFAULT_PERSISTED: PowerState = PowerState::On;

/// The two alerting power states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumIter)]
pub enum PowerState {
    #[strum(to_string = "OFF")]
    Off,
    #[strum(to_string = "ON")]
    On,
}

impl PowerState {
    /// Single character record / wire encoding.
    pub fn wire(self) -> &'static str {
        match self {
            PowerState::Off => "0",
            PowerState::On => "1",
        }
    }

    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "0" => Some(PowerState::Off),
            "1" => Some(PowerState::On),
            _ => None,
        }
    }

    /// Numeric value for time series.
    pub fn value(self) -> u8 {
        match self {
            PowerState::Off => 0,
            PowerState::On => 1,
        }
    }

    /// `None` for [`ActualPower::Unknown`].
    pub fn from_actual(actual: ActualPower) -> Option<Self> {
        match actual {
            ActualPower::Off => Some(PowerState::Off),
            ActualPower::On => Some(PowerState::On),
            ActualPower::Unknown => None,
        }
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { PowerState::On } else { PowerState::Off }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read power state record {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write power state record {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable single-value record of the last observed power state.
pub trait StateStore {
    /// `Ok(None)` when nothing usable has been recorded.
    fn load(&mut self) -> Result<Option<PowerState>, StoreError>;

    fn save(&mut self, state: PowerState) -> Result<(), StoreError>;
}

/// Keeps the record as a one byte `0`/`1` file.
///
/// There is no locking: callers must make sure only one watchdog run uses a
/// given file at a time, e.g. by scheduling runs serially.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&mut self) -> Result<Option<PowerState>, StoreError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let state = contents
            .get(..1)
            .and_then(|first| core::str::from_utf8(first).ok())
            .and_then(PowerState::from_wire);
        if state.is_none() {
            log::warn!(
                "Ignoring unrecognised power state record in {}",
                self.path.display()
            );
        }
        Ok(state)
    }

    fn save(&mut self, state: PowerState) -> Result<(), StoreError> {
        fs::write(&self.path, state.wire()).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process record, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    state: Option<PowerState>,
    writes: usize,
}

impl MemoryStateStore {
    pub fn with_state(state: PowerState) -> Self {
        Self {
            state: Some(state),
            writes: 0,
        }
    }

    pub fn state(&self) -> Option<PowerState> {
        self.state
    }

    /// Number of times the record has been written.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StateStore for MemoryStateStore {
    fn load(&mut self) -> Result<Option<PowerState>, StoreError> {
        Ok(self.state)
    }

    fn save(&mut self, state: PowerState) -> Result<(), StoreError> {
        self.state = Some(state);
        self.writes += 1;
        Ok(())
    }
}

/// Outcome of comparing one observation with the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: PowerState,
    /// `None` when the observation could not be interpreted.
    pub observed: Option<PowerState>,
    /// Set to the new state when an alert is due.
    pub alert: Option<PowerState>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.alert.is_some()
    }
}

/// Compares fresh observations with the persisted record and keeps it current.
pub struct StateTracker<S: StateStore> {
    store: S,
}

impl<S: StateStore> StateTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record `observed` and report whether it differs from the previous run.
    ///
    /// A known observation is always written back, changed or not. An unknown
    /// one raises no alert and leaves the record as it was.
    pub fn observe(&mut self, observed: Option<PowerState>) -> Result<Transition, StoreError> {
        let transition = self.compare(observed)?;
        self.commit(&transition)?;
        Ok(transition)
    }

    /// Compare `observed` with the record without writing anything.
    pub fn compare(&mut self, observed: Option<PowerState>) -> Result<Transition, StoreError> {
        let previous = self.store.load()?.unwrap_or(DEFAULT_PERSISTED);

        let Some(current) = observed else {
            log::warn!("Power state unknown, keeping last record ({})", previous);
            return Ok(Transition {
                previous,
                observed: None,
                alert: None,
            });
        };

        let alert = (current != previous).then_some(current);
        if alert.is_some() {
            log::info!("Power state changed from {} to {}", previous, current);
        }

        Ok(Transition {
            previous,
            observed: Some(current),
            alert,
        })
    }

    /// Write the observed state of `transition` back, if it has one.
    pub fn commit(&mut self, transition: &Transition) -> Result<(), StoreError> {
        match transition.observed {
            Some(current) => self.store.save(current),
            None => Ok(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
