//! The build unit registry.
//!
//! Holds every unit known to the current context in registration order,
//! together with the run state: which units have been built and which are
//! being built right now. One lock covers both so that "check and mark"
//! is a single atomic step, and a condition variable on that lock lets a
//! caller wait for a unit someone else is building.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};

use crate::error::BuildError;
use crate::unit::BuildUnit;

#[derive(Debug, Default)]
struct RegistryState {
    units: IndexMap<String, Arc<BuildUnit>>,
    built: HashSet<String>,
    in_flight: HashSet<String>,
}

/// Result of [`Registry::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the unit and must finish with
    /// [`Registry::mark_built`] or [`Registry::abandon`].
    Acquired,
    /// The unit was already built this run.
    Built,
}

/// Insertion-ordered table of build units plus per-run build state.
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
    settled: Condvar,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `unit`, replacing any unit of the same name.
    ///
    /// Replacing a unit whose configuration differs is allowed but logged.
    pub fn register(&self, unit: BuildUnit) {
        let mut state = self.state.lock();
        let name = unit.name().to_string();
        if let Some(previous) = state.units.get(&name) {
            if previous.spec() != unit.spec() {
                tracing::warn!(unit = %name, "replacing registered unit with a different configuration");
            }
        }
        state.units.insert(name, Arc::new(unit));
    }

    /// Registers `unit`, failing if a unit of the same name with a different
    /// configuration is already registered. Re-registering an identical
    /// configuration is accepted and keeps the original entry.
    pub fn register_unique(&self, unit: BuildUnit) -> Result<(), BuildError> {
        let mut state = self.state.lock();
        match state.units.get(unit.name()) {
            Some(existing) if existing.spec() == unit.spec() => Ok(()),
            Some(_) => Err(BuildError::Conflict {
                unit: unit.name().to_string(),
            }),
            None => {
                state.units.insert(unit.name().to_string(), Arc::new(unit));
                Ok(())
            }
        }
    }

    /// Returns the unit called `name`.
    pub fn get(&self, name: &str) -> Result<Arc<BuildUnit>, BuildError> {
        self.lookup(name).ok_or_else(|| BuildError::NotFound {
            kind: "unit",
            name: name.to_string(),
        })
    }

    /// Returns the unit called `name`, if registered.
    pub fn lookup(&self, name: &str) -> Option<Arc<BuildUnit>> {
        self.state.lock().units.get(name).cloned()
    }

    /// Returns `true` if a unit called `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().units.contains_key(name)
    }

    /// Returns the registration index of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.state.lock().units.get_index_of(name)
    }

    /// Returns every registered name in registration order.
    pub fn names(&self) -> Vec<String> {
        self.state.lock().units.keys().cloned().collect()
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.state.lock().units.len()
    }

    /// Returns `true` if no unit is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claims `name` for building.
    ///
    /// Returns `false` if the unit was already built this run or is being
    /// built by another caller; otherwise records it as in flight and
    /// returns `true`.
    pub fn try_begin(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        if state.built.contains(name) || state.in_flight.contains(name) {
            return false;
        }
        state.in_flight.insert(name.to_string());
        true
    }

    /// Claims `name` for building, waiting while another caller has it in
    /// flight.
    ///
    /// Returns [`Claim::Built`] once the unit is built. If the other caller
    /// abandons the unit instead, the claim passes to this caller.
    pub fn claim(&self, name: &str) -> Claim {
        let mut state = self.state.lock();
        loop {
            if state.built.contains(name) {
                return Claim::Built;
            }
            if !state.in_flight.contains(name) {
                state.in_flight.insert(name.to_string());
                return Claim::Acquired;
            }
            tracing::debug!(unit = %name, "waiting for unit built by another caller");
            self.settled.wait(&mut state);
        }
    }

    /// Records `name` as built (or verified up to date) for this run.
    pub fn mark_built(&self, name: &str) {
        let mut state = self.state.lock();
        state.in_flight.remove(name);
        state.built.insert(name.to_string());
        self.settled.notify_all();
    }

    /// Releases an in-flight claim after a failed build.
    pub fn abandon(&self, name: &str) {
        self.state.lock().in_flight.remove(name);
        self.settled.notify_all();
    }

    /// Returns `true` if `name` was built this run.
    pub fn was_built(&self, name: &str) -> bool {
        self.state.lock().built.contains(name)
    }

    /// Clears every unit and all run state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.units.clear();
        state.built.clear();
        state.in_flight.clear();
    }
}
