//! Application state shared across handlers.

use crate::config::ConfigStore;
use crate::materialize::GeneratedFiles;
use crate::supervisor::Supervisor;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Supervisor,
}

impl AppState {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.supervisor.store().as_ref()
    }

    pub fn generated_files(&self) -> &GeneratedFiles {
        self.supervisor.generated_files()
    }
}
