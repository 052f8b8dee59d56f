use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::events::EventBus;
use crate::services::worksheets::WorksheetService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    worksheets: WorksheetService,
}

impl AppState {
    pub(crate) fn new(settings: Settings, worksheets: WorksheetService) -> Self {
        Self { inner: Arc::new(InnerState { settings, worksheets }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn worksheets(&self) -> &WorksheetService {
        &self.inner.worksheets
    }

    pub(crate) fn events(&self) -> &EventBus {
        self.inner.worksheets.events()
    }
}
