//! Status surface notifications
//!
//! The matchmaking controller only ever tells the user-facing surface to show
//! or hide two widgets: the progress indicator and the control panel.

use crate::types::StatusUpdate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Receiver of progress notifications
#[cfg_attr(test, mockall::automock)]
pub trait StatusSurface: Send + Sync {
    /// Show or hide the "connecting..." progress indicator
    fn show_progress(&self, visible: bool);

    /// Show or hide the panel that lets the user start matchmaking
    fn show_control_panel(&self, visible: bool);
}

/// Apply a single status update to a surface
pub fn apply_update(surface: &dyn StatusSurface, update: StatusUpdate) {
    match update {
        StatusUpdate::ShowProgress(visible) => surface.show_progress(visible),
        StatusUpdate::ShowControlPanel(visible) => surface.show_control_panel(visible),
    }
}

/// Status surface that only logs
#[derive(Debug, Clone, Default)]
pub struct TracingStatusSurface {
    label: String,
}

impl TracingStatusSurface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl StatusSurface for TracingStatusSurface {
    fn show_progress(&self, visible: bool) {
        info!("[{}] progress indicator visible: {}", self.label, visible);
    }

    fn show_control_panel(&self, visible: bool) {
        info!("[{}] control panel visible: {}", self.label, visible);
    }
}

/// Visibility of the two status widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub progress_visible: bool,
    pub control_panel_visible: bool,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            progress_visible: false,
            control_panel_visible: true,
        }
    }
}

/// Status surface whose current view can be read from other tasks
#[derive(Debug, Clone, Default)]
pub struct SharedStatusPanel {
    view: Arc<RwLock<StatusView>>,
}

impl SharedStatusPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current widget visibility
    pub fn view(&self) -> StatusView {
        *self.view.read().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut StatusView)) {
        let mut view = self.view.write().unwrap_or_else(|e| e.into_inner());
        f(&mut view);
    }
}

impl StatusSurface for SharedStatusPanel {
    fn show_progress(&self, visible: bool) {
        self.update(|view| view.progress_visible = visible);
    }

    fn show_control_panel(&self, visible: bool) {
        self.update(|view| view.control_panel_visible = visible);
    }
}
