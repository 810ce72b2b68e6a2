//! Command handlers: drive the library and render the outcome.

pub mod activate;
pub mod deactivate;
pub mod install;
pub mod list;
pub mod status;
pub mod uninstall;

use anyhow::{Context as _, Result};
use bundlekit::{ActivationReport, Controller, DeactivationReport};
use std::path::Path;

use crate::Context;
use crate::ui;

/// Controller for this invocation, acting on the real host.
pub fn controller(ctx: &Context) -> Result<Controller> {
    Controller::new(ctx.settings.clone()).context("Could not prepare scratch space")
}

fn show_paths(label: &str, paths: &[impl AsRef<Path>]) {
    for path in paths {
        ui::dim(&format!("{label} {}", path.as_ref().display()));
    }
}

/// Host changes made by an activation.
pub fn print_activation(report: &ActivationReport) {
    show_paths("+", &report.installed);
    for path in &report.preserved {
        ui::warn(&format!("Kept existing {}", path.display()));
    }
    show_paths("→", &report.linked);
    for service in &report.started {
        ui::dim(&format!("▶ {service}"));
    }
}

/// Host changes made by a deactivation.
pub fn print_deactivation(report: &DeactivationReport) {
    for service in &report.stopped {
        ui::dim(&format!("■ {service}"));
    }
    show_paths("-", &report.removed);
    show_paths("-", &report.unlinked);
    for path in &report.modified {
        ui::warn(&format!("{} has local changes, left in place", path.display()));
    }
}
