use anyhow::{Context as _, Result};
use bundlekit::ActivationStatus;

use super::controller;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, bundle: &str) -> Result<()> {
    let controller = controller(ctx)?;
    let report = controller
        .status(bundle)
        .with_context(|| format!("Could not read status of {bundle}"))?;

    ui::header(&format!("Bundle: {bundle}"));
    ui::kv("Version", report.version.as_deref().unwrap_or("-"));
    ui::kv("Status", &ui::status(report.status).to_string());

    if report.status != ActivationStatus::NotInstalled {
        let (present, expected) = report.templates;
        ui::kv("Host files", &format!("{present}/{expected}"));
        let (present, expected) = report.links;
        ui::kv("Binary links", &format!("{present}/{expected}"));
    }
    if report.dangling {
        ui::warn("current points at a missing version");
    }
    Ok(())
}
