use anyhow::{Context as _, Result};

use super::{controller, print_deactivation};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, bundle: &str, version: Option<&str>) -> Result<()> {
    let controller = controller(ctx)?;

    let outcome = controller.uninstall(bundle, version).with_context(|| match version {
        Some(version) => format!("Could not uninstall {bundle} {version}"),
        None => format!("Could not uninstall {bundle}"),
    })?;

    if let Some(report) = &outcome.deactivated {
        ui::info(&format!("Deactivated {bundle} {}", report.version));
        print_deactivation(report);
    }
    ui::success(&format!("Removed {}", outcome.removed.display()));
    Ok(())
}
