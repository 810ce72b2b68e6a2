use anyhow::{Context as _, Result};

use super::{controller, print_deactivation};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, bundle: &str) -> Result<()> {
    let controller = controller(ctx)?;

    match controller
        .deactivate_current(bundle)
        .with_context(|| format!("Could not deactivate {bundle}"))?
    {
        Some(report) => {
            ui::success(&format!("Deactivated {bundle} {}", report.version));
            print_deactivation(&report);
            if !report.modified.is_empty() {
                ui::dim("Use --force to remove locally changed files as well");
            }
        }
        None => ui::info(&format!("{bundle} has no current version to deactivate")),
    }
    Ok(())
}
