use anyhow::{Context as _, Result};

use super::{controller, print_activation};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, bundle: &str, version: &str) -> Result<()> {
    let controller = controller(ctx)?;
    let previous = controller.store().current_version(bundle).ok().flatten();

    let report = controller
        .activate(bundle, version)
        .with_context(|| format!("Could not activate {bundle} {version}"))?;

    match previous {
        Some(previous) if previous != version => {
            ui::success(&format!("Switched {bundle} from {previous} to {version}"));
        }
        _ => ui::success(&format!("Activated {bundle} {version}")),
    }
    print_activation(&report);
    Ok(())
}
