use anyhow::{Context as _, Result};

use super::{controller, print_activation, print_deactivation};
use crate::Context;
use crate::progress;
use crate::ui;

pub fn run(ctx: &Context, source: &str) -> Result<()> {
    let controller = controller(ctx)?;

    let pb = if ctx.verbose == 0 {
        progress::spinner(&format!("Installing {source}"))
    } else {
        None
    };
    let result = controller.install(source);
    progress::finish(pb);
    let outcome = result.with_context(|| format!("Could not install {source}"))?;

    if let Some(deactivated) = &outcome.deactivated {
        ui::info(&format!("Deactivated {} {}", outcome.id.name, deactivated.version));
        print_deactivation(deactivated);
    }

    ui::success(&format!("Installed {}", outcome.id));
    ui::kv("Path", &outcome.path.display().to_string());
    if let Some(previous) = &outcome.previous {
        ui::kv("Previous", previous);
    }
    if !outcome.rpath_patched.is_empty() {
        ui::kv("RPATH fixed", &outcome.rpath_patched.len().to_string());
    }

    match &outcome.activation {
        Some(report) => {
            ui::success(&format!("Activated {}", outcome.id));
            print_activation(report);
        }
        None => ui::info(&format!(
            "Not activated. Run: bundler activate {} {}",
            outcome.id.name, outcome.id.version
        )),
    }

    Ok(())
}
