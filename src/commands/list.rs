use anyhow::{Context as _, Result};
use bundlekit::{BundleEntry, Controller, VersionEntry};
use colored::Colorize;
use serde::Serialize;

use super::controller;
use crate::Context;
use crate::ui;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Listing {
    Bundles(Vec<BundleEntry>),
    Versions {
        name: String,
        versions: Vec<VersionEntry>,
    },
}

pub fn run(ctx: &Context, bundle: Option<&str>, json: bool) -> Result<()> {
    let controller = controller(ctx)?;
    let listing = collect(&controller, bundle)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    match listing {
        Listing::Bundles(bundles) => show_bundles(&controller, &bundles),
        Listing::Versions { name, versions } => show_versions(&controller, &name, &versions),
    }
    Ok(())
}

fn collect(controller: &Controller, bundle: Option<&str>) -> Result<Listing> {
    Ok(match bundle {
        Some(name) => Listing::Versions {
            name: name.to_string(),
            versions: controller
                .list_versions(name)
                .with_context(|| format!("Could not list versions of {name}"))?,
        },
        None => Listing::Bundles(controller.list().context("Could not list bundles")?),
    })
}

fn show_bundles(controller: &Controller, bundles: &[BundleEntry]) {
    if bundles.is_empty() {
        ui::info(&format!(
            "No bundles installed in {}",
            controller.store().root().display()
        ));
        return;
    }

    ui::header("Bundles");
    for bundle in bundles {
        let current = match &bundle.current {
            Some(version) => version.green().to_string(),
            None => "unknown".dimmed().to_string(),
        };
        println!("  {:<24} {}", bundle.name.bold(), current);
        if controller.store().is_dangling(&bundle.name) {
            ui::warn(&format!("{}: current points at a missing version", bundle.name));
        }
    }
}

fn show_versions(controller: &Controller, name: &str, versions: &[VersionEntry]) {
    ui::header(&format!("Bundle: {name}"));
    if versions.is_empty() {
        ui::dim("No versions installed");
    }
    for entry in versions {
        let marker = if entry.current { "*".green() } else { " ".normal() };
        let installed = entry
            .installed_at
            .map(ui::format_time)
            .unwrap_or_else(|| "-".to_string());
        println!("  {marker} {:<20} {}", entry.version, installed.dimmed());
    }
    if controller.store().is_dangling(name) {
        ui::warn("current points at a missing version");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bundlekit::Settings;
    use bundlekit::system::MockSystem;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn controller(root: &std::path::Path) -> Controller {
        Controller::with_system(Settings::new(root), Box::new(MockSystem::new())).unwrap()
    }

    #[test]
    fn test_bundles_json() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("web/web-1")).unwrap();
        symlink("web-1", tmp.path().join("web/current")).unwrap();
        fs::create_dir_all(tmp.path().join("api")).unwrap();

        let listing = collect(&controller(tmp.path()), None).unwrap();
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                { "name": "api", "current": null },
                { "name": "web", "current": "1" },
            ])
        );
    }

    #[test]
    fn test_versions_json() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("web/web-1")).unwrap();
        fs::create_dir_all(tmp.path().join("web/web-2")).unwrap();
        symlink("web-2", tmp.path().join("web/current")).unwrap();

        let listing = collect(&controller(tmp.path()), Some("web")).unwrap();
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value["name"], "web");
        assert_eq!(value["versions"][0]["version"], "1");
        assert_eq!(value["versions"][0]["current"], false);
        assert_eq!(value["versions"][1]["current"], true);
    }

    #[test]
    fn test_unknown_bundle_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(collect(&controller(tmp.path()), Some("ghost")).is_err());
    }
}
