// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers and output formatting.

use std::sync::Arc;

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::{DesktopId, WindowHandle};
use deskwerk_runtime::{Desktop, VirtualDesktops};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::Command;

/// One desktop as printed by `list` and friends.
#[derive(Debug, Serialize)]
pub struct DesktopRow {
    pub index: Option<usize>,
    pub id: DesktopId,
    pub name: String,
    pub wallpaper: String,
    pub current: bool,
}

impl DesktopRow {
    fn new(desktop: &Desktop, current: DesktopId) -> Self {
        Self {
            index: desktop.index(),
            id: desktop.id(),
            name: desktop.name(),
            wallpaper: desktop.wallpaper_path(),
            current: desktop.id() == current,
        }
    }

    fn line(&self) -> String {
        let marker = if self.current { '*' } else { ' ' };
        let index = self
            .index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "?".into());
        let name = if self.name.is_empty() {
            "(unnamed)"
        } else {
            &self.name
        };
        format!("{marker} {index:>2}  {}  {name}", self.id)
    }
}

pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn rows(&self, rows: &[DesktopRow]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(rows)?);
        } else {
            for row in rows {
                println!("{}", row.line());
            }
        }
        Ok(())
    }

    fn row(&self, row: &DesktopRow) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(row)?);
        } else {
            println!("{}", row.line());
        }
        Ok(())
    }
}

pub(crate) fn dispatch(desktops: &VirtualDesktops, out: &Output, command: Command) -> Result<()> {
    match command {
        Command::Info => info_cmd(desktops, out),
        Command::List => {
            let current = desktops.current_desktop()?.id();
            let rows: Vec<_> = desktops
                .all_desktops()?
                .iter()
                .map(|d| DesktopRow::new(d, current))
                .collect();
            out.rows(&rows)
        }
        Command::Current => out.row(&current_row(desktops)?),
        Command::Create { name } => {
            let desktop = desktops.create()?;
            if let Some(name) = name {
                desktop.rename(&name)?;
            }
            let current = desktops.current_desktop()?.id();
            out.row(&DesktopRow::new(&desktop, current))
        }
        Command::Switch { desktop } => select(desktops, &desktop)?.switch_to(),
        Command::Remove { desktop, fallback } => {
            let target = select(desktops, &desktop)?;
            let fallback = fallback.map(|f| select(desktops, &f)).transpose()?;
            if !desktops.remove(&target, fallback.as_deref())? {
                warn!(id = %target.id(), "desktop was already gone");
            }
            Ok(())
        }
        Command::Rename { desktop, name } => select(desktops, &desktop)?.rename(&name),
        Command::Move { desktop, index } => select(desktops, &desktop)?.move_to(index),
        Command::Wallpaper { path, desktop } => match desktop {
            Some(desktop) => select(desktops, &desktop)?.set_wallpaper(&path),
            None => desktops.set_wallpaper_for_all(&path),
        },
        Command::MoveWindow { window, desktop } => {
            let target = select(desktops, &desktop)?;
            let window = WindowHandle(window);
            if !desktops.can_move_view(window)? {
                return Err(DeskwerkError::Config(format!(
                    "window {:#x} cannot be moved between desktops",
                    window.0
                )));
            }
            desktops.move_view(window, &target)
        }
        Command::Watch => watch(desktops),
    }
}

/// Row for the current desktop, with its position filled in.
fn current_row(desktops: &VirtualDesktops) -> Result<DesktopRow> {
    let current = desktops.current_desktop()?;
    if current.index().is_none() {
        // Positions come from a full listing.
        desktops.all_desktops()?;
    }
    Ok(DesktopRow::new(&current, current.id()))
}

fn info_cmd(desktops: &VirtualDesktops, out: &Output) -> Result<()> {
    let build = desktops
        .build_version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".into());
    let variant = desktops.variant()?;
    let count = desktops.desktop_count()?;
    if out.json {
        let info = serde_json::json!({
            "build": build,
            "variant": variant.name(),
            "desktops": count,
            "state": desktops.state().name(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("build     {build}");
        println!("layout    {}", variant.name());
        println!("desktops  {count}");
        println!("state     {}", desktops.state());
    }
    Ok(())
}

/// Resolve a position or id to a desktop.
pub fn select(desktops: &VirtualDesktops, selector: &str) -> Result<Arc<Desktop>> {
    if let Ok(index) = selector.parse::<usize>() {
        return desktops
            .all_desktops()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| DeskwerkError::Config(format!("no desktop at position {index}")));
    }
    let id: DesktopId = selector.parse()?;
    desktops
        .find_by_id(id)?
        .ok_or_else(|| DeskwerkError::Config(format!("no desktop with id {id}")))
}

pub fn parse_window(raw: &str) -> std::result::Result<isize, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => isize::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid window handle {raw:?}: {e}"))
}

fn watch(desktops: &VirtualDesktops) -> Result<()> {
    desktops.initialize()?;
    let mut events = desktops.subscribe();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    info!("watching desktop events, press Ctrl+C to stop");
    runtime.block_on(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => println!("{event}"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskwerk_core::config::DesktopConfig;
    use deskwerk_core::types::BuildVersion;
    use deskwerk_interop::fake::FakeHost;

    fn simulated(names: &[&str]) -> (FakeHost, VirtualDesktops) {
        let host = FakeHost::with_desktops(BuildVersion::new(10, 0, 22621, 2215), names);
        let desktops = VirtualDesktops::with_host(Arc::new(host.clone()), DesktopConfig::default());
        (host, desktops)
    }

    #[test]
    fn selects_by_position_and_id() {
        let (host, desktops) = simulated(&["Main", "Work"]);
        assert_eq!(select(&desktops, "1").unwrap().name(), "Work");

        let id = host.desktop_ids()[0].to_string();
        assert_eq!(select(&desktops, &id).unwrap().name(), "Main");
        assert!(select(&desktops, "7").is_err());
        assert!(select(&desktops, "not-an-id").is_err());
    }

    #[test]
    fn create_with_name_renames() {
        let (host, desktops) = simulated(&["Main"]);
        let out = Output::new(true);
        dispatch(
            &desktops,
            &out,
            Command::Create {
                name: Some("Scratch".into()),
            },
        )
        .unwrap();
        let ids = host.desktop_ids();
        assert_eq!(host.name_of(ids[1]).as_deref(), Some("Scratch"));
    }

    #[test]
    fn row_marks_current_and_unnamed() {
        let (_host, desktops) = simulated(&[""]);
        let first = desktops.all_desktops().unwrap().remove(0);
        let line = DesktopRow::new(&first, first.id()).line();
        assert!(line.starts_with("*  0"));
        assert!(line.ends_with("(unnamed)"));
    }

    #[test]
    fn current_row_has_a_position() {
        let (host, desktops) = simulated(&["Main", "Work"]);
        let row = current_row(&desktops).unwrap();
        assert_eq!(row.index, Some(0));
        assert_eq!(row.id, host.current_id());
        assert!(row.line().starts_with("*  0"));
    }

    #[test]
    fn created_row_has_a_position() {
        let (_host, desktops) = simulated(&["Main", "Work"]);
        let created = desktops.create().unwrap();
        let row = DesktopRow::new(&created, desktops.current_desktop().unwrap().id());
        assert_eq!(row.index, Some(2));
        assert!(!row.current);
    }

    #[test]
    fn window_handles_parse_in_both_bases() {
        assert_eq!(parse_window("1234"), Ok(1234));
        assert_eq!(parse_window("0x10"), Ok(16));
        assert!(parse_window("0xzz").is_err());
    }
}
