// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end behaviour of `VirtualDesktops` against the in-memory shell.

use std::sync::{Arc, Barrier};
use std::thread;

use deskwerk_core::config::DesktopConfig;
use deskwerk_core::error::DeskwerkError;
use deskwerk_core::types::{AdjacentDirection, BuildVersion, DesktopId, NativeErrorCode, WindowHandle};
use deskwerk_interop::catalog::{LogicalOp, VariantId};
use deskwerk_interop::fake::FakeHost;
use deskwerk_runtime::{DesktopEventKind, RecoveryState, VirtualDesktops};

const WIN11_23H2: BuildVersion = BuildVersion::new(10, 0, 22621, 2215);

fn context(host: &FakeHost) -> VirtualDesktops {
    VirtualDesktops::with_host(Arc::new(host.clone()), DesktopConfig::default())
}

#[test]
fn lazily_binds_on_first_call() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    assert_eq!(ctx.state(), RecoveryState::Uninitialized);

    let current = ctx.current_desktop().unwrap();
    assert_eq!(current.id(), host.current_id());
    assert_eq!(ctx.state(), RecoveryState::Active);
    assert_eq!(ctx.variant().unwrap(), VariantId::Build22621);
    assert_eq!(host.registrations(), 1);
    assert_eq!(host.restart_listeners(), 1);
}

#[test]
fn concurrent_resolution_yields_one_instance() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let ctx = ctx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.current_desktop().unwrap()
            })
        })
        .collect();
    let seen: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    for desktop in &seen[1..] {
        assert!(Arc::ptr_eq(&seen[0], desktop));
    }
    assert_eq!(ctx.cached_count(), 1);
}

#[test]
fn created_desktop_is_found_by_id() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);

    let created = ctx.create().unwrap();
    let found = ctx.find_by_id(created.id()).unwrap().unwrap();
    assert_eq!(found.id(), created.id());
    assert!(Arc::ptr_eq(&found, &created));
    assert_eq!(created.index(), Some(1));
    assert_eq!(ctx.desktop_count().unwrap(), 2);
}

#[test]
fn unknown_id_is_benign() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    assert!(ctx.find_by_id(DesktopId::new()).unwrap().is_none());
}

#[test]
fn removing_twice_is_benign() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main", "Work"]);
    let ctx = context(&host);
    let work = ctx.find_by_id(host.desktop_ids()[1]).unwrap().unwrap();

    assert!(ctx.remove(&work, None).unwrap());
    assert!(!ctx.remove(&work, None).unwrap());
    assert_eq!(host.desktop_ids().len(), 1);
}

#[test]
fn removing_current_desktop_falls_back_to_neighbour() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main", "Work"]);
    let ctx = context(&host);
    let main = ctx.current_desktop().unwrap();

    assert!(main.remove(None).unwrap());
    assert_eq!(ctx.current_desktop().unwrap().name(), "Work");
}

#[test]
fn only_desktop_cannot_be_removed() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    let only = ctx.current_desktop().unwrap();

    let err = ctx.remove(&only, None).unwrap_err();
    assert!(matches!(err, DeskwerkError::NativeCall { op: "remove_desktop", .. }));
}

#[test]
fn restart_rebuilds_binding_and_clears_cache() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    let before = ctx.current_desktop().unwrap();
    let generation = ctx.generation().unwrap();
    let mut events = ctx.subscribe();

    host.restart_shell();

    assert_eq!(ctx.state(), RecoveryState::Active);
    assert_eq!(ctx.cached_count(), 0);
    assert!(ctx.generation().unwrap() > generation);
    assert_eq!(host.registrations(), 1);

    let after = ctx.current_desktop().unwrap();
    assert_eq!(after.id(), before.id());
    assert!(!Arc::ptr_eq(&after, &before));

    let event = events.try_recv().unwrap();
    assert!(matches!(event.kind, DesktopEventKind::Recovered { .. }));
}

#[test]
fn stale_wrappers_keep_last_known_values() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main"]);
    let ctx = context(&host);
    let old = ctx.current_desktop().unwrap();

    host.restart_shell();
    host.user_rename(old.id(), "Renamed elsewhere");

    assert_eq!(old.name(), "Main");
    assert_eq!(ctx.current_desktop().unwrap().name(), "Renamed elsewhere");

    // Still usable: the wrapper is re-resolved through the new binding.
    old.rename("Again").unwrap();
    assert_eq!(host.name_of(old.id()).as_deref(), Some("Again"));
}

#[test]
fn failed_rebuild_waits_for_next_restart() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    ctx.initialize().unwrap();

    host.refuse_connections(true);
    host.restart_shell();
    assert_eq!(ctx.state(), RecoveryState::Failed);
    assert!(matches!(ctx.current_desktop(), Err(DeskwerkError::Binding(_))));

    host.refuse_connections(false);
    host.restart_shell();
    assert_eq!(ctx.state(), RecoveryState::Active);
    assert!(ctx.current_desktop().is_ok());
}

#[test]
fn rename_mutates_cached_wrapper_in_place() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main", "Work"]);
    let ctx = context(&host);
    let main = ctx.current_desktop().unwrap();
    assert_eq!(main.name(), "Main");
    let cached = ctx.cached_count();
    let mut events = ctx.subscribe();

    main.rename("Primary").unwrap();

    assert_eq!(main.name(), "Primary");
    assert_eq!(ctx.cached_count(), cached);
    let again = ctx.current_desktop().unwrap();
    assert!(Arc::ptr_eq(&again, &main));

    match events.try_recv().unwrap().kind {
        DesktopEventKind::Renamed { desktop, name } => {
            assert!(Arc::ptr_eq(&desktop, &main));
            assert_eq!(name, "Primary");
        }
        other => panic!("unexpected event: {other}"),
    }
}

#[test]
fn outside_changes_reach_cached_wrappers() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main", "Work"]);
    let ctx = context(&host);
    let work = ctx.find_by_id(host.desktop_ids()[1]).unwrap().unwrap();
    let mut events = ctx.subscribe();

    host.user_rename(work.id(), "Play");
    assert_eq!(work.name(), "Play");

    let extra = host.user_create("Extra");
    match events.try_recv().unwrap().kind {
        DesktopEventKind::Renamed { .. } => {}
        other => panic!("unexpected event: {other}"),
    }
    match events.try_recv().unwrap().kind {
        DesktopEventKind::Created(desktop) => {
            assert_eq!(desktop.id(), extra);
            assert_eq!(desktop.name(), "Extra");
        }
        other => panic!("unexpected event: {other}"),
    }

    host.user_remove(work.id());
    let removed = loop {
        match events.try_recv().unwrap().kind {
            DesktopEventKind::Removed { desktop, .. } => break desktop,
            _ => continue,
        }
    };
    assert!(Arc::ptr_eq(&removed, &work));
    assert!(ctx.find_by_id(work.id()).unwrap().is_none());
}

#[test]
fn switching_reports_current_change() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["Main", "Work"]);
    let ctx = context(&host);
    let main = ctx.current_desktop().unwrap();
    let work = main.right().unwrap().unwrap();
    let mut events = ctx.subscribe();

    work.switch_to().unwrap();
    assert_eq!(host.current_id(), work.id());
    match events.try_recv().unwrap().kind {
        DesktopEventKind::CurrentChanged { old, new } => {
            assert!(Arc::ptr_eq(&old, &main));
            assert!(Arc::ptr_eq(&new, &work));
        }
        other => panic!("unexpected event: {other}"),
    }
    assert!(work.right().unwrap().is_none());
    assert!(Arc::ptr_eq(&ctx.adjacent(&work, AdjacentDirection::Left).unwrap().unwrap(), &main));
}

#[test]
fn moves_update_positions() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["A", "B", "C"]);
    let ctx = context(&host);
    let all = ctx.all_desktops().unwrap();
    assert_eq!(
        all.iter().map(|d| d.index()).collect::<Vec<_>>(),
        [Some(0), Some(1), Some(2)]
    );

    all[0].move_to(2).unwrap();
    assert_eq!(
        all.iter().map(|d| d.index()).collect::<Vec<_>>(),
        [Some(2), Some(0), Some(1)]
    );
    assert_eq!(host.desktop_ids()[2], all[0].id());
}

#[test]
fn wallpapers_are_tracked() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["A", "B"]);
    let ctx = context(&host);
    let all = ctx.all_desktops().unwrap();

    all[0].set_wallpaper(r"C:\walls\a.jpg").unwrap();
    assert_eq!(all[0].wallpaper_path(), r"C:\walls\a.jpg");

    ctx.set_wallpaper_for_all(r"C:\walls\all.jpg").unwrap();
    assert!(all.iter().all(|d| d.wallpaper_path() == r"C:\walls\all.jpg"));
}

#[test]
fn views_move_between_desktops() {
    let host = FakeHost::with_desktops(WIN11_23H2, &["A", "B"]);
    let ctx = context(&host);
    let b = ctx.find_by_id(host.desktop_ids()[1]).unwrap().unwrap();

    assert!(ctx.can_move_view(WindowHandle(0x1234)).unwrap());
    ctx.move_view(WindowHandle(0x1234), &b).unwrap();
    assert_eq!(host.view_desktop(0x1234), Some(b.id()));
}

#[test]
fn oldest_layout_rejects_newer_operations_without_calling() {
    let host = FakeHost::new(BuildVersion::new(10, 0, 10240, 0));
    let ctx = context(&host);
    let current = ctx.current_desktop().unwrap();
    assert_eq!(current.name(), "");

    let calls = host.native_calls();
    assert!(matches!(
        ctx.all_current_desktops(),
        Err(DeskwerkError::UnsupportedOperation { op: "get_all_current_desktops", .. })
    ));
    assert!(matches!(
        current.rename("Nope"),
        Err(DeskwerkError::UnsupportedOperation { .. })
    ));
    assert_eq!(host.native_calls(), calls);
}

#[test]
fn bulk_query_on_monitor_layout() {
    let host = FakeHost::new(BuildVersion::new(10, 0, 22000, 0));
    let ctx = context(&host);
    let current = ctx.all_current_desktops().unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id(), host.current_id());
}

#[test]
fn hosts_below_every_layout_are_unsupported() {
    let host = FakeHost::new(BuildVersion::new(10, 0, 10000, 0));
    let ctx = context(&host);
    assert!(!ctx.is_supported());
    assert!(matches!(
        ctx.current_desktop(),
        Err(DeskwerkError::Unsupported { build: Some(_) })
    ));
    assert_eq!(ctx.state(), RecoveryState::Uninitialized);
    assert_eq!(host.native_calls(), 0);
}

#[test]
fn build_override_pins_layout() {
    let host = FakeHost::new(BuildVersion::new(10, 0, 19041, 0));
    let config = DesktopConfig {
        build_override: Some(BuildVersion::new(10, 0, 22000, 0)),
        ..DesktopConfig::default()
    };
    let ctx = VirtualDesktops::with_host(Arc::new(host), config);
    assert_eq!(ctx.variant().unwrap(), VariantId::Build22000);
}

#[test]
fn shutdown_releases_everything() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    ctx.current_desktop().unwrap();

    ctx.shutdown();
    assert_eq!(ctx.state(), RecoveryState::Uninitialized);
    assert_eq!(host.registrations(), 0);
    assert_eq!(host.restart_listeners(), 0);
    assert_eq!(ctx.cached_count(), 0);

    // Binds again on demand.
    ctx.current_desktop().unwrap();
    assert_eq!(ctx.state(), RecoveryState::Active);
}

#[test]
fn per_call_benign_codes_widen_the_default() {
    let host = FakeHost::new(WIN11_23H2);
    let ctx = context(&host);
    ctx.initialize().unwrap();

    host.fail_next(LogicalOp::GetCount, NativeErrorCode::FAIL);
    let out = ctx
        .invoke_with(&[NativeErrorCode::FAIL], |binding| binding.desktop_count())
        .unwrap();
    assert_eq!(out, None);

    host.fail_next(LogicalOp::GetCount, NativeErrorCode::FAIL);
    assert!(ctx.desktop_count().is_err());
}

#[test]
fn auto_restart_can_be_disabled() {
    let host = FakeHost::new(WIN11_23H2);
    let config = DesktopConfig {
        auto_restart: false,
        ..DesktopConfig::default()
    };
    let ctx = VirtualDesktops::with_host(Arc::new(host.clone()), config);
    let before = ctx.current_desktop().unwrap();
    assert_eq!(host.restart_listeners(), 0);

    host.restart_shell();
    // Nobody told the context; the stale binding reports the disconnect.
    let err = ctx.current_desktop().unwrap_err();
    assert_eq!(err.native_code(), Some(NativeErrorCode::DISCONNECTED));

    ctx.notify_shell_restarted();
    let after = ctx.current_desktop().unwrap();
    assert_eq!(after.id(), before.id());
}
