// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interface catalog: the known layouts of the shell's undocumented virtual
// desktop interfaces, keyed by the first host build that ships each one.
//
// The shell reorders, inserts and removes methods between builds, and changes
// their signatures (the monitor parameter came and went). Every layout is
// described here as plain data: method ordinals (vtable slots, counting the
// three IUnknown slots) and the semantic type of each parameter. Nothing else
// in the workspace knows a slot number.

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::BuildVersion;
use tracing::debug;
use uuid::Uuid;

/// Named interface layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantId {
    Build10240,
    Build20348,
    Build22000,
    Build22621,
}

impl VariantId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Build10240 => "10240",
            Self::Build20348 => "20348",
            Self::Build22000 => "22000",
            Self::Build22621 => "22621",
        }
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "build {}", self.name())
    }
}

/// Which native object a method lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    /// `IVirtualDesktopManagerInternal`
    Manager,
    /// `IVirtualDesktop`
    Desktop,
    /// `IVirtualDesktopNotificationService`
    NotificationService,
}

/// Variant-independent operation names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    GetCount,
    MoveViewToDesktop,
    CanViewMoveDesktops,
    GetCurrentDesktop,
    GetAllCurrentDesktops,
    GetDesktops,
    GetAdjacentDesktop,
    SwitchDesktop,
    CreateDesktop,
    MoveDesktop,
    RemoveDesktop,
    FindDesktop,
    SetDesktopName,
    SetDesktopWallpaper,
    UpdateWallpaperForAllDesktops,
    GetId,
    GetName,
    GetWallpaperPath,
    RegisterNotifications,
    UnregisterNotifications,
}

impl LogicalOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCount => "get_count",
            Self::MoveViewToDesktop => "move_view_to_desktop",
            Self::CanViewMoveDesktops => "can_view_move_desktops",
            Self::GetCurrentDesktop => "get_current_desktop",
            Self::GetAllCurrentDesktops => "get_all_current_desktops",
            Self::GetDesktops => "get_desktops",
            Self::GetAdjacentDesktop => "get_adjacent_desktop",
            Self::SwitchDesktop => "switch_desktop",
            Self::CreateDesktop => "create_desktop",
            Self::MoveDesktop => "move_desktop",
            Self::RemoveDesktop => "remove_desktop",
            Self::FindDesktop => "find_desktop",
            Self::SetDesktopName => "set_desktop_name",
            Self::SetDesktopWallpaper => "set_desktop_wallpaper",
            Self::UpdateWallpaperForAllDesktops => "update_wallpaper_for_all_desktops",
            Self::GetId => "get_id",
            Self::GetName => "get_name",
            Self::GetWallpaperPath => "get_wallpaper_path",
            Self::RegisterNotifications => "register_notifications",
            Self::UnregisterNotifications => "unregister_notifications",
        }
    }

    pub fn interface(&self) -> Interface {
        match self {
            Self::GetId | Self::GetName | Self::GetWallpaperPath => Interface::Desktop,
            Self::RegisterNotifications | Self::UnregisterNotifications => {
                Interface::NotificationService
            }
            _ => Interface::Manager,
        }
    }
}

/// Semantic type of a native parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// `HMONITOR`; always passed as null (the primary monitor / all monitors).
    Monitor,
    /// `IObjectArray*` of monitors, only seen in notifications.
    MonitorArray,
    /// `IVirtualDesktop*`
    Desktop,
    /// `IApplicationView*`
    View,
    /// `REFGUID`
    Guid,
    /// `HSTRING`
    Text,
    /// `int`
    Index,
    /// `AdjacentDesktop` enum
    Direction,
    /// `IVirtualDesktopNotification*`
    Sink,
    /// `DWORD` registration cookie
    Cookie,
}

/// Semantic type of the trailing out-parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    Unit,
    Count,
    Bool,
    Desktop,
    DesktopArray,
    Guid,
    Text,
    Cookie,
}

/// One method of one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub op: LogicalOp,
    /// Native method name, for logs.
    pub name: &'static str,
    /// Vtable slot, counting the IUnknown methods.
    pub ordinal: u16,
    pub params: &'static [Param],
    pub returns: Returns,
}

impl MethodDescriptor {
    pub fn takes_monitor(&self) -> bool {
        self.params.contains(&Param::Monitor)
    }
}

/// Callbacks the shell makes on a registered notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Created,
    DestroyBegin,
    DestroyFailed,
    Destroyed,
    PerMonitorChanged,
    Moved,
    Renamed,
    ViewChanged,
    CurrentChanged,
    WallpaperChanged,
    RemoteConnected,
}

/// One slot of the notification sink vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSlot {
    pub kind: NotificationKind,
    pub ordinal: u16,
    pub params: &'static [Param],
}

/// Interface identifiers of one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceIds {
    pub manager: Uuid,
    pub desktop: Uuid,
    pub notification: Uuid,
    pub notification_service: Uuid,
    pub view_collection: Uuid,
}

/// A complete description of one binary interface layout.
#[derive(Debug)]
pub struct InterfaceVariant {
    pub id: VariantId,
    /// First host build that exposes this layout.
    pub minimum: BuildVersion,
    pub iids: InterfaceIds,
    pub manager: &'static [MethodDescriptor],
    pub desktop: &'static [MethodDescriptor],
    pub notification_service: &'static [MethodDescriptor],
    pub notifications: &'static [NotificationSlot],
}

impl InterfaceVariant {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Descriptor for `op`, if this layout has it.
    pub fn method(&self, op: LogicalOp) -> Option<&'static MethodDescriptor> {
        let table = match op.interface() {
            Interface::Manager => self.manager,
            Interface::Desktop => self.desktop,
            Interface::NotificationService => self.notification_service,
        };
        table.iter().find(|m| m.op == op)
    }

    pub fn supports(&self, op: LogicalOp) -> bool {
        self.method(op).is_some()
    }

    /// Descriptor for `op`, or `UnsupportedOperation`.
    pub fn require(&self, op: LogicalOp) -> Result<&'static MethodDescriptor> {
        self.method(op).ok_or(DeskwerkError::UnsupportedOperation {
            op: op.name(),
            variant: self.name(),
        })
    }

    /// Highest vtable slot of the notification sink.
    pub fn notification_slot_count(&self) -> u16 {
        self.notifications
            .iter()
            .map(|s| s.ordinal + 1)
            .max()
            .unwrap_or(3)
    }
}

// ---------------------------------------------------------------------------
// Layout tables
// ---------------------------------------------------------------------------

const fn m(
    op: LogicalOp,
    name: &'static str,
    ordinal: u16,
    params: &'static [Param],
    returns: Returns,
) -> MethodDescriptor {
    MethodDescriptor {
        op,
        name,
        ordinal,
        params,
        returns,
    }
}

const fn n(kind: NotificationKind, ordinal: u16, params: &'static [Param]) -> NotificationSlot {
    NotificationSlot {
        kind,
        ordinal,
        params,
    }
}

use LogicalOp as Op;
use NotificationKind as Nk;
use Param as P;
use Returns as R;

const NOTIFICATION_SERVICE: &[MethodDescriptor] = &[
    m(Op::RegisterNotifications, "Register", 3, &[P::Sink], R::Cookie),
    m(Op::UnregisterNotifications, "Unregister", 4, &[P::Cookie], R::Unit),
];

const NOTIFICATION_SERVICE_IID: Uuid = Uuid::from_u128(0x0CD45E71_D927_4F15_8B0A_8FEF525337BF);
const VIEW_COLLECTION_IID: Uuid = Uuid::from_u128(0x1841C6D7_4F9D_42C0_AF41_8747538F10E5);

// -- 22621.2215 and later: monitor parameters removed ------------------------

pub static BUILD_22621: InterfaceVariant = InterfaceVariant {
    id: VariantId::Build22621,
    minimum: BuildVersion::new(10, 0, 22621, 2215),
    iids: InterfaceIds {
        manager: Uuid::from_u128(0xA3175F2D_239C_4BD2_8AA0_EEBA8B0B138E),
        desktop: Uuid::from_u128(0x3F07F4BE_B107_441A_AF0F_39D82529072C),
        notification: Uuid::from_u128(0xB287FA1C_7771_471A_A2DF_9B6B21F0D675),
        notification_service: NOTIFICATION_SERVICE_IID,
        view_collection: VIEW_COLLECTION_IID,
    },
    manager: &[
        m(Op::GetCount, "GetCount", 3, &[], R::Count),
        m(Op::MoveViewToDesktop, "MoveViewToDesktop", 4, &[P::View, P::Desktop], R::Unit),
        m(Op::CanViewMoveDesktops, "CanViewMoveDesktops", 5, &[P::View], R::Bool),
        m(Op::GetCurrentDesktop, "GetCurrentDesktop", 6, &[], R::Desktop),
        m(Op::GetDesktops, "GetDesktops", 7, &[], R::DesktopArray),
        m(Op::GetAdjacentDesktop, "GetAdjacentDesktop", 8, &[P::Desktop, P::Direction], R::Desktop),
        m(Op::SwitchDesktop, "SwitchDesktop", 9, &[P::Desktop], R::Unit),
        m(Op::CreateDesktop, "CreateDesktop", 10, &[], R::Desktop),
        m(Op::MoveDesktop, "MoveDesktop", 11, &[P::Desktop, P::Index], R::Unit),
        m(Op::RemoveDesktop, "RemoveDesktop", 12, &[P::Desktop, P::Desktop], R::Unit),
        m(Op::FindDesktop, "FindDesktop", 13, &[P::Guid], R::Desktop),
        m(Op::SetDesktopName, "SetDesktopName", 15, &[P::Desktop, P::Text], R::Unit),
        m(Op::SetDesktopWallpaper, "SetDesktopWallpaper", 16, &[P::Desktop, P::Text], R::Unit),
        m(Op::UpdateWallpaperForAllDesktops, "UpdateWallpaperPathForAllDesktops", 17, &[P::Text], R::Unit),
    ],
    desktop: &[
        m(Op::GetId, "GetID", 4, &[], R::Guid),
        m(Op::GetName, "GetName", 5, &[], R::Text),
        m(Op::GetWallpaperPath, "GetWallpaperPath", 6, &[], R::Text),
    ],
    notification_service: NOTIFICATION_SERVICE,
    notifications: &[
        n(Nk::Created, 3, &[P::Desktop]),
        n(Nk::DestroyBegin, 4, &[P::Desktop, P::Desktop]),
        n(Nk::DestroyFailed, 5, &[P::Desktop, P::Desktop]),
        n(Nk::Destroyed, 6, &[P::Desktop, P::Desktop]),
        n(Nk::PerMonitorChanged, 7, &[P::Index]),
        n(Nk::Moved, 8, &[P::Desktop, P::Index, P::Index]),
        n(Nk::Renamed, 9, &[P::Desktop, P::Text]),
        n(Nk::ViewChanged, 10, &[P::View]),
        n(Nk::CurrentChanged, 11, &[P::Desktop, P::Desktop]),
        n(Nk::WallpaperChanged, 12, &[P::Desktop, P::Text]),
        n(Nk::RemoteConnected, 13, &[P::Desktop]),
    ],
};

// -- 22000: Windows 11 GA, per-monitor desktops and the bulk query -----------

pub static BUILD_22000: InterfaceVariant = InterfaceVariant {
    id: VariantId::Build22000,
    minimum: BuildVersion::new(10, 0, 22000, 0),
    iids: InterfaceIds {
        manager: Uuid::from_u128(0xB2F925B9_5A0F_4D2E_9F4D_2B1507593C10),
        desktop: Uuid::from_u128(0x536D3495_B208_4CC9_AE26_DE8111275BF8),
        notification: Uuid::from_u128(0xCD403E52_DEED_4C13_B437_B98380F2B1E8),
        notification_service: NOTIFICATION_SERVICE_IID,
        view_collection: VIEW_COLLECTION_IID,
    },
    manager: &[
        m(Op::GetCount, "GetCount", 3, &[P::Monitor], R::Count),
        m(Op::MoveViewToDesktop, "MoveViewToDesktop", 4, &[P::View, P::Desktop], R::Unit),
        m(Op::CanViewMoveDesktops, "CanViewMoveDesktops", 5, &[P::View], R::Bool),
        m(Op::GetCurrentDesktop, "GetCurrentDesktop", 6, &[P::Monitor], R::Desktop),
        m(Op::GetAllCurrentDesktops, "GetAllCurrentDesktops", 7, &[], R::DesktopArray),
        m(Op::GetDesktops, "GetDesktops", 8, &[P::Monitor], R::DesktopArray),
        m(Op::GetAdjacentDesktop, "GetAdjacentDesktop", 9, &[P::Desktop, P::Direction], R::Desktop),
        m(Op::SwitchDesktop, "SwitchDesktop", 10, &[P::Monitor, P::Desktop], R::Unit),
        m(Op::CreateDesktop, "CreateDesktopW", 11, &[P::Monitor], R::Desktop),
        m(Op::MoveDesktop, "MoveDesktop", 12, &[P::Desktop, P::Monitor, P::Index], R::Unit),
        m(Op::RemoveDesktop, "RemoveDesktop", 13, &[P::Desktop, P::Desktop], R::Unit),
        m(Op::FindDesktop, "FindDesktop", 14, &[P::Guid], R::Desktop),
        m(Op::SetDesktopName, "SetDesktopName", 16, &[P::Desktop, P::Text], R::Unit),
        m(Op::SetDesktopWallpaper, "SetDesktopWallpaper", 17, &[P::Desktop, P::Text], R::Unit),
        m(Op::UpdateWallpaperForAllDesktops, "UpdateWallpaperPathForAllDesktops", 18, &[P::Text], R::Unit),
    ],
    desktop: DESKTOP_WITH_MONITOR,
    notification_service: NOTIFICATION_SERVICE,
    notifications: NOTIFICATIONS_WITH_MONITORS,
};

// -- 20348 era (also the 19041 line): monitor parameters, names, wallpapers --

pub static BUILD_20348: InterfaceVariant = InterfaceVariant {
    id: VariantId::Build20348,
    minimum: BuildVersion::new(10, 0, 19041, 0),
    iids: InterfaceIds {
        manager: Uuid::from_u128(0x094AFE11_44F2_4BA0_976F_29A97E263EE0),
        desktop: Uuid::from_u128(0x62FDF88B_11CA_4AFB_8BD8_2296DFAE49E2),
        notification: Uuid::from_u128(0xF3163E11_6B04_433C_A64B_6F82C9094257),
        notification_service: NOTIFICATION_SERVICE_IID,
        view_collection: VIEW_COLLECTION_IID,
    },
    manager: &[
        m(Op::GetCount, "GetCount", 3, &[P::Monitor], R::Count),
        m(Op::MoveViewToDesktop, "MoveViewToDesktop", 4, &[P::View, P::Desktop], R::Unit),
        m(Op::CanViewMoveDesktops, "CanViewMoveDesktops", 5, &[P::View], R::Bool),
        m(Op::GetCurrentDesktop, "GetCurrentDesktop", 6, &[P::Monitor], R::Desktop),
        m(Op::GetDesktops, "GetDesktops", 7, &[P::Monitor], R::DesktopArray),
        m(Op::GetAdjacentDesktop, "GetAdjacentDesktop", 8, &[P::Desktop, P::Direction], R::Desktop),
        m(Op::SwitchDesktop, "SwitchDesktop", 9, &[P::Monitor, P::Desktop], R::Unit),
        m(Op::CreateDesktop, "CreateDesktopW", 10, &[P::Monitor], R::Desktop),
        m(Op::MoveDesktop, "MoveDesktop", 11, &[P::Desktop, P::Monitor, P::Index], R::Unit),
        m(Op::RemoveDesktop, "RemoveDesktop", 12, &[P::Desktop, P::Desktop], R::Unit),
        m(Op::FindDesktop, "FindDesktop", 13, &[P::Guid], R::Desktop),
        m(Op::SetDesktopName, "SetDesktopName", 15, &[P::Desktop, P::Text], R::Unit),
        m(Op::SetDesktopWallpaper, "SetDesktopWallpaper", 16, &[P::Desktop, P::Text], R::Unit),
        m(Op::UpdateWallpaperForAllDesktops, "UpdateWallpaperPathForAllDesktops", 17, &[P::Text], R::Unit),
    ],
    desktop: DESKTOP_WITH_MONITOR,
    notification_service: NOTIFICATION_SERVICE,
    notifications: NOTIFICATIONS_WITH_MONITORS,
};

const DESKTOP_WITH_MONITOR: &[MethodDescriptor] = &[
    m(Op::GetId, "GetID", 4, &[], R::Guid),
    m(Op::GetName, "GetName", 6, &[], R::Text),
    m(Op::GetWallpaperPath, "GetWallpaperPath", 7, &[], R::Text),
];

const NOTIFICATIONS_WITH_MONITORS: &[NotificationSlot] = &[
    n(Nk::Created, 3, &[P::MonitorArray, P::Desktop]),
    n(Nk::DestroyBegin, 4, &[P::MonitorArray, P::Desktop, P::Desktop]),
    n(Nk::DestroyFailed, 5, &[P::MonitorArray, P::Desktop, P::Desktop]),
    n(Nk::Destroyed, 6, &[P::MonitorArray, P::Desktop, P::Desktop]),
    n(Nk::PerMonitorChanged, 7, &[P::Index]),
    n(Nk::Moved, 8, &[P::MonitorArray, P::Desktop, P::Index, P::Index]),
    n(Nk::Renamed, 9, &[P::Desktop, P::Text]),
    n(Nk::ViewChanged, 10, &[P::View]),
    n(Nk::CurrentChanged, 11, &[P::MonitorArray, P::Desktop, P::Desktop]),
    n(Nk::WallpaperChanged, 12, &[P::Desktop, P::Text]),
];

// -- 10240: the original Windows 10 layout ------------------------------------
// No names, wallpapers, reordering or per-monitor queries yet.

pub static BUILD_10240: InterfaceVariant = InterfaceVariant {
    id: VariantId::Build10240,
    minimum: BuildVersion::new(10, 0, 10240, 0),
    iids: InterfaceIds {
        manager: Uuid::from_u128(0xF31574D6_B682_4CDC_BD56_1827860ABEC6),
        desktop: Uuid::from_u128(0xFF72FFDD_BE7E_43FC_9C03_AD81681E88E4),
        notification: Uuid::from_u128(0xC179334C_4295_40D3_BEA1_C654D965605A),
        notification_service: NOTIFICATION_SERVICE_IID,
        view_collection: Uuid::from_u128(0x2C08ADF0_A386_4B35_9250_0FE183476FCC),
    },
    manager: &[
        m(Op::GetCount, "GetCount", 3, &[], R::Count),
        m(Op::MoveViewToDesktop, "MoveViewToDesktop", 4, &[P::View, P::Desktop], R::Unit),
        m(Op::CanViewMoveDesktops, "CanViewMoveDesktops", 5, &[P::View], R::Bool),
        m(Op::GetCurrentDesktop, "GetCurrentDesktop", 6, &[], R::Desktop),
        m(Op::GetDesktops, "GetDesktops", 7, &[], R::DesktopArray),
        m(Op::GetAdjacentDesktop, "GetAdjacentDesktop", 8, &[P::Desktop, P::Direction], R::Desktop),
        m(Op::SwitchDesktop, "SwitchDesktop", 9, &[P::Desktop], R::Unit),
        m(Op::CreateDesktop, "CreateDesktopW", 10, &[], R::Desktop),
        m(Op::RemoveDesktop, "RemoveDesktop", 11, &[P::Desktop, P::Desktop], R::Unit),
        m(Op::FindDesktop, "FindDesktop", 12, &[P::Guid], R::Desktop),
    ],
    desktop: &[m(Op::GetId, "GetID", 4, &[], R::Guid)],
    notification_service: NOTIFICATION_SERVICE,
    notifications: &[
        n(Nk::Created, 3, &[P::Desktop]),
        n(Nk::DestroyBegin, 4, &[P::Desktop, P::Desktop]),
        n(Nk::DestroyFailed, 5, &[P::Desktop, P::Desktop]),
        n(Nk::Destroyed, 6, &[P::Desktop, P::Desktop]),
        n(Nk::ViewChanged, 7, &[P::View]),
        n(Nk::CurrentChanged, 8, &[P::Desktop, P::Desktop]),
    ],
};

/// Every known layout, newest first. Order matters: later builds must match
/// the most specific layout before an older, broader range catches them.
pub static CATALOG: [&InterfaceVariant; 4] = [&BUILD_22621, &BUILD_22000, &BUILD_20348, &BUILD_10240];

/// Pick the layout for a host build from the built-in catalog.
pub fn resolve_variant(version: BuildVersion) -> Result<&'static InterfaceVariant> {
    resolve_in(&CATALOG, version).ok_or(DeskwerkError::Unsupported {
        build: Some(version),
    })
}

/// First entry of a newest-first table whose minimum is at or below `version`.
pub fn resolve_in(
    table: &[&'static InterfaceVariant],
    version: BuildVersion,
) -> Option<&'static InterfaceVariant> {
    let found = table.iter().copied().find(|v| v.minimum <= version);
    debug!(
        build = %version,
        variant = found.map(|v| v.name()).unwrap_or("none"),
        "resolved interface layout"
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(major: u32, minor: u32, build: u32, revision: u32) -> Option<VariantId> {
        resolve_variant(BuildVersion::new(major, minor, build, revision))
            .ok()
            .map(|v| v.id)
    }

    #[test]
    fn catalog_is_sorted_newest_first() {
        for pair in CATALOG.windows(2) {
            assert!(pair[0].minimum > pair[1].minimum);
        }
    }

    #[test]
    fn known_builds_pick_expected_layouts() {
        assert_eq!(resolve(10, 0, 22621, 2215), Some(VariantId::Build22621));
        assert_eq!(resolve(10, 0, 22631, 3007), Some(VariantId::Build22621));
        assert_eq!(resolve(10, 0, 22621, 2214), Some(VariantId::Build22000));
        assert_eq!(resolve(10, 0, 22000, 0), Some(VariantId::Build22000));
        assert_eq!(resolve(10, 0, 20348, 0), Some(VariantId::Build20348));
        assert_eq!(resolve(10, 0, 19041, 0), Some(VariantId::Build20348));
        assert_eq!(resolve(10, 0, 19040, 9999), Some(VariantId::Build10240));
        assert_eq!(resolve(10, 0, 10240, 0), Some(VariantId::Build10240));
    }

    #[test]
    fn builds_below_the_oldest_layout_are_unsupported() {
        assert_eq!(resolve(10, 0, 10000, 0), None);
        assert_eq!(resolve(6, 3, 9600, 0), None);
        assert!(matches!(
            resolve_variant(BuildVersion::new(10, 0, 10000, 0)),
            Err(DeskwerkError::Unsupported { build: Some(_) })
        ));
    }

    #[test]
    fn resolution_picks_highest_minimum_not_above_version() {
        let versions = [
            BuildVersion::new(10, 0, 10239, 0),
            BuildVersion::new(10, 0, 15063, 0),
            BuildVersion::new(10, 0, 19045, 4046),
            BuildVersion::new(10, 0, 21996, 1),
            BuildVersion::new(10, 0, 22621, 0),
            BuildVersion::new(10, 0, 26100, 1),
        ];
        for version in versions {
            let expected = CATALOG
                .iter()
                .filter(|v| v.minimum <= version)
                .max_by_key(|v| v.minimum)
                .map(|v| v.id);
            assert_eq!(resolve_variant(version).ok().map(|v| v.id), expected, "{version}");
        }
    }

    #[test]
    fn bulk_query_is_absent_from_oldest_layout() {
        assert!(!BUILD_10240.supports(LogicalOp::GetAllCurrentDesktops));
        assert!(matches!(
            BUILD_10240.require(LogicalOp::GetAllCurrentDesktops),
            Err(DeskwerkError::UnsupportedOperation { op: "get_all_current_desktops", variant: "10240" })
        ));
        assert!(BUILD_22000.supports(LogicalOp::GetAllCurrentDesktops));
    }

    #[test]
    fn monitor_parameter_tracks_layout() {
        let current = |v: &InterfaceVariant| v.require(LogicalOp::GetCurrentDesktop).unwrap().takes_monitor();
        assert!(!current(&BUILD_10240));
        assert!(current(&BUILD_20348));
        assert!(current(&BUILD_22000));
        assert!(!current(&BUILD_22621));
    }

    #[test]
    fn ordinals_are_unique_within_each_interface() {
        for variant in CATALOG {
            for table in [variant.manager, variant.desktop, variant.notification_service] {
                let mut slots: Vec<u16> = table.iter().map(|m| m.ordinal).collect();
                slots.sort_unstable();
                slots.dedup();
                assert_eq!(slots.len(), table.len(), "{}", variant.name());
                assert!(slots.iter().all(|s| *s >= 3), "{}", variant.name());
            }
        }
    }
}
