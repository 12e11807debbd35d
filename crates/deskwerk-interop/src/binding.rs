// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binding builder: one generic binding that speaks every catalog layout.
//
// Callers use logical operations with variant-independent arguments. The
// binding looks the operation up in the active layout, fails fast with
// `UnsupportedOperation` when the layout lacks it, splices in the parameters
// the layout wants but callers never supply (the monitor handle), and hands
// the shaped call to the backend session.

use std::sync::Arc;

use deskwerk_core::error::{DeskwerkError, Result};
use deskwerk_core::types::{AdjacentDirection, DesktopId, WindowHandle};
use tracing::{debug, info, instrument};

use crate::catalog::{InterfaceVariant, LogicalOp, Param};
use crate::traits::{NativeArg, NativeEventSink, NativeHost, NativeObject, NativeSession, NativeValue};

/// A native desktop object together with its identity token.
#[derive(Debug, Clone)]
pub struct DesktopHandle {
    id: DesktopId,
    object: NativeObject,
}

impl DesktopHandle {
    pub fn new(id: DesktopId, object: NativeObject) -> Self {
        Self { id, object }
    }

    pub fn id(&self) -> DesktopId {
        self.id
    }

    pub fn object(&self) -> &NativeObject {
        &self.object
    }
}

/// Live, variant-specific connection to the shell's desktop manager.
///
/// Never mutated after construction; restart recovery replaces it whole.
pub struct Binding {
    variant: &'static InterfaceVariant,
    session: Box<dyn NativeSession>,
    generation: u64,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("variant", &self.variant.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Instantiate the shell objects for `variant` and wrap them in a binding.
#[instrument(skip(host, variant), fields(variant = variant.name()))]
pub fn build_binding(
    host: &dyn NativeHost,
    variant: &'static InterfaceVariant,
    generation: u64,
) -> Result<Binding> {
    let session = host.connect(variant).map_err(|e| match e {
        DeskwerkError::Binding(_) | DeskwerkError::Unsupported { .. } => e,
        other => DeskwerkError::Binding(other.to_string()),
    })?;

    info!(
        variant = variant.name(),
        generation,
        platform = host.platform_name(),
        "desktop manager binding established"
    );

    Ok(Binding {
        variant,
        session,
        generation,
    })
}

impl Binding {
    pub fn variant(&self) -> &'static InterfaceVariant {
        self.variant
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn supports(&self, op: LogicalOp) -> bool {
        self.variant.supports(op)
    }

    /// Shape and perform one native call.
    fn call(
        &self,
        op: LogicalOp,
        target: Option<&NativeObject>,
        supplied: Vec<NativeArg<'_>>,
    ) -> Result<NativeValue> {
        let method = self.variant.require(op)?;

        let wanted = method.params.iter().filter(|p| **p != Param::Monitor).count();
        if wanted != supplied.len() {
            return Err(DeskwerkError::Binding(format!(
                "{} expects {wanted} argument(s) in the {} layout, got {}",
                method.name,
                self.variant.name(),
                supplied.len()
            )));
        }

        let mut supplied = supplied.into_iter();
        let mut args = Vec::with_capacity(method.params.len());
        for param in method.params {
            match param {
                Param::Monitor => args.push(NativeArg::Monitor),
                _ => args.extend(supplied.next()),
            }
        }

        debug!(op = op.name(), method = method.name, slot = method.ordinal, "native call");
        self.session
            .invoke(method, target, &args)
            .map_err(|code| DeskwerkError::NativeCall {
                op: op.name(),
                code,
            })
    }

    fn expect_object(op: LogicalOp, value: NativeValue) -> Result<NativeObject> {
        match value {
            NativeValue::Object(o) => Ok(o),
            other => Err(Self::shape_error(op, &other)),
        }
    }

    fn shape_error(op: LogicalOp, value: &NativeValue) -> DeskwerkError {
        DeskwerkError::Binding(format!("{} returned unexpected {value:?}", op.name()))
    }

    // -- Desktop object -----------------------------------------------------

    /// Read the identity of a raw desktop object and pair them up.
    pub fn handle(&self, object: NativeObject) -> Result<DesktopHandle> {
        match self.call(LogicalOp::GetId, Some(&object), vec![])? {
            NativeValue::Guid(id) => Ok(DesktopHandle::new(DesktopId(id), object)),
            other => Err(Self::shape_error(LogicalOp::GetId, &other)),
        }
    }

    fn handles(&self, objects: Vec<NativeObject>) -> Result<Vec<DesktopHandle>> {
        objects.into_iter().map(|o| self.handle(o)).collect()
    }

    pub fn desktop_name(&self, desktop: &DesktopHandle) -> Result<String> {
        self.text(LogicalOp::GetName, desktop)
    }

    pub fn desktop_wallpaper(&self, desktop: &DesktopHandle) -> Result<String> {
        self.text(LogicalOp::GetWallpaperPath, desktop)
    }

    fn text(&self, op: LogicalOp, desktop: &DesktopHandle) -> Result<String> {
        match self.call(op, Some(desktop.object()), vec![])? {
            NativeValue::Text(t) => Ok(t),
            other => Err(Self::shape_error(op, &other)),
        }
    }

    // -- Manager ------------------------------------------------------------

    pub fn desktop_count(&self) -> Result<u32> {
        match self.call(LogicalOp::GetCount, None, vec![])? {
            NativeValue::Count(n) => Ok(n),
            other => Err(Self::shape_error(LogicalOp::GetCount, &other)),
        }
    }

    pub fn current_desktop(&self) -> Result<DesktopHandle> {
        let value = self.call(LogicalOp::GetCurrentDesktop, None, vec![])?;
        self.handle(Self::expect_object(LogicalOp::GetCurrentDesktop, value)?)
    }

    pub fn desktops(&self) -> Result<Vec<DesktopHandle>> {
        self.list(LogicalOp::GetDesktops)
    }

    /// Current desktop of every monitor.
    pub fn all_current_desktops(&self) -> Result<Vec<DesktopHandle>> {
        self.list(LogicalOp::GetAllCurrentDesktops)
    }

    fn list(&self, op: LogicalOp) -> Result<Vec<DesktopHandle>> {
        match self.call(op, None, vec![])? {
            NativeValue::Objects(objects) => self.handles(objects),
            other => Err(Self::shape_error(op, &other)),
        }
    }

    pub fn adjacent_desktop(
        &self,
        desktop: &DesktopHandle,
        direction: AdjacentDirection,
    ) -> Result<DesktopHandle> {
        let value = self.call(
            LogicalOp::GetAdjacentDesktop,
            None,
            vec![NativeArg::Desktop(desktop.object()), NativeArg::Direction(direction)],
        )?;
        self.handle(Self::expect_object(LogicalOp::GetAdjacentDesktop, value)?)
    }

    pub fn switch_desktop(&self, desktop: &DesktopHandle) -> Result<()> {
        self.call(
            LogicalOp::SwitchDesktop,
            None,
            vec![NativeArg::Desktop(desktop.object())],
        )
        .map(drop)
    }

    pub fn create_desktop(&self) -> Result<DesktopHandle> {
        let value = self.call(LogicalOp::CreateDesktop, None, vec![])?;
        self.handle(Self::expect_object(LogicalOp::CreateDesktop, value)?)
    }

    pub fn move_desktop(&self, desktop: &DesktopHandle, index: i32) -> Result<()> {
        self.call(
            LogicalOp::MoveDesktop,
            None,
            vec![NativeArg::Desktop(desktop.object()), NativeArg::Index(index)],
        )
        .map(drop)
    }

    pub fn remove_desktop(&self, desktop: &DesktopHandle, fallback: &DesktopHandle) -> Result<()> {
        self.call(
            LogicalOp::RemoveDesktop,
            None,
            vec![
                NativeArg::Desktop(desktop.object()),
                NativeArg::Desktop(fallback.object()),
            ],
        )
        .map(drop)
    }

    pub fn find_desktop(&self, id: DesktopId) -> Result<DesktopHandle> {
        let value = self.call(LogicalOp::FindDesktop, None, vec![NativeArg::Guid(id.0)])?;
        let object = Self::expect_object(LogicalOp::FindDesktop, value)?;
        Ok(DesktopHandle::new(id, object))
    }

    pub fn set_desktop_name(&self, desktop: &DesktopHandle, name: &str) -> Result<()> {
        self.call(
            LogicalOp::SetDesktopName,
            None,
            vec![NativeArg::Desktop(desktop.object()), NativeArg::Text(name)],
        )
        .map(drop)
    }

    pub fn set_desktop_wallpaper(&self, desktop: &DesktopHandle, path: &str) -> Result<()> {
        self.call(
            LogicalOp::SetDesktopWallpaper,
            None,
            vec![NativeArg::Desktop(desktop.object()), NativeArg::Text(path)],
        )
        .map(drop)
    }

    pub fn update_wallpaper_for_all(&self, path: &str) -> Result<()> {
        self.call(
            LogicalOp::UpdateWallpaperForAllDesktops,
            None,
            vec![NativeArg::Text(path)],
        )
        .map(drop)
    }

    pub fn move_view(&self, window: WindowHandle, desktop: &DesktopHandle) -> Result<()> {
        self.call(
            LogicalOp::MoveViewToDesktop,
            None,
            vec![NativeArg::View(window), NativeArg::Desktop(desktop.object())],
        )
        .map(drop)
    }

    pub fn can_move_view(&self, window: WindowHandle) -> Result<bool> {
        match self.call(LogicalOp::CanViewMoveDesktops, None, vec![NativeArg::View(window)])? {
            NativeValue::Bool(b) => Ok(b),
            other => Err(Self::shape_error(LogicalOp::CanViewMoveDesktops, &other)),
        }
    }

    // -- Notification service -----------------------------------------------

    /// Register a sink and return the host's registration cookie.
    pub fn register(&self, sink: Arc<dyn NativeEventSink>) -> Result<u32> {
        match self.call(LogicalOp::RegisterNotifications, None, vec![NativeArg::Sink(sink)])? {
            NativeValue::Cookie(cookie) => Ok(cookie),
            other => Err(Self::shape_error(LogicalOp::RegisterNotifications, &other)),
        }
    }

    pub fn unregister(&self, cookie: u32) -> Result<()> {
        self.call(
            LogicalOp::UnregisterNotifications,
            None,
            vec![NativeArg::Cookie(cookie)],
        )
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BUILD_10240, BUILD_20348, BUILD_22621};
    use crate::fake::FakeHost;
    use deskwerk_core::types::BuildVersion;

    fn bind(host: &FakeHost, variant: &'static InterfaceVariant) -> Binding {
        build_binding(host, variant, 1).expect("binding")
    }

    #[test]
    fn absent_operation_fails_without_native_call() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 10240, 0));
        let binding = bind(&host, &BUILD_10240);
        let before = host.native_calls();

        let err = binding.all_current_desktops().unwrap_err();
        assert!(matches!(err, DeskwerkError::UnsupportedOperation { .. }));
        assert_eq!(host.native_calls(), before);
    }

    #[test]
    fn monitor_argument_is_spliced_for_layouts_that_take_it() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 20348, 0));
        let binding = bind(&host, &BUILD_20348);

        let created = binding.create_desktop().unwrap();
        binding.switch_desktop(&created).unwrap();
        binding.move_desktop(&created, 0).unwrap();
        assert_eq!(binding.current_desktop().unwrap().id(), created.id());
        assert_eq!(binding.desktops().unwrap()[0].id(), created.id());
    }

    #[test]
    fn names_round_trip_on_modern_layout() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        let binding = bind(&host, &BUILD_22621);

        let current = binding.current_desktop().unwrap();
        binding.set_desktop_name(&current, "Work").unwrap();
        assert_eq!(binding.desktop_name(&current).unwrap(), "Work");
    }

    #[test]
    fn native_failures_carry_operation_and_code() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        let binding = bind(&host, &BUILD_22621);

        let err = binding.find_desktop(DesktopId::new()).unwrap_err();
        match err {
            DeskwerkError::NativeCall { op, code } => {
                assert_eq!(op, "find_desktop");
                assert!(code.is_element_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn refused_connection_is_a_binding_error() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        host.refuse_connections(true);
        assert!(matches!(
            build_binding(&host, &BUILD_22621, 1),
            Err(DeskwerkError::Binding(_))
        ));
    }
}
