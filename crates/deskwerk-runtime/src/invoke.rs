// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Safe invocation: native calls whose expected failures become `None`.
//
// Desktops come and go under our feet (the user closes one while we hold a
// reference), so "element not found" is an ordinary outcome rather than an
// error. Everything else propagates as `NativeCall { op, code }`.

use deskwerk_core::error::Result;
use deskwerk_core::types::NativeErrorCode;
use tracing::debug;

/// Set of native codes treated as an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenignCodes(Vec<NativeErrorCode>);

impl Default for BenignCodes {
    fn default() -> Self {
        Self(vec![NativeErrorCode::ELEMENT_NOT_FOUND])
    }
}

impl BenignCodes {
    /// No code is benign; every failure propagates.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// This set plus `extra`.
    pub fn widen(&self, extra: &[NativeErrorCode]) -> Self {
        let mut codes = self.0.clone();
        for code in extra {
            if !codes.contains(code) {
                codes.push(*code);
            }
        }
        Self(codes)
    }

    pub fn contains(&self, code: NativeErrorCode) -> bool {
        self.0.contains(&code)
    }

    pub fn codes(&self) -> &[NativeErrorCode] {
        &self.0
    }
}

/// Run `call`, turning benign native failures into `Ok(None)`.
pub fn invoke<T>(benign: &BenignCodes, call: impl FnOnce() -> Result<T>) -> Result<Option<T>> {
    match call() {
        Ok(value) => Ok(Some(value)),
        Err(err) => match err.native_code() {
            Some(code) if benign.contains(code) => {
                debug!(%code, error = %err, "benign native failure");
                Ok(None)
            }
            _ => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskwerk_core::error::DeskwerkError;

    fn failing(code: NativeErrorCode) -> Result<u32> {
        Err(DeskwerkError::NativeCall { op: "find_desktop", code })
    }

    #[test]
    fn element_not_found_is_benign_by_default() {
        let out = invoke(&BenignCodes::default(), || failing(NativeErrorCode::ELEMENT_NOT_FOUND));
        assert!(matches!(out, Ok(None)));
    }

    #[test]
    fn other_codes_propagate_with_operation() {
        let err = invoke(&BenignCodes::default(), || failing(NativeErrorCode::FAIL)).unwrap_err();
        match err {
            DeskwerkError::NativeCall { op, code } => {
                assert_eq!(op, "find_desktop");
                assert_eq!(code, NativeErrorCode::FAIL);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn widened_set_swallows_extra_codes() {
        let benign = BenignCodes::default().widen(&[NativeErrorCode::DISCONNECTED]);
        assert!(matches!(
            invoke(&benign, || failing(NativeErrorCode::DISCONNECTED)),
            Ok(None)
        ));
        assert_eq!(benign.codes().len(), 2);
    }

    #[test]
    fn empty_set_propagates_not_found() {
        assert!(invoke(&BenignCodes::none(), || failing(NativeErrorCode::ELEMENT_NOT_FOUND)).is_err());
    }

    #[test]
    fn non_native_errors_are_never_benign() {
        let out: Result<Option<()>> = invoke(&BenignCodes::default(), || {
            Err(DeskwerkError::Binding("gone".into()))
        });
        assert!(matches!(out, Err(DeskwerkError::Binding(_))));
    }

    #[test]
    fn success_is_wrapped() {
        assert_eq!(invoke(&BenignCodes::default(), || Ok(3)).unwrap(), Some(3));
    }
}
