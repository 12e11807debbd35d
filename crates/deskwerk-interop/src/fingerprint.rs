// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host build fingerprint.

use std::sync::OnceLock;

use deskwerk_core::types::BuildVersion;
use tracing::{debug, warn};

use crate::traits::NativeHost;

/// Combine the host's OS version and update revision into one value.
///
/// An unreadable revision degrades to 0: the build number alone selects the
/// right layout for every range except the one that starts mid-build.
pub fn fingerprint(host: &dyn NativeHost) -> Option<BuildVersion> {
    let base = host.os_version()?;
    let revision = host.os_revision().unwrap_or_else(|| {
        warn!(build = %base, "update revision unavailable, assuming 0");
        0
    });

    let version = BuildVersion { revision, ..base };
    debug!(build = %version, platform = host.platform_name(), "host build fingerprinted");
    Some(version)
}

static CURRENT: OnceLock<Option<BuildVersion>> = OnceLock::new();

/// Fingerprint of the running host, computed once per process.
pub fn current_build_version() -> Option<BuildVersion> {
    *CURRENT.get_or_init(|| fingerprint(crate::platform_host().as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHost;

    #[test]
    fn revision_is_folded_into_version() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        assert_eq!(fingerprint(&host), Some(BuildVersion::new(10, 0, 22621, 2215)));
    }

    #[test]
    fn unreadable_revision_degrades_to_zero() {
        let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
        host.hide_revision();
        assert_eq!(fingerprint(&host), Some(BuildVersion::new(10, 0, 22621, 0)));
    }
}
