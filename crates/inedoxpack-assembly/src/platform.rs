//! Target framework identification.
//!
//! The set of platforms is closed. Every mapping (flag bit, folder name,
//! `TargetFrameworkAttribute` value) lives in [`DESCRIPTORS`], so adding a
//! platform means adding one variant and one descriptor row.

use std::fmt;

/// A target framework an extension build can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TargetPlatform {
    /// .NET Framework 4.5.2.
    Net452 = 0,
    /// .NET 5.
    Net50 = 1,
    /// .NET 6.
    Net60 = 2,
    /// .NET 8.
    Net80 = 3,
}

struct Descriptor {
    platform: TargetPlatform,
    flag: u8,
    name: &'static str,
    framework: &'static str,
}

/// Canonical order; indexed by the enum discriminant.
const DESCRIPTORS: [Descriptor; 4] = [
    Descriptor {
        platform: TargetPlatform::Net452,
        flag: 0x1,
        name: "net452",
        framework: ".NETFramework,Version=v4.5.2",
    },
    Descriptor {
        platform: TargetPlatform::Net50,
        flag: 0x2,
        name: "net5.0",
        framework: ".NETCoreApp,Version=v5.0",
    },
    Descriptor {
        platform: TargetPlatform::Net60,
        flag: 0x4,
        name: "net6.0",
        framework: ".NETCoreApp,Version=v6.0",
    },
    Descriptor {
        platform: TargetPlatform::Net80,
        flag: 0x8,
        name: "net8.0",
        framework: ".NETCoreApp,Version=v8.0",
    },
];

impl TargetPlatform {
    fn descriptor(self) -> &'static Descriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Folder and manifest name (e.g. `net8.0`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.descriptor().name
    }

    /// Parse a folder/manifest name. Matching is exact.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        DESCRIPTORS.iter().find(|d| d.name == s).map(|d| d.platform)
    }

    /// The `TargetFrameworkAttribute` value a build for this platform carries.
    #[must_use]
    pub fn framework_name(&self) -> &'static str {
        self.descriptor().framework
    }

    /// Map a `TargetFrameworkAttribute` value to a platform.
    #[must_use]
    pub fn from_framework_name(framework: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|d| d.framework == framework)
            .map(|d| d.platform)
    }

    /// The flag bit used when platforms are combined.
    #[must_use]
    pub fn flag(&self) -> u8 {
        self.descriptor().flag
    }

    /// All platforms in canonical order.
    #[must_use]
    pub fn all() -> impl Iterator<Item = TargetPlatform> {
        DESCRIPTORS.iter().map(|d| d.platform)
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A combination of target platforms (bitwise OR of their flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlatformSet(u8);

impl PlatformSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn bits(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(&self, platform: TargetPlatform) -> bool {
        self.0 & platform.flag() != 0
    }

    /// Add a platform. Returns `false` if it was already present.
    pub fn insert(&mut self, platform: TargetPlatform) -> bool {
        let added = !self.contains(platform);
        self.0 |= platform.flag();
        added
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = TargetPlatform> + '_ {
        TargetPlatform::all().filter(|p| self.contains(*p))
    }

    /// Member names in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.as_str()).collect()
    }
}

impl FromIterator<TargetPlatform> for PlatformSet {
    fn from_iter<I: IntoIterator<Item = TargetPlatform>>(iter: I) -> Self {
        let mut set = Self::empty();
        for platform in iter {
            set.insert(platform);
        }
        set
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use test_case::test_case;

    #[test]
    fn DESCRIPTORS___order___matches_discriminants() {
        for (index, descriptor) in DESCRIPTORS.iter().enumerate() {
            assert_eq!(descriptor.platform as usize, index);
            assert_eq!(descriptor.flag, 1 << index);
        }
    }

    #[test_case(TargetPlatform::Net452, "net452", ".NETFramework,Version=v4.5.2")]
    #[test_case(TargetPlatform::Net50, "net5.0", ".NETCoreApp,Version=v5.0")]
    #[test_case(TargetPlatform::Net60, "net6.0", ".NETCoreApp,Version=v6.0")]
    #[test_case(TargetPlatform::Net80, "net8.0", ".NETCoreApp,Version=v8.0")]
    fn TargetPlatform___mappings___are_bidirectional(
        platform: TargetPlatform,
        name: &str,
        framework: &str,
    ) {
        assert_eq!(platform.as_str(), name);
        assert_eq!(TargetPlatform::parse(name), Some(platform));
        assert_eq!(platform.framework_name(), framework);
        assert_eq!(TargetPlatform::from_framework_name(framework), Some(platform));
    }

    #[test_case("net7.0" ; "unsupported version")]
    #[test_case("NET8.0" ; "wrong case")]
    #[test_case(" net8.0" ; "leading whitespace")]
    #[test_case("" ; "empty")]
    fn TargetPlatform___parse___rejects_unknown(name: &str) {
        assert_eq!(TargetPlatform::parse(name), None);
    }

    #[test]
    fn TargetPlatform___from_framework_name___rejects_unknown() {
        assert_eq!(
            TargetPlatform::from_framework_name(".NETCoreApp,Version=v7.0"),
            None
        );
        assert_eq!(
            TargetPlatform::from_framework_name(".NETStandard,Version=v2.0"),
            None
        );
    }

    #[test]
    fn PlatformSet___iter___uses_canonical_order() {
        let set: PlatformSet = [
            TargetPlatform::Net80,
            TargetPlatform::Net452,
            TargetPlatform::Net60,
        ]
        .into_iter()
        .collect();

        assert_eq!(set.names(), vec!["net452", "net6.0", "net8.0"]);
        assert_eq!(set.len(), 3);
        assert!(!set.contains(TargetPlatform::Net50));
    }

    #[test]
    fn PlatformSet___insert___reports_duplicates() {
        let mut set = PlatformSet::empty();

        assert!(set.insert(TargetPlatform::Net60));
        assert!(!set.insert(TargetPlatform::Net60));
        assert_eq!(set.bits(), 0x4);
    }

    #[test]
    fn PlatformSet___display___joins_names() {
        let set: PlatformSet = [TargetPlatform::Net452, TargetPlatform::Net80]
            .into_iter()
            .collect();

        assert_eq!(set.to_string(), "net452, net8.0");
        assert!(PlatformSet::empty().is_empty());
    }
}
