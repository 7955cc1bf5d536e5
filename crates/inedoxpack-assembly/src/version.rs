//! Four-part assembly versions.

use std::fmt;

/// An assembly version (`major.minor[.build[.revision]]`).
///
/// `build` and `revision` are optional: a version written as `2.3` has no
/// build component, which packaging treats as zero. Versions read from
/// metadata always carry all four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssemblyVersion {
    pub major: u16,
    pub minor: u16,
    pub build: Option<u16>,
    pub revision: Option<u16>,
}

impl AssemblyVersion {
    /// Create a fully specified version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Create a version with only major and minor components.
    #[must_use]
    pub const fn with_major_minor(major: u16, minor: u16) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// The build component, clamped to zero when undefined.
    #[must_use]
    pub fn build_or_zero(&self) -> u16 {
        self.build.unwrap_or(0)
    }

    /// Render the first `fields` components (1 to 4); undefined components render as `0`.
    ///
    /// # Example
    ///
    /// ```
    /// use inedoxpack_assembly::AssemblyVersion;
    ///
    /// let version = AssemblyVersion::new(2023, 4, 1, 0);
    /// assert_eq!(version.to_string_n(3), "2023.4.1");
    /// ```
    #[must_use]
    pub fn to_string_n(&self, fields: usize) -> String {
        let components = [
            self.major,
            self.minor,
            self.build.unwrap_or(0),
            self.revision.unwrap_or(0),
        ];
        components[..fields.clamp(1, 4)]
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}
