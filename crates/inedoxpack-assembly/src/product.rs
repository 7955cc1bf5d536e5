//! Host products an extension declares support for.

use std::fmt;

/// A known Inedo host product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostProduct {
    BuildMaster,
    Otter,
    ProGet,
}

impl HostProduct {
    /// Flag value in the `AppliesToAttribute` bitset.
    #[must_use]
    pub fn flag(&self) -> i32 {
        match self {
            Self::BuildMaster => 0x1,
            Self::Otter => 0x2,
            Self::ProGet => 0x4,
        }
    }

    /// Display name as written to the package manifest.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildMaster => "BuildMaster",
            Self::Otter => "Otter",
            Self::ProGet => "ProGet",
        }
    }

    /// All products in canonical manifest order.
    #[must_use]
    pub fn all() -> &'static [HostProduct] {
        &[Self::BuildMaster, Self::Otter, Self::ProGet]
    }
}

impl fmt::Display for HostProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw product bitset decoded from `AppliesToAttribute`.
///
/// Unknown bits are preserved so that two builds compare equal only when
/// their declarations are bit-for-bit identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HostProducts(i32);

impl HostProducts {
    /// No products declared (the attribute is absent).
    pub const UNSPECIFIED: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn bits(&self) -> i32 {
        self.0
    }

    #[must_use]
    pub fn contains(&self, product: HostProduct) -> bool {
        self.0 & product.flag() != 0
    }

    /// Known products in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = HostProduct> + '_ {
        HostProduct::all()
            .iter()
            .copied()
            .filter(|p| self.contains(*p))
    }

    /// Known product names in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.as_str()).collect()
    }
}

impl FromIterator<HostProduct> for HostProducts {
    fn from_iter<I: IntoIterator<Item = HostProduct>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |bits, p| bits | p.flag()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn HostProducts___names___use_canonical_order() {
        let products: HostProducts = [HostProduct::ProGet, HostProduct::BuildMaster]
            .into_iter()
            .collect();

        assert_eq!(products.names(), vec!["BuildMaster", "ProGet"]);
    }

    #[test]
    fn HostProducts___unknown_bits___are_kept_but_not_named() {
        let products = HostProducts::from_bits(0x1 | 0x40);

        assert_eq!(products.names(), vec!["BuildMaster"]);
        assert_ne!(products, HostProducts::from_bits(0x1));
    }

    #[test]
    fn HostProducts___unspecified___has_no_names() {
        assert!(HostProducts::UNSPECIFIED.names().is_empty());
        assert_eq!(HostProducts::default(), HostProducts::UNSPECIFIED);
    }
}
