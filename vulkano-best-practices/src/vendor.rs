//! Hardware vendors whose specific heuristics can be enabled.

use foldhash::HashMap;
use parking_lot::RwLock;
use std::{
    error::Error,
    fmt,
    ops::{BitAnd, BitOr, BitOrAssign},
    str::FromStr,
    sync::Arc,
};

/// A set of hardware vendors.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VendorChecks(u32);

const VENDORS: [(VendorChecks, &str); 4] = [
    (VendorChecks::ARM, "Arm"),
    (VendorChecks::AMD, "AMD"),
    (VendorChecks::IMG, "IMG"),
    (VendorChecks::NVIDIA, "NVIDIA"),
];

impl VendorChecks {
    /// Arm Mali, tile-based.
    pub const ARM: Self = Self(1 << 0);

    /// AMD, immediate-mode discrete and integrated.
    pub const AMD: Self = Self(1 << 1);

    /// Imagination PowerVR, tile-based.
    pub const IMG: Self = Self(1 << 2);

    /// NVIDIA, immediate-mode discrete.
    pub const NVIDIA: Self = Self(1 << 3);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn all() -> Self {
        Self(Self::ARM.0 | Self::AMD.0 | Self::IMG.0 | Self::NVIDIA.0)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether any vendor in `other` is also in `self`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns an iterator over the individual vendors and their display names.
    pub fn iter(self) -> impl Iterator<Item = (VendorChecks, &'static str)> {
        VENDORS
            .into_iter()
            .filter(move |&(vendor, _)| self.contains(vendor))
    }
}

impl fmt::Debug for VendorChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();

        for (_, name) in self.iter() {
            list.entry(&name);
        }

        list.finish()
    }
}

impl BitOr for VendorChecks {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for VendorChecks {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for VendorChecks {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl FromStr for VendorChecks {
    type Err = ParseVendorChecksError;

    /// Parses a list of vendor names separated by commas, such as `"arm, nvidia"`. The name `all`
    /// selects every vendor. Names are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut vendors = VendorChecks::empty();

        for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                vendors |= VendorChecks::all();
                continue;
            }

            let (vendor, _) = VENDORS
                .into_iter()
                .find(|(_, vendor_name)| vendor_name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ParseVendorChecksError {
                    name: name.to_owned(),
                })?;
            vendors |= vendor;
        }

        Ok(vendors)
    }
}

/// Error that can happen when parsing [`VendorChecks`] from a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseVendorChecksError {
    /// The name that didn't match any vendor.
    pub name: String,
}

impl Error for ParseVendorChecksError {}

impl fmt::Display for ParseVendorChecksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a known vendor", self.name)
    }
}

/// Returns whether any vendor in `vendors` is enabled in `enabled`.
#[inline]
pub fn is_vendor_check_enabled(enabled: VendorChecks, vendors: VendorChecks) -> bool {
    enabled.intersects(vendors)
}

/// Memoized `[Vendor1, Vendor2]` message tags.
///
/// Tags are computed once per distinct set of vendors and never evicted.
#[derive(Debug, Default)]
pub(crate) struct VendorTagCache {
    inner: RwLock<HashMap<VendorChecks, Arc<str>>>,
}

impl VendorTagCache {
    pub(crate) fn tag(&self, vendors: VendorChecks) -> Arc<str> {
        if let Some(tag) = self.inner.read().get(&vendors) {
            return tag.clone();
        }

        self.inner
            .write()
            .entry(vendors)
            .or_insert_with(|| format_vendor_tag(vendors).into())
            .clone()
    }
}

fn format_vendor_tag(vendors: VendorChecks) -> String {
    let names = vendors.iter().map(|(_, name)| name).collect::<Vec<_>>();

    format!("[{}]", names.join(", "))
}
