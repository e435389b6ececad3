//! Clear values, and the registry of custom clear colors that can be fast-cleared.
//!
//! Some NVIDIA GPUs can compress a clear with any color, as long as the image has one of a
//! handful of formats and the color is one of a small number of recently used colors. Clearing to
//! all zeros or all ones is always compressed.

use crate::{
    device::BestPractices,
    format::{self, NumericType},
    message_ids, LogObject, VendorChecks,
};
use ash::vk;
use foldhash::HashSet;
use parking_lot::RwLock;
use std::fmt;

/// A color to clear an image with. The variant must match the numeric type of the image format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearColorValue {
    /// For normalized, scaled and floating point formats.
    Float([f32; 4]),
    /// For signed integer formats.
    Int([i32; 4]),
    /// For unsigned integer formats.
    Uint([u32; 4]),
}

impl ClearColorValue {
    /// Returns the bits of the four components, the way the value is laid out in memory.
    #[inline]
    pub fn to_raw(self) -> [u32; 4] {
        match self {
            ClearColorValue::Float(values) => bytemuck::cast(values),
            ClearColorValue::Int(values) => bytemuck::cast(values),
            ClearColorValue::Uint(values) => values,
        }
    }
}

impl Default for ClearColorValue {
    #[inline]
    fn default() -> Self {
        ClearColorValue::Float([0.0; 4])
    }
}

/// A value to clear an attachment with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color(ClearColorValue),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Returns the color, if this is a color clear value.
    #[inline]
    pub fn color(self) -> Option<ClearColorValue> {
        match self {
            ClearValue::Color(color) => Some(color),
            ClearValue::DepthStencil { .. } => None,
        }
    }
}

impl Default for ClearValue {
    #[inline]
    fn default() -> Self {
        ClearValue::Color(ClearColorValue::default())
    }
}

impl From<ClearColorValue> for ClearValue {
    #[inline]
    fn from(color: ClearColorValue) -> Self {
        ClearValue::Color(color)
    }
}

/// Formats that support fast clears with custom clear colors.
pub const CUSTOM_CLEAR_COLOR_COMPRESSED_FORMATS: [vk::Format; 12] = [
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::A8B8G8R8_UNORM_PACK32,
    vk::Format::A2R10G10B10_UNORM_PACK32,
    vk::Format::A2B10G10R10_UNORM_PACK32,
    vk::Format::R16G16B16A16_UNORM,
    vk::Format::R16G16B16A16_SNORM,
    vk::Format::R16G16B16A16_UINT,
    vk::Format::R16G16B16A16_SINT,
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R32G32B32A32_SFLOAT,
    vk::Format::B10G11R11_UFLOAT_PACK32,
];

/// Returns the raw bits of `color` as seen by an image of `format`. Components that the format
/// doesn't have are zeroed.
pub fn raw_clear_color(format: vk::Format, color: ClearColorValue) -> [u32; 4] {
    let mut raw = color.to_raw();

    for (value, present) in raw.iter_mut().zip(format::color_components(format)) {
        if !present {
            *value = 0;
        }
    }

    raw
}

/// Returns whether every component of `format` is cleared to zero, or every component to one.
pub fn is_clear_color_zero_or_one(format: vk::Format, raw: [u32; 4]) -> bool {
    let one = match format::color_numeric_type(format) {
        NumericType::Float => 1.0f32.to_bits(),
        NumericType::Uint | NumericType::Sint => 1,
    };
    let components = format::color_components(format);
    let all = |expected: u32| {
        raw.iter()
            .zip(components)
            .all(|(&value, present)| !present || value == expected)
    };

    all(0) || all(one)
}

/// The outcome of [`ClearColorRegistry::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearColorCompression {
    /// The clear is compressed.
    Compressed,
    /// The format doesn't support custom clear colors, and the color isn't zero or one.
    UnsupportedFormat,
    /// The registry is full and doesn't contain the color.
    Unregistered,
}

/// A bounded set of the custom clear colors in use on the device.
pub(crate) struct ClearColorRegistry {
    colors: RwLock<HashSet<[u32; 4]>>,
    capacity: usize,
}

impl ClearColorRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        ClearColorRegistry {
            colors: RwLock::new(HashSet::default()),
            capacity,
        }
    }

    /// Remembers a clear color, unless it's always compressed or the registry is full.
    pub(crate) fn record(&self, format: vk::Format, color: ClearColorValue) {
        let raw = raw_clear_color(format, color);

        if is_clear_color_zero_or_one(format, raw) {
            return;
        }

        let mut colors = self.colors.write();

        if colors.len() < self.capacity {
            colors.insert(raw);
        }
    }

    /// Returns whether clearing an image of `format` with `color` would be compressed.
    pub(crate) fn validate(
        &self,
        format: vk::Format,
        color: ClearColorValue,
    ) -> ClearColorCompression {
        let raw = raw_clear_color(format, color);

        if is_clear_color_zero_or_one(format, raw) {
            return ClearColorCompression::Compressed;
        }

        if !CUSTOM_CLEAR_COLOR_COMPRESSED_FORMATS.contains(&format) {
            return ClearColorCompression::UnsupportedFormat;
        }

        let colors = self.colors.read();

        if colors.len() >= self.capacity && !colors.contains(&raw) {
            ClearColorCompression::Unregistered
        } else {
            ClearColorCompression::Compressed
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.colors.read().len()
    }
}

impl fmt::Debug for ClearColorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClearColorRegistry")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl BestPractices {
    /// Reports a clear with `color` that the NVIDIA fast clear path can't compress.
    pub(crate) fn validate_clear_color(
        &self,
        location: &'static str,
        objects: &[LogObject],
        format: vk::Format,
        color: ClearColorValue,
    ) {
        match self.clear_colors.validate(format, color) {
            ClearColorCompression::Compressed => {}
            ClearColorCompression::UnsupportedFormat => {
                self.reporter.performance_warning(
                    message_ids::CLEAR_COLOR_NOT_COMPRESSED,
                    VendorChecks::NVIDIA,
                    location,
                    objects,
                    format_args!(
                        "clearing an image of format {:?} with {:?}, which isn't compressed; \
                        clear with zeros or ones, or use one of the formats {:?}",
                        format, color, CUSTOM_CLEAR_COLOR_COMPRESSED_FORMATS,
                    ),
                );
            }
            ClearColorCompression::Unregistered => {
                self.reporter.performance_warning(
                    message_ids::CLEAR_COLOR_UNREGISTERED,
                    VendorChecks::NVIDIA,
                    location,
                    objects,
                    format_args!(
                        "clearing with the custom color {:?}, but {} other custom clear colors \
                        are already in use, so the clear isn't compressed; use a small palette \
                        of clear colors",
                        color,
                        self.clear_colors.len(),
                    ),
                );
            }
        }
    }
}
