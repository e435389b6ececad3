//! Properties of image formats that the heuristics depend on.

use ash::vk;

/// Returns the aspects that `format` contains.
pub fn format_aspects(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::UNDEFINED => vk::ImageAspectFlags::empty(),
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

#[inline]
pub fn is_depth_or_stencil(format: vk::Format) -> bool {
    format_aspects(format)
        .intersects(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
}

#[inline]
pub fn has_depth(format: vk::Format) -> bool {
    format_aspects(format).contains(vk::ImageAspectFlags::DEPTH)
}

#[inline]
pub fn has_stencil(format: vk::Format) -> bool {
    format_aspects(format).contains(vk::ImageAspectFlags::STENCIL)
}

/// The numeric interpretation of a color format's components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericType {
    /// Normalized, scaled or floating point values, cleared with `float32` values.
    Float,
    /// Unsigned integers, cleared with `uint32` values.
    Uint,
    /// Signed integers, cleared with `int32` values.
    Sint,
}

/// Returns which of the R, G, B and A components `format` stores, in that order.
///
/// Unknown color formats are assumed to have all four components.
pub fn color_components(format: vk::Format) -> [bool; 4] {
    const R: [bool; 4] = [true, false, false, false];
    const RG: [bool; 4] = [true, true, false, false];
    const RGB: [bool; 4] = [true, true, true, false];
    const RGBA: [bool; 4] = [true, true, true, true];

    match format {
        vk::Format::R8_UNORM
        | vk::Format::R8_SNORM
        | vk::Format::R8_UINT
        | vk::Format::R8_SINT
        | vk::Format::R8_SRGB
        | vk::Format::R16_UNORM
        | vk::Format::R16_SNORM
        | vk::Format::R16_UINT
        | vk::Format::R16_SINT
        | vk::Format::R16_SFLOAT
        | vk::Format::R32_UINT
        | vk::Format::R32_SINT
        | vk::Format::R32_SFLOAT => R,
        vk::Format::R8G8_UNORM
        | vk::Format::R8G8_SNORM
        | vk::Format::R8G8_UINT
        | vk::Format::R8G8_SINT
        | vk::Format::R8G8_SRGB
        | vk::Format::R16G16_UNORM
        | vk::Format::R16G16_SNORM
        | vk::Format::R16G16_UINT
        | vk::Format::R16G16_SINT
        | vk::Format::R16G16_SFLOAT
        | vk::Format::R32G32_UINT
        | vk::Format::R32G32_SINT
        | vk::Format::R32G32_SFLOAT => RG,
        vk::Format::R5G6B5_UNORM_PACK16
        | vk::Format::B5G6R5_UNORM_PACK16
        | vk::Format::R8G8B8_UNORM
        | vk::Format::B8G8R8_UNORM
        | vk::Format::R8G8B8_SRGB
        | vk::Format::R16G16B16_SFLOAT
        | vk::Format::R32G32B32_UINT
        | vk::Format::R32G32B32_SINT
        | vk::Format::R32G32B32_SFLOAT
        | vk::Format::B10G11R11_UFLOAT_PACK32
        | vk::Format::E5B9G9R9_UFLOAT_PACK32 => RGB,
        _ => RGBA,
    }
}

/// Returns how the color components of `format` are cleared.
pub fn color_numeric_type(format: vk::Format) -> NumericType {
    match format {
        vk::Format::R8_UINT
        | vk::Format::R8G8_UINT
        | vk::Format::R8G8B8A8_UINT
        | vk::Format::B8G8R8A8_UINT
        | vk::Format::A8B8G8R8_UINT_PACK32
        | vk::Format::A2R10G10B10_UINT_PACK32
        | vk::Format::A2B10G10R10_UINT_PACK32
        | vk::Format::R16_UINT
        | vk::Format::R16G16_UINT
        | vk::Format::R16G16B16A16_UINT
        | vk::Format::R32_UINT
        | vk::Format::R32G32_UINT
        | vk::Format::R32G32B32_UINT
        | vk::Format::R32G32B32A32_UINT => NumericType::Uint,
        vk::Format::R8_SINT
        | vk::Format::R8G8_SINT
        | vk::Format::R8G8B8A8_SINT
        | vk::Format::B8G8R8A8_SINT
        | vk::Format::A8B8G8R8_SINT_PACK32
        | vk::Format::A2R10G10B10_SINT_PACK32
        | vk::Format::A2B10G10R10_SINT_PACK32
        | vk::Format::R16_SINT
        | vk::Format::R16G16_SINT
        | vk::Format::R16G16B16A16_SINT
        | vk::Format::R32_SINT
        | vk::Format::R32G32_SINT
        | vk::Format::R32G32B32_SINT
        | vk::Format::R32G32B32A32_SINT => NumericType::Sint,
        _ => NumericType::Float,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspects() {
        assert_eq!(
            format_aspects(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        );
        assert!(is_depth_or_stencil(vk::Format::S8_UINT));
        assert!(!has_depth(vk::Format::S8_UINT));
        assert!(!is_depth_or_stencil(vk::Format::R8G8B8A8_UNORM));
    }

    #[test]
    fn components() {
        assert_eq!(
            color_components(vk::Format::R8G8_UNORM),
            [true, true, false, false],
        );
        assert_eq!(
            color_components(vk::Format::B10G11R11_UFLOAT_PACK32),
            [true, true, true, false],
        );
        assert_eq!(color_components(vk::Format::B8G8R8A8_SRGB), [true; 4]);
        assert_eq!(
            color_numeric_type(vk::Format::R16G16B16A16_SINT),
            NumericType::Sint,
        );
    }
}
