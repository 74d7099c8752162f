//! Format tables: how each pixel local storage format maps onto the data
//! types and storage of the two backends.

use crate::ir::{BasicType, ImageInternalFormat, Precision, Type};

/// Internal formats a pixel local storage plane may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlsFormat {
    Rgba8,
    Rgba8i,
    Rgba8ui,
    R32f,
    R32ui,
}

/// Image backing for one plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageFormat {
    pub basic: BasicType,
    pub format: ImageInternalFormat,
    /// Four 8-bit channels packed into one 32-bit channel. Packed images
    /// are always `highp`.
    pub packed: bool,
}

impl PlsFormat {
    pub const ALL: [PlsFormat; 5] = [
        PlsFormat::Rgba8,
        PlsFormat::Rgba8i,
        PlsFormat::Rgba8ui,
        PlsFormat::R32f,
        PlsFormat::R32ui,
    ];

    pub fn from_internal_format(format: ImageInternalFormat) -> Option<PlsFormat> {
        match format {
            ImageInternalFormat::Rgba8 => Some(PlsFormat::Rgba8),
            ImageInternalFormat::Rgba8i => Some(PlsFormat::Rgba8i),
            ImageInternalFormat::Rgba8ui => Some(PlsFormat::Rgba8ui),
            ImageInternalFormat::R32f => Some(PlsFormat::R32f),
            ImageInternalFormat::R32ui => Some(PlsFormat::R32ui),
            ImageInternalFormat::R32i | ImageInternalFormat::Unspecified => None,
        }
    }

    /// Format of a PLS variable's type. Panics if the type does not carry
    /// a pixel local storage format.
    pub fn of(ty: &Type) -> PlsFormat {
        match PlsFormat::from_internal_format(ty.layout.image_internal_format) {
            Some(format) => format,
            None => panic!(
                "internal error: {:?} is not a pixel local storage format",
                ty.layout.image_internal_format
            ),
        }
    }

    pub fn internal_format(self) -> ImageInternalFormat {
        match self {
            PlsFormat::Rgba8 => ImageInternalFormat::Rgba8,
            PlsFormat::Rgba8i => ImageInternalFormat::Rgba8i,
            PlsFormat::Rgba8ui => ImageInternalFormat::Rgba8ui,
            PlsFormat::R32f => ImageInternalFormat::R32f,
            PlsFormat::R32ui => ImageInternalFormat::R32ui,
        }
    }

    /// Scalar kind of the plane's data.
    pub fn data_type(self) -> BasicType {
        match self {
            PlsFormat::Rgba8 | PlsFormat::R32f => BasicType::Float,
            PlsFormat::Rgba8i => BasicType::Int,
            PlsFormat::Rgba8ui | PlsFormat::R32ui => BasicType::UInt,
        }
    }

    /// Number of meaningful components.
    pub fn component_count(self) -> u8 {
        match self {
            PlsFormat::Rgba8 | PlsFormat::Rgba8i | PlsFormat::Rgba8ui => 4,
            PlsFormat::R32f | PlsFormat::R32ui => 1,
        }
    }

    /// Image type backing the plane. Only the 4x8-bit formats are ever
    /// packed; 32-bit formats already fit one channel.
    pub fn image_format(self, pack_r32: bool) -> ImageFormat {
        let (basic, format, packed) = match (self, pack_r32) {
            (PlsFormat::Rgba8, true) => (BasicType::UImage2D, ImageInternalFormat::R32ui, true),
            (PlsFormat::Rgba8, false) => (BasicType::Image2D, ImageInternalFormat::Rgba8, false),
            (PlsFormat::Rgba8i, true) => (BasicType::IImage2D, ImageInternalFormat::R32i, true),
            (PlsFormat::Rgba8i, false) => {
                (BasicType::IImage2D, ImageInternalFormat::Rgba8i, false)
            }
            (PlsFormat::Rgba8ui, true) => {
                (BasicType::UImage2D, ImageInternalFormat::R32ui, true)
            }
            (PlsFormat::Rgba8ui, false) => {
                (BasicType::UImage2D, ImageInternalFormat::Rgba8ui, false)
            }
            (PlsFormat::R32f, _) => (BasicType::Image2D, ImageInternalFormat::R32f, false),
            (PlsFormat::R32ui, _) => (BasicType::UImage2D, ImageInternalFormat::R32ui, false),
        };
        ImageFormat {
            basic,
            format,
            packed,
        }
    }

    /// Type of the framebuffer-fetch access variable.
    pub fn access_type(self, precision: Precision) -> Type {
        Type::new(self.data_type(), self.component_count()).with_precision(precision)
    }
}

/// Data type a PLS handle type loads and stores.
pub fn data_type_of_pls_type(pls: BasicType) -> BasicType {
    match pls {
        BasicType::PixelLocal => BasicType::Float,
        BasicType::IPixelLocal => BasicType::Int,
        BasicType::UPixelLocal => BasicType::UInt,
        other => panic!("internal error: {:?} is not a pixel local storage type", other),
    }
}

/// Data type an image type loads and stores.
pub fn data_type_of_image_type(image: BasicType) -> BasicType {
    match image {
        BasicType::Image2D => BasicType::Float,
        BasicType::IImage2D => BasicType::Int,
        BasicType::UImage2D => BasicType::UInt,
        other => panic!("internal error: {:?} is not an image type", other),
    }
}
