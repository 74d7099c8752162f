//! Types, qualifiers and layout of shader variables and expressions.

use std::fmt;

// ─── Basic types ───────────────────────────────────────────────────

/// The scalar or opaque kind of a type. Vectors are a basic type plus a
/// nominal size on [`Type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicType {
    Void,
    Float,
    Int,
    UInt,
    Bool,
    Image2D,
    IImage2D,
    UImage2D,
    /// `pixelLocalANGLE`: float pixel local storage handle.
    PixelLocal,
    /// `ipixelLocalANGLE`: signed integer pixel local storage handle.
    IPixelLocal,
    /// `upixelLocalANGLE`: unsigned integer pixel local storage handle.
    UPixelLocal,
}

impl BasicType {
    pub fn is_pixel_local(self) -> bool {
        matches!(
            self,
            BasicType::PixelLocal | BasicType::IPixelLocal | BasicType::UPixelLocal
        )
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            BasicType::Image2D | BasicType::IImage2D | BasicType::UImage2D
        )
    }

    pub fn is_opaque(self) -> bool {
        self.is_image() || self.is_pixel_local()
    }

    pub fn is_integer(self) -> bool {
        matches!(self, BasicType::Int | BasicType::UInt)
    }

    /// GLSL spelling of the type with the given nominal size.
    pub fn glsl_name(self, size: u8) -> String {
        let (scalar, vector_prefix) = match self {
            BasicType::Void => return "void".to_string(),
            BasicType::Image2D => return "image2D".to_string(),
            BasicType::IImage2D => return "iimage2D".to_string(),
            BasicType::UImage2D => return "uimage2D".to_string(),
            BasicType::PixelLocal => return "pixelLocalANGLE".to_string(),
            BasicType::IPixelLocal => return "ipixelLocalANGLE".to_string(),
            BasicType::UPixelLocal => return "upixelLocalANGLE".to_string(),
            BasicType::Float => ("float", "vec"),
            BasicType::Int => ("int", "ivec"),
            BasicType::UInt => ("uint", "uvec"),
            BasicType::Bool => ("bool", "bvec"),
        };
        if size <= 1 {
            scalar.to_string()
        } else {
            format!("{}{}", vector_prefix, size)
        }
    }
}

// ─── Precision & qualifiers ────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    #[default]
    Undefined,
    Low,
    Medium,
    High,
}

impl Precision {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Precision::Undefined => None,
            Precision::Low => Some("lowp"),
            Precision::Medium => Some("mediump"),
            Precision::High => Some("highp"),
        }
    }
}

/// Storage qualifier of a variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// Function-local variable or a synthesized temporary.
    #[default]
    Temporary,
    /// Global variable without storage qualifier.
    Global,
    Const,
    Uniform,
    FragmentIn,
    FragmentOut,
    FragmentInOut,
    ParamIn,
    ParamOut,
    ParamInOut,
    /// Predeclared `gl_*` variable.
    BuiltIn,
}

impl Qualifier {
    pub fn is_fragment_output(self) -> bool {
        matches!(self, Qualifier::FragmentOut | Qualifier::FragmentInOut)
    }

    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Qualifier::Temporary | Qualifier::Global | Qualifier::BuiltIn => None,
            Qualifier::Const => Some("const"),
            Qualifier::Uniform => Some("uniform"),
            Qualifier::FragmentIn | Qualifier::ParamIn => Some("in"),
            Qualifier::FragmentOut | Qualifier::ParamOut => Some("out"),
            Qualifier::FragmentInOut | Qualifier::ParamInOut => Some("inout"),
        }
    }
}

// ─── Layout ────────────────────────────────────────────────────────

/// Internal format declared on an image or a pixel local storage plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageInternalFormat {
    #[default]
    Unspecified,
    Rgba8,
    Rgba8i,
    Rgba8ui,
    R32f,
    R32i,
    R32ui,
}

impl ImageInternalFormat {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            ImageInternalFormat::Unspecified => None,
            ImageInternalFormat::Rgba8 => Some("rgba8"),
            ImageInternalFormat::Rgba8i => Some("rgba8i"),
            ImageInternalFormat::Rgba8ui => Some("rgba8ui"),
            ImageInternalFormat::R32f => Some("r32f"),
            ImageInternalFormat::R32i => Some("r32i"),
            ImageInternalFormat::R32ui => Some("r32ui"),
        }
    }
}

/// `layout(...)` qualifier contents relevant to this crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayoutQualifier {
    pub binding: Option<u32>,
    pub location: Option<u32>,
    pub image_internal_format: ImageInternalFormat,
    /// D3D rasterizer ordered view.
    pub raster_ordered: bool,
    /// `noncoherent` framebuffer fetch.
    pub noncoherent: bool,
}

impl LayoutQualifier {
    pub fn is_empty(&self) -> bool {
        *self == LayoutQualifier::default()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryQualifier {
    pub coherent: bool,
    pub restrict: bool,
    pub volatile: bool,
    pub readonly: bool,
    pub writeonly: bool,
}

// ─── Type ──────────────────────────────────────────────────────────

/// A fully qualified type. `size` is the vector width (1 for scalars and
/// opaque types).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub basic: BasicType,
    pub precision: Precision,
    pub qualifier: Qualifier,
    pub size: u8,
    pub array_size: Option<u32>,
    pub layout: LayoutQualifier,
    pub memory: MemoryQualifier,
}

impl Type {
    pub fn new(basic: BasicType, size: u8) -> Self {
        debug_assert!((1..=4).contains(&size));
        Self {
            basic,
            precision: Precision::Undefined,
            qualifier: Qualifier::Temporary,
            size,
            array_size: None,
            layout: LayoutQualifier::default(),
            memory: MemoryQualifier::default(),
        }
    }

    pub fn scalar(basic: BasicType) -> Self {
        Self::new(basic, 1)
    }

    pub fn void() -> Self {
        Self::new(BasicType::Void, 1)
    }

    pub fn vec4() -> Self {
        Self::new(BasicType::Float, 4)
    }

    pub fn ivec4() -> Self {
        Self::new(BasicType::Int, 4)
    }

    pub fn uvec4() -> Self {
        Self::new(BasicType::UInt, 4)
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn with_layout(mut self, layout: LayoutQualifier) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_array_size(mut self, size: u32) -> Self {
        self.array_size = Some(size);
        self
    }

    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    pub fn is_scalar(&self) -> bool {
        self.size == 1 && !self.basic.is_opaque() && self.basic != BasicType::Void
    }

    /// The same shape without qualifiers, layout or precision: the type of
    /// an rvalue of this type.
    pub fn unqualified(&self) -> Type {
        Type::new(self.basic, self.size)
    }

    /// GLSL spelling of the basic type and size, e.g. `uvec4`.
    pub fn glsl_name(&self) -> String {
        self.basic.glsl_name(self.size)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glsl_name())?;
        if let Some(n) = self.array_size {
            write!(f, "[{}]", n)?;
        }
        Ok(())
    }
}
