//! Compile options for the pixel local storage lowering.
//!
//! Options are plain data with serde support so drivers can embed them in
//! their own configuration. A standalone `pls.toml` can also be loaded
//! with [`CompileOptions::load`]:
//!
//! ```toml
//! [compile]
//! shader-version = 310
//! pass-highp-to-pack-unorm-snorm-builtins = false
//!
//! [pls]
//! backend = "image-packed-32bit"
//! fragment-synchronization = "interlock-nv"
//!
//! [resources]
//! max-combined-draw-buffers-and-pixel-local-storage-planes = 8
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::span::Span;

// ─── Backend selection ─────────────────────────────────────────────

/// How pixel local storage is implemented on the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlsBackend {
    /// Shader images in the plane's own format.
    #[serde(rename = "image-unpacked")]
    ImageStoreNativeFormats,
    /// Shader images, with 4x8-bit formats packed into one 32-bit channel.
    #[default]
    #[serde(rename = "image-packed-32bit")]
    ImageStoreR32PackedFormats,
    /// Framebuffer fetch on extra color attachments.
    FramebufferFetch,
}

impl PlsBackend {
    pub const ALL: [PlsBackend; 3] = [
        PlsBackend::ImageStoreNativeFormats,
        PlsBackend::ImageStoreR32PackedFormats,
        PlsBackend::FramebufferFetch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlsBackend::ImageStoreNativeFormats => "image-unpacked",
            PlsBackend::ImageStoreR32PackedFormats => "image-packed-32bit",
            PlsBackend::FramebufferFetch => "framebuffer-fetch",
        }
    }

    pub fn uses_images(self) -> bool {
        !matches!(self, PlsBackend::FramebufferFetch)
    }
}

impl fmt::Display for PlsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlsBackend {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlsBackend::ALL
            .into_iter()
            .find(|backend| backend.name() == s)
            .ok_or_else(|| unknown_value("pixel local storage backend", s, &PlsBackend::ALL))
    }
}

/// Mechanism that orders overlapping fragments' accesses to the same
/// pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentSynchronization {
    #[default]
    #[serde(rename = "none")]
    NotSupported,
    #[serde(rename = "interlock-nv")]
    FragmentShaderInterlockNV,
    #[serde(rename = "ordering-intel")]
    FragmentShaderOrderingINTEL,
    #[serde(rename = "interlock-arb")]
    FragmentShaderInterlockARB,
    #[serde(rename = "rasterizer-order-views")]
    RasterizerOrderViews,
}

impl FragmentSynchronization {
    pub const ALL: [FragmentSynchronization; 5] = [
        FragmentSynchronization::NotSupported,
        FragmentSynchronization::FragmentShaderInterlockNV,
        FragmentSynchronization::FragmentShaderOrderingINTEL,
        FragmentSynchronization::FragmentShaderInterlockARB,
        FragmentSynchronization::RasterizerOrderViews,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FragmentSynchronization::NotSupported => "none",
            FragmentSynchronization::FragmentShaderInterlockNV => "interlock-nv",
            FragmentSynchronization::FragmentShaderOrderingINTEL => "ordering-intel",
            FragmentSynchronization::FragmentShaderInterlockARB => "interlock-arb",
            FragmentSynchronization::RasterizerOrderViews => "rasterizer-order-views",
        }
    }

    pub fn is_supported(self) -> bool {
        self != FragmentSynchronization::NotSupported
    }
}

impl fmt::Display for FragmentSynchronization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FragmentSynchronization {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FragmentSynchronization::ALL
            .into_iter()
            .find(|sync| sync.name() == s)
            .ok_or_else(|| {
                unknown_value("fragment synchronization", s, &FragmentSynchronization::ALL)
            })
    }
}

fn unknown_value<T: fmt::Display>(what: &str, value: &str, all: &[T]) -> Diagnostic {
    let names: Vec<String> = all.iter().map(|v| v.to_string()).collect();
    Diagnostic::error(format!("unknown {} '{}'", what, value), Span::dummy())
        .with_help(format!("expected one of: {}", names.join(", ")))
}

// ─── Options ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlsOptions {
    pub backend: PlsBackend,
    pub fragment_synchronization: FragmentSynchronization,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Resources {
    /// Color attachments plus PLS planes the context can bind at once.
    pub max_combined_draw_buffers_and_pixel_local_storage_planes: u32,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            max_combined_draw_buffers_and_pixel_local_storage_planes: 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileOptions {
    pub pls: PlsOptions,
    /// Route `packUnorm4x8` arguments through a `highp` temporary, for
    /// drivers that evaluate them at the argument's lower precision.
    pub pass_highp_to_pack_unorm_snorm_builtins: bool,
    pub resources: Resources,
    /// ESSL version of the shader, e.g. 310.
    pub shader_version: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pls: PlsOptions::default(),
            pass_highp_to_pack_unorm_snorm_builtins: false,
            resources: Resources::default(),
            shader_version: 310,
        }
    }
}

impl CompileOptions {
    pub fn with_backend(mut self, backend: PlsBackend) -> Self {
        self.pls.backend = backend;
        self
    }

    pub fn with_synchronization(mut self, sync: FragmentSynchronization) -> Self {
        self.pls.fragment_synchronization = sync;
        self
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read options '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse the flat TOML subset shown in the module docs. Keys that are
    /// absent keep their defaults.
    pub fn parse(content: &str, origin: &str) -> Result<Self, Diagnostic> {
        let err = |msg: String| Diagnostic::error(format!("{}: {}", origin, msg), Span::dummy());
        let mut options = CompileOptions::default();
        let mut section = String::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!("line {}: expected 'key = value'", index + 1)));
            };
            let key = key.trim();
            let value = value.trim();
            let unquoted = value.trim_matches('"');

            match (section.as_str(), key) {
                ("compile", "shader-version") => {
                    options.shader_version = value
                        .parse()
                        .map_err(|_| err(format!("invalid compile.shader-version: {}", value)))?;
                }
                ("compile", "pass-highp-to-pack-unorm-snorm-builtins") => {
                    options.pass_highp_to_pack_unorm_snorm_builtins =
                        value.parse().map_err(|_| {
                            err(format!(
                                "invalid compile.pass-highp-to-pack-unorm-snorm-builtins: {}",
                                value
                            ))
                        })?;
                }
                ("pls", "backend") => {
                    options.pls.backend = unquoted.parse().map_err(|d: Diagnostic| {
                        err(d.message.clone()).with_help(d.help.unwrap_or_default())
                    })?;
                }
                ("pls", "fragment-synchronization") => {
                    options.pls.fragment_synchronization =
                        unquoted.parse().map_err(|d: Diagnostic| {
                            err(d.message.clone()).with_help(d.help.unwrap_or_default())
                        })?;
                }
                ("resources", "max-combined-draw-buffers-and-pixel-local-storage-planes") => {
                    options
                        .resources
                        .max_combined_draw_buffers_and_pixel_local_storage_planes =
                        value.parse().map_err(|_| {
                            err(format!("invalid resources.{}: {}", key, value))
                        })?;
                }
                _ => {
                    return Err(err(format!("unknown option '{}.{}'", section, key)));
                }
            }
        }

        Ok(options)
    }
}
