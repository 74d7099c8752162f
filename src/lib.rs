pub mod api;
pub mod config;
pub mod diagnostic;
pub mod ir;
pub mod monomorphize;
pub mod pls;
pub mod pool;
pub mod span;

// Re-export public API: `pls_lowering::lower()` etc.
pub use api::*;
pub use config::{CompileOptions, FragmentSynchronization, PlsBackend, PlsOptions, Resources};
pub use diagnostic::{render_diagnostics, Diagnostic, Severity};
pub use pls::rewrite_pixel_local_storage;
