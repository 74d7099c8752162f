//! Pixel local storage lowering.
//!
//! Replaces every `pixelLocalANGLE` declaration, `pixelLocalLoadANGLE` and
//! `pixelLocalStoreANGLE` with a backend the target can express natively:
//! coherent images accessed at the fragment's own pixel, or framebuffer
//! fetch through `inout` color attachments.
//!
//! Submodules:
//! - `format`   per-format data types and image backings
//! - `registry` binding point to backing store map
//! - `rewrite`  the traversal and backend dispatch
//! - `image`    image backend
//! - `fetch`    framebuffer-fetch backend

mod fetch;
pub mod format;
mod image;
pub mod registry;
mod rewrite;

#[cfg(test)]
mod tests;

use crate::config::CompileOptions;
use crate::diagnostic::Diagnostic;
use crate::ir::traverse::traverse_block;
use crate::ir::validate::{check_no_pixel_local, validate};
use crate::ir::{BasicType, BuiltInFn, Declaration, Expr, Shader, Stmt, SymbolTable, Type};
use crate::monomorphize::monomorphize_pls_arguments;
use crate::span::Span;

use rewrite::PlsRewriter;

/// Lower all pixel local storage in `shader`.
///
/// Shaders without a PLS declaration are left untouched. On success the
/// tree holds no PLS construct and passes [`validate`]; on failure the
/// shader and symbol table are unchanged.
#[tracing::instrument(
    skip_all,
    fields(
        backend = %options.pls.backend,
        sync = %options.pls.fragment_synchronization,
    )
)]
pub fn rewrite_pixel_local_storage(
    shader: &mut Shader,
    symbols: &mut SymbolTable,
    options: &CompileOptions,
) -> Result<(), Vec<Diagnostic>> {
    if !declares_pixel_local(shader, symbols) {
        tracing::debug!("no pixel local storage declared");
        return Ok(());
    }
    if shader.find_function(symbols, "main").is_none() {
        return Err(vec![missing_main()]);
    }

    // Lower a copy; on failure the caller keeps the tree it passed in.
    let mut lowered = shader.clone();
    let mut table = symbols.clone();
    lower_pixel_local_storage(&mut lowered, &mut table, options)?;
    *shader = lowered;
    *symbols = table;
    Ok(())
}

fn lower_pixel_local_storage(
    shader: &mut Shader,
    symbols: &mut SymbolTable,
    options: &CompileOptions,
) -> Result<(), Vec<Diagnostic>> {
    monomorphize_pls_arguments(shader, symbols)?;

    let mut rewriter = PlsRewriter::new(symbols, options);
    traverse_block(&mut rewriter, &mut shader.root);
    let PlsRewriter { ctx, backend } = rewriter;
    let setup = backend.setup_code(&ctx);
    let finalize = backend.finalize_code(&ctx);
    let pixel_coord = ctx.global_pixel_coord;

    check_no_pixel_local(shader, symbols)?;

    if backend.requires_early_fragment_tests() {
        shader.early_fragment_tests = true;
    }
    let pixel_coord_init = pixel_coord.map(|coord| {
        // coord = ivec2(floor(gl_FragCoord.xy))
        let frag_coord = Expr::symbol(symbols.builtin("gl_FragCoord"));
        Stmt::assign(
            Expr::symbol(coord),
            Expr::construct(
                Type::new(BasicType::Int, 2),
                vec![Expr::builtin(
                    BuiltInFn::Floor,
                    vec![Expr::swizzle(frag_coord, &[0, 1])],
                )],
            ),
        )
    });

    let main = shader
        .main_body_mut(symbols)
        .ok_or_else(|| vec![missing_main()])?;
    main.insert_all(0, setup);
    let end = main.len();
    main.insert_all(end, finalize);
    if let Some(init) = pixel_coord_init {
        main.insert(0, init);
    }

    tracing::debug!(planes = backend.plane_count(), "lowered pixel local storage");
    validate(shader, symbols, options.shader_version)
}

fn missing_main() -> Diagnostic {
    Diagnostic::error(
        "pixel local storage requires a 'main' function".to_string(),
        Span::dummy(),
    )
}

fn declares_pixel_local(shader: &Shader, symbols: &SymbolTable) -> bool {
    shader.root.stmts.iter().any(|stmt| match stmt {
        Stmt::Declaration(Declaration { var, .. }) => symbols.ty(*var).basic.is_pixel_local(),
        _ => false,
    })
}
