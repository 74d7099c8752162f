//! The rewrite traversal: recognizes PLS declarations and PLS load/store
//! call sites and hands each one to the active backend.

use crate::config::{CompileOptions, PlsBackend};
use crate::ir::traverse::{traverse_stmt, ParentBlock, Traverser, Visit};
use crate::ir::{
    BasicType, Call, CallOp, Declaration, Expr, Precision, Qualifier, Stmt, SymbolTable, Type,
    VariableId,
};

use super::fetch::FetchBackend;
use super::format::data_type_of_pls_type;
use super::image::ImageBackend;

/// Per-job state shared by the traversal and the backends.
pub(crate) struct RewriteContext<'a> {
    pub symbols: &'a mut SymbolTable,
    pub options: &'a CompileOptions,
    /// `ivec2(floor(gl_FragCoord.xy))`, allocated on the first PLS
    /// declaration the image backend sees.
    pub global_pixel_coord: Option<VariableId>,
}

impl<'a> RewriteContext<'a> {
    pub fn new(symbols: &'a mut SymbolTable, options: &'a CompileOptions) -> Self {
        Self {
            symbols,
            options,
            global_pixel_coord: None,
        }
    }

    /// Binding point of a PLS variable.
    pub fn binding_of(&self, pls: VariableId) -> u32 {
        match self.symbols.ty(pls).layout.binding {
            Some(binding) => binding,
            None => panic!(
                "internal error: pixel local storage '{}' has no binding",
                self.symbols.name(pls)
            ),
        }
    }

    /// Declare the global pixel coordinate ahead of the statement being
    /// visited, unless that already happened.
    pub fn ensure_global_pixel_coord(&mut self, parent: &mut ParentBlock) -> VariableId {
        if let Some(coord) = self.global_pixel_coord {
            return coord;
        }
        let ty = Type::new(BasicType::Int, 2)
            .with_precision(Precision::High)
            .with_qualifier(Qualifier::Global);
        let coord = self.symbols.create_temp(ty);
        parent.insert_before(Stmt::declare(coord));
        self.global_pixel_coord = Some(coord);
        coord
    }

    pub fn pixel_coord(&self) -> VariableId {
        match self.global_pixel_coord {
            Some(coord) => coord,
            None => panic!("internal error: pixel coordinate used before any PLS declaration"),
        }
    }
}

/// The backend a job lowers to.
pub(crate) enum Backend {
    Image(ImageBackend),
    FramebufferFetch(FetchBackend),
}

impl Backend {
    pub fn for_options(options: &CompileOptions) -> Self {
        match options.pls.backend {
            PlsBackend::ImageStoreNativeFormats | PlsBackend::ImageStoreR32PackedFormats => {
                Backend::Image(ImageBackend::new())
            }
            PlsBackend::FramebufferFetch => Backend::FramebufferFetch(FetchBackend::new()),
        }
    }

    fn declare(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        pls: VariableId,
        parent: &mut ParentBlock,
    ) -> Stmt {
        match self {
            Backend::Image(image) => image.declare(ctx, pls, parent),
            Backend::FramebufferFetch(fetch) => fetch.declare(ctx, pls, parent),
        }
    }

    fn load(&mut self, ctx: &mut RewriteContext<'_>, pls: VariableId) -> Expr {
        match self {
            Backend::Image(image) => image.load(ctx, pls),
            Backend::FramebufferFetch(fetch) => fetch.load(ctx, pls),
        }
    }

    fn store(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        pls: VariableId,
        value: VariableId,
        parent: &mut ParentBlock,
    ) -> Expr {
        match self {
            Backend::Image(image) => image.store(ctx, pls, value, parent),
            Backend::FramebufferFetch(fetch) => fetch.store(ctx, pls, value),
        }
    }

    fn visit_declaration(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        decl: &mut Declaration,
    ) -> Visit<Stmt> {
        match self {
            Backend::Image(_) => Visit::Recurse,
            Backend::FramebufferFetch(fetch) => fetch.visit_declaration(ctx, decl),
        }
    }

    fn visit_symbol(&self, var: VariableId) -> Option<Expr> {
        match self {
            Backend::Image(_) => None,
            Backend::FramebufferFetch(fetch) => fetch.visit_symbol(var),
        }
    }

    /// Statements to run at the top of `main`, before any PLS access.
    pub fn setup_code(&self, ctx: &RewriteContext<'_>) -> Vec<Stmt> {
        match self {
            Backend::Image(image) => image.setup_code(ctx),
            Backend::FramebufferFetch(fetch) => fetch.setup_code(),
        }
    }

    /// Statements to run at the bottom of `main`, after all PLS access.
    pub fn finalize_code(&self, ctx: &RewriteContext<'_>) -> Vec<Stmt> {
        match self {
            Backend::Image(image) => image.finalize_code(ctx),
            Backend::FramebufferFetch(fetch) => fetch.finalize_code(),
        }
    }

    /// Image stores must not happen for fragments the depth/stencil test
    /// rejects.
    pub fn requires_early_fragment_tests(&self) -> bool {
        matches!(self, Backend::Image(_))
    }

    pub fn plane_count(&self) -> usize {
        match self {
            Backend::Image(image) => image.plane_count(),
            Backend::FramebufferFetch(fetch) => fetch.plane_count(),
        }
    }
}

/// Rewrites every PLS construct in the tree it traverses.
pub(crate) struct PlsRewriter<'a> {
    pub ctx: RewriteContext<'a>,
    pub backend: Backend,
}

impl<'a> PlsRewriter<'a> {
    pub fn new(symbols: &'a mut SymbolTable, options: &'a CompileOptions) -> Self {
        Self {
            ctx: RewriteContext::new(symbols, options),
            backend: Backend::for_options(options),
        }
    }

    fn pls_operand(&self, call: &Call) -> VariableId {
        match call.args.first().and_then(Expr::as_symbol) {
            Some(pls) if self.ctx.symbols.ty(pls).basic.is_pixel_local() => pls,
            _ => panic!("internal error: PLS call without a PLS operand"),
        }
    }
}

impl Traverser for PlsRewriter<'_> {
    fn visit_declaration(&mut self, decl: &mut Declaration, parent: &mut ParentBlock) -> Visit<Stmt> {
        let ty = *self.ctx.symbols.ty(decl.var);
        if !ty.basic.is_pixel_local() {
            return self.backend.visit_declaration(&mut self.ctx, decl);
        }
        if ty.is_array() {
            panic!("internal error: pixel local storage cannot be an array");
        }
        if ty.qualifier != Qualifier::Uniform {
            panic!("internal error: pixel local storage must be a uniform");
        }
        tracing::debug!(
            name = self.ctx.symbols.name(decl.var),
            binding = self.ctx.binding_of(decl.var),
            "lowering PLS declaration"
        );
        let mut replacement = self.backend.declare(&mut self.ctx, decl.var, parent);
        if let Stmt::Declaration(new_decl) = &mut replacement {
            new_decl.span = decl.span;
        }
        Visit::Replace(replacement)
    }

    fn visit_call(&mut self, call: &mut Call, parent: &mut ParentBlock) -> Visit<Expr> {
        match call.op {
            CallOp::PixelLocalLoad => {
                let pls = self.pls_operand(call);
                tracing::trace!(name = self.ctx.symbols.name(pls), "lowering PLS load");
                Visit::Replace(self.backend.load(&mut self.ctx, pls))
            }
            CallOp::PixelLocalStore => {
                let pls = self.pls_operand(call);
                tracing::trace!(name = self.ctx.symbols.name(pls), "lowering PLS store");
                let value = match call.args.pop() {
                    Some(value) if call.args.len() == 1 => value,
                    _ => panic!("internal error: pixelLocalStoreANGLE takes two arguments"),
                };
                // Hoist the value so any PLS load inside it is lowered, and
                // runs, before the barriers the store may emit. The store is
                // void and never an operand, so hoisting cannot escape a
                // short-circuit.
                let pls_ty = *self.ctx.symbols.ty(pls);
                let value_ty = Type::new(data_type_of_pls_type(pls_ty.basic), 4)
                    .with_precision(pls_ty.precision);
                let temp = self.ctx.symbols.create_temp(value_ty);
                let mut value_decl = Stmt::declare_init(temp, value);
                traverse_stmt(self, &mut value_decl, parent);
                parent.insert_before(value_decl);
                Visit::Replace(self.backend.store(&mut self.ctx, pls, temp, parent))
            }
            _ => Visit::Recurse,
        }
    }

    fn visit_symbol(&mut self, var: VariableId) -> Option<Expr> {
        self.backend.visit_symbol(var)
    }
}
