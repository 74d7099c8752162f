//! Framebuffer-fetch backend: every plane becomes an `inout` color
//! attachment, read into a global access variable at the top of `main` and
//! written back at the bottom.

use std::collections::BTreeMap;

use crate::ir::traverse::{ParentBlock, Visit};
use crate::ir::{
    BasicType, Declaration, Expr, LayoutQualifier, Qualifier, Stmt, Type, VariableId,
};

use super::format::PlsFormat;
use super::registry::BackingStoreMap;
use super::rewrite::RewriteContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Attachment {
    /// Global temporary the shader body reads and writes.
    pub access: VariableId,
    /// The 4-component `inout` fragment output.
    pub fragment: VariableId,
    /// Components of the access variable (1 or 4).
    pub components: u8,
    pub data_type: BasicType,
}

impl Attachment {
    /// `var` narrowed to the access variable's width.
    fn narrowed(&self, var: VariableId) -> Expr {
        if self.components == 4 {
            Expr::symbol(var)
        } else {
            let offsets: Vec<u8> = (0..self.components).collect();
            Expr::swizzle(Expr::symbol(var), &offsets)
        }
    }

    /// The access variable widened to 4 components.
    fn expanded(&self) -> Expr {
        let access = Expr::symbol(self.access);
        if self.components == 4 {
            return access;
        }
        match self.data_type {
            // vec4(r, 0.0, 0.0, 1.0)
            BasicType::Float => Expr::construct(
                Type::vec4(),
                vec![access, Expr::float(0.0), Expr::float(0.0), Expr::float(1.0)],
            ),
            // uvec4(r, 0u, 0u, 1u)
            BasicType::UInt => Expr::construct(
                Type::uvec4(),
                vec![access, Expr::uint(0), Expr::uint(0), Expr::uint(1)],
            ),
            other => panic!("internal error: no single-channel {:?} plane format", other),
        }
    }
}

pub(crate) struct FetchBackend {
    attachments: BackingStoreMap<Attachment>,
    /// Fragment outputs re-declared with an explicit `location = 0`.
    rewritten_outputs: BTreeMap<VariableId, VariableId>,
}

impl FetchBackend {
    pub fn new() -> Self {
        Self {
            attachments: BackingStoreMap::new(),
            rewritten_outputs: BTreeMap::new(),
        }
    }

    pub fn plane_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn declare(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        pls: VariableId,
        parent: &mut ParentBlock,
    ) -> Stmt {
        let pls_ty = *ctx.symbols.ty(pls);
        let format = PlsFormat::of(&pls_ty);
        let binding = ctx.binding_of(pls);

        let access_ty = format
            .access_type(pls_ty.precision)
            .with_qualifier(Qualifier::Global);
        let access = ctx.symbols.create_temp(access_ty);

        // Planes are allocated from the last location backwards.
        let max_planes = ctx
            .options
            .resources
            .max_combined_draw_buffers_and_pixel_local_storage_planes;
        let location = match binding
            .checked_add(1)
            .and_then(|count| max_planes.checked_sub(count))
        {
            Some(location) => location,
            None => panic!(
                "internal error: binding {} exceeds {} combined draw buffers and planes",
                binding, max_planes
            ),
        };
        let fragment_ty = Type::new(format.data_type(), 4)
            .with_precision(pls_ty.precision)
            .with_qualifier(Qualifier::FragmentInOut)
            .with_layout(LayoutQualifier {
                location: Some(location),
                noncoherent: !ctx.options.pls.fragment_synchronization.is_supported(),
                ..LayoutQualifier::default()
            });
        let fragment = ctx.symbols.create_replacement(pls, fragment_ty);

        self.attachments.insert_new(
            binding,
            Attachment {
                access,
                fragment,
                components: format.component_count(),
                data_type: format.data_type(),
            },
        );
        parent.insert_before(Stmt::declare(fragment));
        Stmt::declare(access)
    }

    /// New outputs are added, so every existing output needs an explicit
    /// location. Unlocated ones are re-declared at location 0.
    pub fn visit_declaration(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        decl: &mut Declaration,
    ) -> Visit<Stmt> {
        let ty = *ctx.symbols.ty(decl.var);
        if !ty.qualifier.is_fragment_output() || ty.layout.location.is_some() {
            return Visit::Recurse;
        }
        let mut located = ty;
        located.layout.location = Some(0);
        let replacement = ctx.symbols.create_replacement(decl.var, located);
        self.rewritten_outputs.insert(decl.var, replacement);
        tracing::debug!(
            name = ctx.symbols.name(decl.var),
            "assigning location 0 to fragment output"
        );
        Visit::Replace(Stmt::Declaration(Declaration {
            var: replacement,
            init: decl.init.take(),
            span: decl.span,
        }))
    }

    pub fn visit_symbol(&self, var: VariableId) -> Option<Expr> {
        self.rewritten_outputs.get(&var).map(|&v| Expr::symbol(v))
    }

    pub fn load(&self, ctx: &mut RewriteContext<'_>, pls: VariableId) -> Expr {
        self.attachments.find(ctx.binding_of(pls)).expanded()
    }

    /// `access = value.<first N>`; no clamping, matching what the
    /// attachment format does on write-back.
    pub fn store(&self, ctx: &mut RewriteContext<'_>, pls: VariableId, value: VariableId) -> Expr {
        let attachment = self.attachments.find(ctx.binding_of(pls));
        Expr::assign(Expr::symbol(attachment.access), attachment.narrowed(value))
    }

    /// Preload every access variable from its attachment, in binding order.
    pub fn setup_code(&self) -> Vec<Stmt> {
        self.attachments
            .ordered_entries()
            .map(|(_, a)| Stmt::assign(Expr::symbol(a.access), a.narrowed(a.fragment)))
            .collect()
    }

    /// Write every access variable back, in binding order, so each
    /// attachment is written even if the body never stored to it.
    pub fn finalize_code(&self) -> Vec<Stmt> {
        self.attachments
            .ordered_entries()
            .map(|(_, a)| Stmt::assign(a.narrowed(a.fragment), Expr::symbol(a.access)))
            .collect()
    }
}
