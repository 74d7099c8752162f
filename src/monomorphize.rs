//! Specialization of user functions that take pixel local storage
//! arguments.
//!
//! PLS handles are opaque and cannot be lowered as parameters: every call
//! must name the global plane it touches. For each distinct tuple of
//! global PLS uniforms a function is called with, a copy of the function is
//! made with those parameters removed and their uses bound to the uniforms.
//! The originals are removed once nothing calls them.

use std::collections::BTreeMap;

use crate::diagnostic::Diagnostic;
use crate::ir::traverse::{traverse_block, ParentBlock, Traverser, Visit};
use crate::ir::{
    Call, CallOp, Declaration, Expr, Function, FunctionId, Qualifier, Shader, Stmt, SymbolTable,
    VariableId,
};

/// Specialize every call passing PLS arguments, to a fixed point, then drop
/// the PLS-taking originals.
pub fn monomorphize_pls_arguments(
    shader: &mut Shader,
    symbols: &mut SymbolTable,
) -> Result<(), Vec<Diagnostic>> {
    let originals: BTreeMap<FunctionId, Function> = shader
        .functions()
        .filter(|f| f.params.iter().any(|&p| symbols.ty(p).basic.is_pixel_local()))
        .map(|f| (f.id, f.clone()))
        .collect();
    if originals.is_empty() {
        return Ok(());
    }

    // Specialize a copy; a failed call leaves the caller's tree as it was.
    let mut staged = shader.clone();
    let mut table = symbols.clone();
    specialize_calls(&mut staged, &mut table, &originals)?;
    *shader = staged;
    *symbols = table;
    Ok(())
}

fn specialize_calls(
    shader: &mut Shader,
    symbols: &mut SymbolTable,
    originals: &BTreeMap<FunctionId, Function>,
) -> Result<(), Vec<Diagnostic>> {
    let mut rewriter = CallRewriter {
        symbols,
        originals,
        specializations: BTreeMap::new(),
        created: Vec::new(),
        diagnostics: Vec::new(),
    };
    loop {
        for stmt in shader.root.stmts.iter_mut() {
            if let Stmt::Function(function) = stmt {
                if !originals.contains_key(&function.id) {
                    traverse_block(&mut rewriter, &mut function.body);
                }
            }
        }
        if !rewriter.diagnostics.is_empty() {
            return Err(rewriter.diagnostics);
        }
        if rewriter.created.is_empty() {
            break;
        }
        for (original, specialization) in rewriter.created.drain(..) {
            let position = shader
                .root
                .stmts
                .iter()
                .position(|stmt| matches!(stmt, Stmt::Function(f) if f.id == original))
                .unwrap_or(shader.root.stmts.len());
            shader.root.insert(position, Stmt::Function(specialization));
        }
    }

    tracing::debug!(
        functions = originals.len(),
        specializations = rewriter.specializations.len(),
        "specialized functions taking pixel local storage"
    );
    shader
        .root
        .stmts
        .retain(|stmt| !matches!(stmt, Stmt::Function(f) if originals.contains_key(&f.id)));
    Ok(())
}

/// (original function, PLS uniform bound to each PLS parameter)
type SpecializationKey = (FunctionId, Vec<VariableId>);

struct CallRewriter<'a> {
    symbols: &'a mut SymbolTable,
    originals: &'a BTreeMap<FunctionId, Function>,
    specializations: BTreeMap<SpecializationKey, FunctionId>,
    /// Specializations made during the current sweep, not yet in the tree.
    created: Vec<(FunctionId, Function)>,
    diagnostics: Vec<Diagnostic>,
}

impl CallRewriter<'_> {
    /// The global PLS uniform passed as `arg`, if it is one.
    fn pls_uniform(&self, arg: &Expr) -> Option<VariableId> {
        let var = arg.as_symbol()?;
        let ty = self.symbols.ty(var);
        (ty.basic.is_pixel_local() && ty.qualifier == Qualifier::Uniform).then_some(var)
    }

    fn specialize(&mut self, original: &Function, uniforms: &[VariableId]) -> Function {
        let name = format!(
            "_m{}_{}",
            self.specializations.len(),
            self.symbols.function_name(original.id)
        );
        let id = self.symbols.declare_function(&name);

        let mut renames = BTreeMap::new();
        let mut params = Vec::new();
        let mut uniforms = uniforms.iter();
        for &param in &original.params {
            if self.symbols.ty(param).basic.is_pixel_local() {
                if let Some(&uniform) = uniforms.next() {
                    renames.insert(param, uniform);
                }
            } else {
                let fresh = self.symbols.clone_variable(param);
                renames.insert(param, fresh);
                params.push(fresh);
            }
        }

        let mut body = original.body.clone();
        traverse_block(
            &mut Renamer {
                symbols: self.symbols,
                renames,
            },
            &mut body,
        );
        Function {
            id,
            return_type: original.return_type,
            params,
            body,
            span: original.span,
        }
    }
}

impl Traverser for CallRewriter<'_> {
    fn visit_call(&mut self, call: &mut Call, _parent: &mut ParentBlock) -> Visit<Expr> {
        let originals = self.originals;
        let original = match call.op {
            CallOp::Function(id) => match originals.get(&id) {
                Some(original) => original,
                None => return Visit::Recurse,
            },
            _ => return Visit::Recurse,
        };

        let mut uniforms = Vec::new();
        for (&param, arg) in original.params.iter().zip(&call.args) {
            if !self.symbols.ty(param).basic.is_pixel_local() {
                continue;
            }
            match self.pls_uniform(arg) {
                Some(uniform) => uniforms.push(uniform),
                None => {
                    self.diagnostics.push(
                        Diagnostic::error(
                            format!(
                                "argument '{}' of '{}' must be a global pixel local storage uniform",
                                self.symbols.name(param),
                                self.symbols.function_name(original.id)
                            ),
                            call.span,
                        )
                        .with_help(
                            "pass the pixelLocalANGLE uniform itself, not a copy or a parameter"
                                .to_string(),
                        ),
                    );
                    return Visit::Recurse;
                }
            }
        }

        let symbols = &*self.symbols;
        let args: Vec<Expr> = original
            .params
            .iter()
            .zip(call.args.drain(..))
            .filter(|(param, _)| !symbols.ty(**param).basic.is_pixel_local())
            .map(|(_, arg)| arg)
            .collect();

        let key = (original.id, uniforms);
        let id = match self.specializations.get(&key) {
            Some(&id) => id,
            None => {
                let specialization = self.specialize(original, &key.1);
                let id = specialization.id;
                tracing::trace!(
                    name = self.symbols.function_name(id),
                    "specializing '{}'",
                    self.symbols.function_name(original.id)
                );
                self.created.push((original.id, specialization));
                self.specializations.insert(key, id);
                id
            }
        };
        call.op = CallOp::Function(id);
        call.args = args;
        Visit::Recurse
    }
}

/// Rebinds parameters and re-mints locals inside a copied body.
struct Renamer<'a> {
    symbols: &'a mut SymbolTable,
    renames: BTreeMap<VariableId, VariableId>,
}

impl Traverser for Renamer<'_> {
    fn visit_declaration(&mut self, decl: &mut Declaration, _parent: &mut ParentBlock) -> Visit<Stmt> {
        let fresh = self.symbols.clone_variable(decl.var);
        self.renames.insert(decl.var, fresh);
        decl.var = fresh;
        Visit::Recurse
    }

    fn visit_symbol(&mut self, var: VariableId) -> Option<Expr> {
        self.renames.get(&var).map(|&v| Expr::symbol(v))
    }
}
