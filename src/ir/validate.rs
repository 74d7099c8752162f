//! Structural checks over a lowered shader.
//!
//! Passes do not trust themselves: after rewriting, the orchestrator runs
//! [`validate`] and turns any finding into a diagnostic instead of handing a
//! malformed tree to code generation.

use std::collections::{BTreeMap, BTreeSet};

use super::{Block, Call, CallOp, Declaration, Expr, Function, Shader, Stmt, SymbolTable};
use super::{FunctionId, VariableId};
use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Run every structural check:
/// - each non-built-in variable is declared before it is referenced, in an
///   enclosing scope, and declared exactly once in the whole tree;
/// - user functions are defined before they are called;
/// - no pixel local storage type or call remains;
/// - swizzle offsets address at most four components;
/// - no two fragment outputs share a location;
/// - every built-in function exists at `shader_version`.
pub fn validate(
    shader: &Shader,
    symbols: &SymbolTable,
    shader_version: u32,
) -> Result<(), Vec<Diagnostic>> {
    let mut validator = Validator::new(symbols, shader_version, true);
    validator.check_block(&shader.root);
    validator.finish()
}

/// Only the pixel local storage remnant check. Cheap enough to run right
/// after the rewrite, before setup code is injected.
pub fn check_no_pixel_local(shader: &Shader, symbols: &SymbolTable) -> Result<(), Vec<Diagnostic>> {
    let mut validator = Validator::new(symbols, u32::MAX, false);
    validator.check_block(&shader.root);
    validator.finish()
}

struct Validator<'a> {
    symbols: &'a SymbolTable,
    shader_version: u32,
    structural: bool,
    scopes: Vec<BTreeSet<VariableId>>,
    declared: BTreeSet<VariableId>,
    functions: BTreeSet<FunctionId>,
    output_locations: BTreeMap<u32, VariableId>,
    span: Span,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Validator<'a> {
    fn new(symbols: &'a SymbolTable, shader_version: u32, structural: bool) -> Self {
        Self {
            symbols,
            shader_version,
            structural,
            scopes: Vec::new(),
            declared: BTreeSet::new(),
            functions: BTreeSet::new(),
            output_locations: BTreeMap::new(),
            span: Span::dummy(),
            diagnostics: Vec::new(),
        }
    }

    fn finish(self) -> Result<(), Vec<Diagnostic>> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(self.diagnostics)
        }
    }

    fn error(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::error(message, self.span));
    }

    fn in_scope(&self, var: VariableId) -> bool {
        self.scopes.iter().any(|scope| scope.contains(&var))
    }

    fn declare(&mut self, var: VariableId) {
        if self.structural && !self.declared.insert(var) {
            let name = self.symbols.name(var).to_string();
            self.error(format!("variable '{}' is declared more than once", name));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(var);
        }
    }

    // ─── Statements ────────────────────────────────────────────────

    fn check_block(&mut self, block: &Block) {
        self.scopes.push(BTreeSet::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.check_declaration(decl),
            Stmt::Expr(expr) => self.check_expr(expr),
            Stmt::Block(block) => self.check_block(block),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_expr(cond);
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            Stmt::Loop {
                init,
                cond,
                step,
                body,
            } => {
                self.scopes.push(BTreeSet::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.check_block(body);
                self.scopes.pop();
            }
            Stmt::Return(Some(expr)) => self.check_expr(expr),
            Stmt::Return(None) | Stmt::Discard | Stmt::Break | Stmt::Continue => {}
            Stmt::Function(function) => self.check_function(function),
        }
    }

    fn check_function(&mut self, function: &Function) {
        self.span = function.span;
        self.functions.insert(function.id);
        self.scopes.push(BTreeSet::new());
        for &param in &function.params {
            if self.symbols.ty(param).basic.is_pixel_local() {
                let name = self.symbols.function_name(function.id).to_string();
                self.error(format!(
                    "function '{}' still takes a pixel local storage parameter",
                    name
                ));
            }
            self.declare(param);
        }
        // Parameters and the outermost body statements share one scope.
        for stmt in &function.body.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_declaration(&mut self, decl: &Declaration) {
        self.span = decl.span;
        if let Some(init) = &decl.init {
            self.check_expr(init);
        }
        let var = self.symbols.get(decl.var);
        if var.ty.basic.is_pixel_local() {
            let name = var.name.clone();
            self.error(format!(
                "pixel local storage variable '{}' survived lowering",
                name
            ));
        }
        let ty = var.ty;
        self.declare(decl.var);
        if self.structural && ty.qualifier.is_fragment_output() {
            // An output without a location is bound to location 0.
            let first = ty.layout.location.unwrap_or(0);
            for location in first..first.saturating_add(ty.array_size.unwrap_or(1)) {
                if let Some(&other) = self.output_locations.get(&location) {
                    let message = format!(
                        "fragment outputs '{}' and '{}' share location {}",
                        self.symbols.name(other),
                        self.symbols.name(decl.var),
                        location
                    );
                    self.error(message);
                } else {
                    self.output_locations.insert(location, decl.var);
                }
            }
        }
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Symbol(var) => self.check_symbol(*var),
            Expr::Constant(_) => {}
            Expr::Swizzle { operand, offsets } => {
                if self.structural && offsets.iter().any(|&offset| offset >= 4) {
                    self.error(format!("swizzle offsets {:?} out of range", offsets));
                }
                self.check_expr(operand);
            }
            Expr::Unary { operand, .. } => self.check_expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_expr(cond);
                self.check_expr(then_expr);
                self.check_expr(else_expr);
            }
            Expr::Index { base, index } => {
                self.check_expr(base);
                self.check_expr(index);
            }
            Expr::Call(call) => self.check_call(call),
        }
    }

    fn check_symbol(&mut self, var: VariableId) {
        let variable = self.symbols.get(var);
        if variable.ty.basic.is_pixel_local() {
            let name = variable.name.clone();
            self.error(format!(
                "reference to pixel local storage variable '{}' survived lowering",
                name
            ));
        }
        if self.structural && !self.symbols.is_builtin(var) && !self.in_scope(var) {
            let name = self.symbols.name(var).to_string();
            self.error(format!("use of undeclared variable '{}'", name));
        }
    }

    fn check_call(&mut self, call: &Call) {
        if !call.span.is_dummy() {
            self.span = call.span;
        }
        match &call.op {
            CallOp::PixelLocalLoad => {
                self.error("pixelLocalLoadANGLE call survived lowering".to_string());
            }
            CallOp::PixelLocalStore => {
                self.error("pixelLocalStoreANGLE call survived lowering".to_string());
            }
            CallOp::BuiltIn(func) if self.structural => {
                if func.min_shader_version() > self.shader_version {
                    self.error(format!(
                        "built-in '{}' requires shader version {} (have {})",
                        func.name(),
                        func.min_shader_version(),
                        self.shader_version
                    ));
                }
            }
            CallOp::Function(id) if self.structural => {
                if !self.functions.contains(id) {
                    let name = self.symbols.function_name(*id).to_string();
                    self.error(format!("call to function '{}' before its definition", name));
                }
            }
            _ => {}
        }
        for arg in &call.args {
            self.check_expr(arg);
        }
    }
}
