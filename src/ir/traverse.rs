//! Rewriting traversal over the shader tree.
//!
//! A [`Traverser`] sees declarations, calls and symbol references in
//! pre-order. Each hook may replace the node it is shown; a replaced node
//! is dropped and never recursed into. Hooks may also queue statements to
//! be spliced into the enclosing block immediately before or after the
//! statement currently being visited.
//!
//! Replacement is applied eagerly: every block's statement list is rebuilt
//! as it is walked, so the queued insertions land in the correct block no
//! matter how deeply the originating expression was nested. Statements
//! queued by a loop condition or step are moved into the loop body so they
//! still run once per iteration.

use super::{Block, Call, Declaration, Expr, Stmt, UnaryOp, VariableId};

/// Outcome of a traversal hook.
#[derive(Debug)]
pub enum Visit<T> {
    /// Keep the node and traverse its children.
    Recurse,
    /// Drop the node for this one; children of neither are traversed.
    Replace(T),
}

/// Statements queued around the statement being visited.
#[derive(Debug, Default)]
pub struct ParentBlock {
    before: Vec<Stmt>,
    after: Vec<Stmt>,
}

impl ParentBlock {
    /// Insert a statement immediately before the one being visited.
    pub fn insert_before(&mut self, stmt: Stmt) {
        self.before.push(stmt);
    }

    /// Insert statements around the one being visited. Later `after`
    /// insertions end up closer to the visited statement.
    pub fn insert_around(&mut self, before: Vec<Stmt>, after: Vec<Stmt>) {
        self.before.extend(before);
        let mut after = after;
        after.append(&mut self.after);
        self.after = after;
    }

    fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

pub trait Traverser {
    fn visit_declaration(&mut self, _decl: &mut Declaration, _parent: &mut ParentBlock) -> Visit<Stmt> {
        Visit::Recurse
    }

    fn visit_call(&mut self, _call: &mut Call, _parent: &mut ParentBlock) -> Visit<Expr> {
        Visit::Recurse
    }

    fn visit_symbol(&mut self, _var: VariableId) -> Option<Expr> {
        None
    }
}

/// Traverse every statement of `block`, splicing queued insertions.
pub fn traverse_block<T: Traverser + ?Sized>(traverser: &mut T, block: &mut Block) {
    let stmts = std::mem::take(&mut block.stmts);
    block.stmts.reserve(stmts.len());
    for mut stmt in stmts {
        let mut parent = ParentBlock::default();
        traverse_stmt(traverser, &mut stmt, &mut parent);
        block.stmts.append(&mut parent.before);
        block.stmts.push(stmt);
        block.stmts.append(&mut parent.after);
    }
}

/// Traverse one statement; insertions go to `parent`.
pub fn traverse_stmt<T: Traverser + ?Sized>(
    traverser: &mut T,
    stmt: &mut Stmt,
    parent: &mut ParentBlock,
) {
    match stmt {
        Stmt::Declaration(decl) => match traverser.visit_declaration(decl, parent) {
            Visit::Replace(replacement) => *stmt = replacement,
            Visit::Recurse => {
                if let Some(init) = &mut decl.init {
                    traverse_expr(traverser, init, parent);
                }
            }
        },
        Stmt::Expr(expr) => traverse_expr(traverser, expr, parent),
        Stmt::Block(block) => traverse_block(traverser, block),
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            traverse_expr(traverser, cond, parent);
            traverse_block(traverser, then_block);
            if let Some(else_block) = else_block {
                traverse_block(traverser, else_block);
            }
        }
        Stmt::Loop {
            init,
            cond,
            step,
            body,
        } => {
            if let Some(init) = init {
                traverse_stmt(traverser, init, parent);
            }
            // The condition and step run once per iteration; so must
            // anything queued around them.
            let mut cond_parent = ParentBlock::default();
            if let Some(cond) = cond {
                traverse_expr(traverser, cond, &mut cond_parent);
            }
            let mut step_parent = ParentBlock::default();
            if let Some(step) = step {
                traverse_expr(traverser, step, &mut step_parent);
            }
            traverse_block(traverser, body);
            if !step_parent.is_empty() {
                if let Some(step) = step.take() {
                    move_step_into_body(step, step_parent, body, parent);
                }
            }
            if !cond_parent.is_empty() {
                if let Some(cond) = cond.take() {
                    move_cond_into_body(cond, cond_parent, body);
                }
            }
        }
        Stmt::Return(Some(expr)) => traverse_expr(traverser, expr, parent),
        Stmt::Return(None) | Stmt::Discard | Stmt::Break | Stmt::Continue => {}
        // Parameters are not declarations; only the body is visited.
        Stmt::Function(function) => traverse_block(traverser, &mut function.body),
    }
}

/// Run a loop step that queued statements at the end of the body and in
/// front of every `continue` of this loop. Copies assign their temporaries;
/// the declarations move in front of the loop.
fn move_step_into_body(step: Expr, queued: ParentBlock, body: &mut Block, parent: &mut ParentBlock) {
    let mut tail = queued.before;
    tail.push(Stmt::Expr(step));
    tail.extend(queued.after);
    if has_continue(&body.stmts) {
        tail = tail
            .into_iter()
            .filter_map(|stmt| match stmt {
                Stmt::Declaration(Declaration { var, init, .. }) => {
                    parent.insert_before(Stmt::declare(var));
                    init.map(|init| Stmt::assign(Expr::symbol(var), init))
                }
                other => Some(other),
            })
            .collect();
        prefix_continues(&mut body.stmts, &tail);
    }
    body.stmts.extend(tail);
}

/// Test a loop condition that queued statements at the top of the body:
/// `if (!cond) break;`.
fn move_cond_into_body(cond: Expr, queued: ParentBlock, body: &mut Block) {
    let mut prologue = queued.before;
    prologue.push(Stmt::If {
        cond: Expr::Unary {
            op: UnaryOp::LogicalNot,
            operand: Box::new(cond),
        },
        then_block: Block::new(vec![Stmt::Break]),
        else_block: None,
    });
    prologue.extend(queued.after);
    body.insert_all(0, prologue);
}

/// Whether `stmts` continue the enclosing loop. Nested loops own their
/// `continue`s.
fn has_continue(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Continue => true,
        Stmt::Block(block) => has_continue(&block.stmts),
        Stmt::If {
            then_block,
            else_block,
            ..
        } => {
            has_continue(&then_block.stmts)
                || else_block
                    .as_ref()
                    .is_some_and(|block| has_continue(&block.stmts))
        }
        _ => false,
    })
}

fn prefix_continues(stmts: &mut [Stmt], tail: &[Stmt]) {
    for stmt in stmts {
        match stmt {
            Stmt::Continue => {
                let mut stmts = tail.to_vec();
                stmts.push(Stmt::Continue);
                *stmt = Stmt::Block(Block::new(stmts));
            }
            Stmt::Block(block) => prefix_continues(&mut block.stmts, tail),
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                prefix_continues(&mut then_block.stmts, tail);
                if let Some(block) = else_block {
                    prefix_continues(&mut block.stmts, tail);
                }
            }
            _ => {}
        }
    }
}

/// Traverse one expression; insertions go to `parent`.
pub fn traverse_expr<T: Traverser + ?Sized>(
    traverser: &mut T,
    expr: &mut Expr,
    parent: &mut ParentBlock,
) {
    match expr {
        Expr::Symbol(id) => {
            if let Some(replacement) = traverser.visit_symbol(*id) {
                *expr = replacement;
            }
        }
        Expr::Constant(_) => {}
        Expr::Swizzle { operand, .. } | Expr::Unary { operand, .. } => {
            traverse_expr(traverser, operand, parent);
        }
        Expr::Binary { lhs, rhs, .. } => {
            traverse_expr(traverser, lhs, parent);
            traverse_expr(traverser, rhs, parent);
        }
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            traverse_expr(traverser, cond, parent);
            traverse_expr(traverser, then_expr, parent);
            traverse_expr(traverser, else_expr, parent);
        }
        Expr::Index { base, index } => {
            traverse_expr(traverser, base, parent);
            traverse_expr(traverser, index, parent);
        }
        Expr::Call(call) => match traverser.visit_call(call, parent) {
            Visit::Replace(replacement) => *expr = replacement,
            Visit::Recurse => {
                for arg in &mut call.args {
                    traverse_expr(traverser, arg, parent);
                }
            }
        },
    }
}
