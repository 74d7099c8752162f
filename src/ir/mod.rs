//! Shader IR: a fully typed, AST-shaped fragment shader tree.
//!
//! The tree is what the front end hands to the lowering passes: a root
//! block of global declarations and function definitions. Every variable
//! and function node refers to an identity owned by the [`SymbolTable`];
//! the tree itself only stores ids.
//!
//! Submodules:
//! - `builder`  hand assembly of trees for drivers and tests
//! - `types`    basic types, qualifiers, layout
//! - `symbols`  variable and function identities
//! - `traverse` rewriting traversal with parent-block insertions
//! - `validate` structural checks run after a pass
//! - `display`  deterministic GLSL-like printer
//! - `eval`     reference interpreter for generated code

pub mod builder;
pub mod display;
pub mod eval;
pub mod symbols;
pub mod traverse;
pub mod types;
pub mod validate;

#[cfg(test)]
mod tests;

use crate::span::Span;

pub use symbols::{FunctionId, SymbolKind, SymbolTable, Variable, VariableId};
pub use types::{
    BasicType, ImageInternalFormat, LayoutQualifier, MemoryQualifier, Precision, Qualifier, Type,
};

// ─── Expressions ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstantValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    Less,
    Greater,
    Assign,
    AddAssign,
    BitAndAssign,
    BitOrAssign,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::BitAndAssign => "&=",
            BinaryOp::BitOrAssign => "|=",
        }
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::BitAndAssign
                | BinaryOp::BitOrAssign
        )
    }

    /// The arithmetic operator a compound assignment applies.
    pub fn compound_operator(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::BitAndAssign => Some(BinaryOp::BitAnd),
            BinaryOp::BitOrAssign => Some(BinaryOp::BitOr),
            _ => None,
        }
    }
}

/// Built-in functions the lowering passes emit or the front end may leave
/// in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltInFn {
    Floor,
    Min,
    Max,
    Clamp,
    PackUnorm4x8,
    UnpackUnorm4x8,
    ImageLoad,
    ImageStore,
    MemoryBarrierImage,
    BeginInvocationInterlockNV,
    EndInvocationInterlockNV,
    BeginFragmentShaderOrderingINTEL,
    BeginInvocationInterlockARB,
    EndInvocationInterlockARB,
}

impl BuiltInFn {
    pub fn name(self) -> &'static str {
        match self {
            BuiltInFn::Floor => "floor",
            BuiltInFn::Min => "min",
            BuiltInFn::Max => "max",
            BuiltInFn::Clamp => "clamp",
            BuiltInFn::PackUnorm4x8 => "packUnorm4x8",
            BuiltInFn::UnpackUnorm4x8 => "unpackUnorm4x8",
            BuiltInFn::ImageLoad => "imageLoad",
            BuiltInFn::ImageStore => "imageStore",
            BuiltInFn::MemoryBarrierImage => "memoryBarrierImage",
            BuiltInFn::BeginInvocationInterlockNV => "beginInvocationInterlockNV",
            BuiltInFn::EndInvocationInterlockNV => "endInvocationInterlockNV",
            BuiltInFn::BeginFragmentShaderOrderingINTEL => "beginFragmentShaderOrderingINTEL",
            BuiltInFn::BeginInvocationInterlockARB => "beginInvocationInterlockARB",
            BuiltInFn::EndInvocationInterlockARB => "endInvocationInterlockARB",
        }
    }

    /// Lowest ESSL version exposing the function. Internal backend built-ins
    /// (the fragment synchronization intrinsics) are available at any
    /// version.
    pub fn min_shader_version(self) -> u32 {
        match self {
            BuiltInFn::Floor | BuiltInFn::Min | BuiltInFn::Max | BuiltInFn::Clamp => 100,
            BuiltInFn::PackUnorm4x8
            | BuiltInFn::UnpackUnorm4x8
            | BuiltInFn::ImageLoad
            | BuiltInFn::ImageStore
            | BuiltInFn::MemoryBarrierImage => 310,
            BuiltInFn::BeginInvocationInterlockNV
            | BuiltInFn::EndInvocationInterlockNV
            | BuiltInFn::BeginFragmentShaderOrderingINTEL
            | BuiltInFn::BeginInvocationInterlockARB
            | BuiltInFn::EndInvocationInterlockARB => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CallOp {
    BuiltIn(BuiltInFn),
    Function(FunctionId),
    /// Type constructor, e.g. `uvec4(x)`.
    Construct(Type),
    /// `pixelLocalLoadANGLE(pls)`
    PixelLocalLoad,
    /// `pixelLocalStoreANGLE(pls, value)`
    PixelLocalStore,
}

impl CallOp {
    pub fn is_pixel_local(&self) -> bool {
        matches!(self, CallOp::PixelLocalLoad | CallOp::PixelLocalStore)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub op: CallOp,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Symbol(VariableId),
    Constant(ConstantValue),
    Swizzle {
        operand: Box<Expr>,
        offsets: Vec<u8>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call(Call),
}

impl Expr {
    pub fn symbol(id: VariableId) -> Expr {
        Expr::Symbol(id)
    }

    pub fn float(value: f32) -> Expr {
        Expr::Constant(ConstantValue::Float(value))
    }

    pub fn int(value: i32) -> Expr {
        Expr::Constant(ConstantValue::Int(value))
    }

    pub fn uint(value: u32) -> Expr {
        Expr::Constant(ConstantValue::UInt(value))
    }

    pub fn swizzle(operand: Expr, offsets: &[u8]) -> Expr {
        debug_assert!(!offsets.is_empty() && offsets.len() <= 4);
        Expr::Swizzle {
            operand: Box::new(operand),
            offsets: offsets.to_vec(),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::binary(BinaryOp::Assign, target, value)
    }

    pub fn call(op: CallOp, args: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            op,
            args,
            span: Span::dummy(),
        })
    }

    pub fn builtin(func: BuiltInFn, args: Vec<Expr>) -> Expr {
        Expr::call(CallOp::BuiltIn(func), args)
    }

    pub fn construct(ty: Type, args: Vec<Expr>) -> Expr {
        Expr::call(CallOp::Construct(ty.unqualified()), args)
    }

    pub fn as_symbol(&self) -> Option<VariableId> {
        match self {
            Expr::Symbol(id) => Some(*id),
            _ => None,
        }
    }
}

// ─── Statements ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub var: VariableId,
    pub init: Option<Expr>,
    pub span: Span,
}

impl Declaration {
    pub fn new(var: VariableId) -> Self {
        Self {
            var,
            init: None,
            span: Span::dummy(),
        }
    }

    pub fn with_init(var: VariableId, init: Expr) -> Self {
        Self {
            var,
            init: Some(init),
            span: Span::dummy(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: FunctionId,
    pub return_type: Type,
    pub params: Vec<VariableId>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Declaration(Declaration),
    Expr(Expr),
    Block(Block),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `for (init; cond; step) body`; a `while` loop has no init or step.
    Loop {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Block,
    },
    Return(Option<Expr>),
    Discard,
    Break,
    Continue,
    Function(Function),
}

impl Stmt {
    pub fn declare(var: VariableId) -> Stmt {
        Stmt::Declaration(Declaration::new(var))
    }

    pub fn declare_init(var: VariableId, init: Expr) -> Stmt {
        Stmt::Declaration(Declaration::with_init(var, init))
    }

    pub fn assign(target: Expr, value: Expr) -> Stmt {
        Stmt::Expr(Expr::assign(target, value))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    pub fn insert(&mut self, position: usize, stmt: Stmt) {
        self.stmts.insert(position, stmt);
    }

    pub fn insert_all(&mut self, position: usize, stmts: Vec<Stmt>) {
        self.stmts.splice(position..position, stmts);
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

// ─── Shader ────────────────────────────────────────────────────────

/// A fragment shader: global declarations and function definitions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shader {
    pub root: Block,
    /// `layout(early_fragment_tests) in;`
    pub early_fragment_tests: bool,
}

impl Shader {
    pub fn new(root: Block) -> Self {
        Self {
            root,
            early_fragment_tests: false,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.root.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn find_function(&self, symbols: &SymbolTable, name: &str) -> Option<&Function> {
        self.functions()
            .find(|f| symbols.function_name(f.id) == name)
    }

    /// The body of `main`, if the shader defines one.
    pub fn main_body_mut(&mut self, symbols: &SymbolTable) -> Option<&mut Block> {
        self.root.stmts.iter_mut().find_map(|stmt| match stmt {
            Stmt::Function(f) if symbols.function_name(f.id) == "main" => Some(&mut f.body),
            _ => None,
        })
    }

    /// Content hash of the printed tree; identical trees (including
    /// identical minted names) hash identically.
    pub fn fingerprint(&self, symbols: &SymbolTable) -> blake3::Hash {
        blake3::hash(display::print_shader(self, symbols).as_bytes())
    }
}
