//! Pretty-printing for shader IR.
//!
//! This module is the single source of truth for turning the tree into
//! GLSL-like text. The output is deterministic: the same tree and symbol
//! table always print identically, which `Shader::fingerprint` relies on.
//! It is a debugging and testing view, not a code generator. Binary
//! expressions are fully parenthesized and no precision defaults are
//! inferred.

use super::{
    Block, Call, CallOp, ConstantValue, Declaration, Expr, Function, Shader, Stmt, SymbolTable,
    Type, UnaryOp, VariableId,
};

const INDENT: &str = "    ";

/// Print a whole shader.
pub fn print_shader(shader: &Shader, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    if shader.early_fragment_tests {
        out.push_str("layout(early_fragment_tests) in;\n");
    }
    for stmt in &shader.root.stmts {
        print_stmt(stmt, symbols, 0, &mut out);
    }
    out
}

/// Print one statement (with trailing newline) at the given depth.
pub fn format_stmt(stmt: &Stmt, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    print_stmt(stmt, symbols, 0, &mut out);
    out
}

// ─── Declarations & types ──────────────────────────────────────────

/// Format the qualified type and name of a variable, e.g.
/// `layout(binding=0, r32ui) coherent restrict uniform highp uimage2D pls`.
pub fn format_variable(id: VariableId, symbols: &SymbolTable) -> String {
    let var = symbols.get(id);
    let mut parts: Vec<String> = Vec::new();
    let layout = format_layout(&var.ty);
    if !layout.is_empty() {
        parts.push(layout);
    }
    let memory = &var.ty.memory;
    for (set, keyword) in [
        (memory.coherent, "coherent"),
        (memory.restrict, "restrict"),
        (memory.volatile, "volatile"),
        (memory.readonly, "readonly"),
        (memory.writeonly, "writeonly"),
    ] {
        if set {
            parts.push(keyword.to_string());
        }
    }
    if let Some(qualifier) = var.ty.qualifier.keyword() {
        parts.push(qualifier.to_string());
    }
    if let Some(precision) = var.ty.precision.keyword() {
        parts.push(precision.to_string());
    }
    parts.push(var.ty.glsl_name());
    let mut text = parts.join(" ");
    text.push(' ');
    text.push_str(&var.name);
    if let Some(n) = var.ty.array_size {
        text.push_str(&format!("[{}]", n));
    }
    text
}

fn format_layout(ty: &Type) -> String {
    let layout = &ty.layout;
    let mut items: Vec<String> = Vec::new();
    if let Some(location) = layout.location {
        items.push(format!("location={}", location));
    }
    if let Some(binding) = layout.binding {
        items.push(format!("binding={}", binding));
    }
    if let Some(format) = layout.image_internal_format.keyword() {
        items.push(format.to_string());
    }
    if layout.raster_ordered {
        items.push("rasterizer_ordered".to_string());
    }
    if layout.noncoherent {
        items.push("noncoherent".to_string());
    }
    if items.is_empty() {
        String::new()
    } else {
        format!("layout({})", items.join(", "))
    }
}

fn format_declaration(decl: &Declaration, symbols: &SymbolTable) -> String {
    let mut text = format_variable(decl.var, symbols);
    if let Some(init) = &decl.init {
        text.push_str(" = ");
        text.push_str(&format_expr(init, symbols));
    }
    text
}

// ─── Statements ────────────────────────────────────────────────────

fn print_stmt(stmt: &Stmt, symbols: &SymbolTable, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    match stmt {
        Stmt::Declaration(decl) => {
            out.push_str(&format!("{}{};\n", pad, format_declaration(decl, symbols)));
        }
        Stmt::Expr(expr) => {
            out.push_str(&format!("{}{};\n", pad, format_expr(expr, symbols)));
        }
        Stmt::Block(block) => print_block(block, symbols, depth, out),
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            out.push_str(&format!("{}if ({})\n", pad, format_expr(cond, symbols)));
            print_block(then_block, symbols, depth, out);
            if let Some(else_block) = else_block {
                out.push_str(&format!("{}else\n", pad));
                print_block(else_block, symbols, depth, out);
            }
        }
        Stmt::Loop {
            init,
            cond,
            step,
            body,
        } => {
            let header = match (init, step) {
                (None, None) => format!(
                    "while ({})",
                    cond.as_ref()
                        .map(|c| format_expr(c, symbols))
                        .unwrap_or_else(|| "true".to_string())
                ),
                _ => {
                    let init = init
                        .as_ref()
                        .map(|s| format_stmt(s, symbols).trim_end().to_string())
                        .unwrap_or_else(|| ";".to_string());
                    let cond = cond
                        .as_ref()
                        .map(|c| format_expr(c, symbols))
                        .unwrap_or_default();
                    let step = step
                        .as_ref()
                        .map(|s| format_expr(s, symbols))
                        .unwrap_or_default();
                    format!("for ({} {}; {})", init, cond, step)
                }
            };
            out.push_str(&format!("{}{}\n", pad, header));
            print_block(body, symbols, depth, out);
        }
        Stmt::Return(None) => out.push_str(&format!("{}return;\n", pad)),
        Stmt::Return(Some(expr)) => {
            out.push_str(&format!("{}return {};\n", pad, format_expr(expr, symbols)));
        }
        Stmt::Discard => out.push_str(&format!("{}discard;\n", pad)),
        Stmt::Break => out.push_str(&format!("{}break;\n", pad)),
        Stmt::Continue => out.push_str(&format!("{}continue;\n", pad)),
        Stmt::Function(function) => print_function(function, symbols, depth, out),
    }
}

fn print_block(block: &Block, symbols: &SymbolTable, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    out.push_str(&format!("{}{{\n", pad));
    for stmt in &block.stmts {
        print_stmt(stmt, symbols, depth + 1, out);
    }
    out.push_str(&format!("{}}}\n", pad));
}

fn print_function(function: &Function, symbols: &SymbolTable, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    let params: Vec<String> = function
        .params
        .iter()
        .map(|&p| format_variable(p, symbols))
        .collect();
    out.push_str(&format!(
        "{}{} {}({})\n",
        pad,
        function.return_type.glsl_name(),
        symbols.function_name(function.id),
        params.join(", ")
    ));
    print_block(&function.body, symbols, depth, out);
}

// ─── Expressions ───────────────────────────────────────────────────

const SWIZZLE_NAMES: [char; 4] = ['x', 'y', 'z', 'w'];

pub fn format_expr(expr: &Expr, symbols: &SymbolTable) -> String {
    match expr {
        Expr::Symbol(id) => symbols.name(*id).to_string(),
        Expr::Constant(value) => format_constant(value),
        Expr::Swizzle { operand, offsets } => {
            let fields: String = offsets
                .iter()
                .map(|&o| SWIZZLE_NAMES.get(o as usize).copied().unwrap_or('?'))
                .collect();
            format!("{}.{}", format_expr(operand, symbols), fields)
        }
        Expr::Unary { op, operand } => {
            let op = match op {
                UnaryOp::Negate => "-",
                UnaryOp::LogicalNot => "!",
                UnaryOp::BitNot => "~",
            };
            format!("({}{})", op, format_expr(operand, symbols))
        }
        Expr::Binary { op, lhs, rhs } => {
            let text = format!(
                "{} {} {}",
                format_expr(lhs, symbols),
                op.symbol(),
                format_expr(rhs, symbols)
            );
            if op.is_assignment() {
                text
            } else {
                format!("({})", text)
            }
        }
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => format!(
            "({} ? {} : {})",
            format_expr(cond, symbols),
            format_expr(then_expr, symbols),
            format_expr(else_expr, symbols)
        ),
        Expr::Index { base, index } => format!(
            "{}[{}]",
            format_expr(base, symbols),
            format_expr(index, symbols)
        ),
        Expr::Call(call) => format_call(call, symbols),
    }
}

fn format_call(call: &Call, symbols: &SymbolTable) -> String {
    let name = match &call.op {
        CallOp::BuiltIn(func) => func.name().to_string(),
        CallOp::Function(id) => symbols.function_name(*id).to_string(),
        CallOp::Construct(ty) => ty.glsl_name(),
        CallOp::PixelLocalLoad => "pixelLocalLoadANGLE".to_string(),
        CallOp::PixelLocalStore => "pixelLocalStoreANGLE".to_string(),
    };
    let args: Vec<String> = call.args.iter().map(|a| format_expr(a, symbols)).collect();
    format!("{}({})", name, args.join(", "))
}

pub fn format_constant(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Float(v) => format!("{:?}", v),
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::UInt(v) => format!("{}u", v),
        ConstantValue::Bool(v) => v.to_string(),
    }
}
