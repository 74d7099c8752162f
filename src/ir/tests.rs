use super::builder::ShaderBuilder;
use super::display::{format_expr, print_shader};
use super::eval::{ivec4, vec4, Interpreter, Scalar};
use super::traverse::{traverse_block, ParentBlock, Traverser, Visit};
use super::validate::{check_no_pixel_local, validate};
use super::*;

fn out_color(b: &mut ShaderBuilder) -> VariableId {
    b.output("color", Type::vec4().with_precision(Precision::Medium), Some(0))
}

// ─── Types & symbols ───────────────────────────────────────────────

#[test]
fn test_glsl_names() {
    assert_eq!(Type::vec4().glsl_name(), "vec4");
    assert_eq!(Type::new(BasicType::Int, 2).glsl_name(), "ivec2");
    assert_eq!(Type::scalar(BasicType::UInt).glsl_name(), "uint");
    assert_eq!(Type::scalar(BasicType::IPixelLocal).glsl_name(), "ipixelLocalANGLE");
    assert_eq!(
        format!("{}", Type::scalar(BasicType::Float).with_array_size(3)),
        "float[3]"
    );
}

#[test]
fn test_temporaries_are_numbered() {
    let mut symbols = SymbolTable::new();
    let a = symbols.create_temp(Type::vec4());
    let b = symbols.create_temp(Type::ivec4());
    assert_eq!(symbols.name(a), "_t0");
    assert_eq!(symbols.name(b), "_t1");
    assert_eq!(symbols.get(b).kind, SymbolKind::Temp);
}

#[test]
fn test_replacement_keeps_name() {
    let mut symbols = SymbolTable::new();
    let original = symbols.declare("pls", Type::scalar(BasicType::PixelLocal));
    let replacement = symbols.create_replacement(original, Type::vec4());
    assert_ne!(original, replacement);
    assert_eq!(symbols.name(replacement), "pls");
    assert_eq!(symbols.ty(replacement).basic, BasicType::Float);
}

#[test]
#[should_panic(expected = "internal error")]
fn test_unknown_builtin_panics() {
    SymbolTable::new().builtin("gl_Nonexistent");
}

// ─── Display ───────────────────────────────────────────────────────

#[test]
fn test_print_simple_shader() {
    let mut b = ShaderBuilder::new();
    let color = out_color(&mut b);
    b.main(vec![Stmt::assign(
        Expr::symbol(color),
        Expr::construct(Type::vec4(), vec![Expr::float(1.0)]),
    )]);
    let (shader, symbols) = b.finish();
    assert_eq!(
        print_shader(&shader, &symbols),
        "layout(location=0) out mediump vec4 color;\nvoid main()\n{\n    color = vec4(1.0);\n}\n"
    );
}

#[test]
fn test_print_expressions() {
    let mut symbols = SymbolTable::new();
    let data = symbols.declare("data", Type::ivec4());
    let expr = Expr::binary(
        BinaryOp::ShiftRight,
        Expr::binary(
            BinaryOp::ShiftLeft,
            Expr::swizzle(Expr::symbol(data), &[0, 0, 0, 0]),
            Expr::construct(
                Type::uvec4(),
                vec![Expr::uint(24), Expr::uint(16), Expr::uint(8), Expr::uint(0)],
            ),
        ),
        Expr::uint(24),
    );
    assert_eq!(
        format_expr(&expr, &symbols),
        "((data.xxxx << uvec4(24u, 16u, 8u, 0u)) >> 24u)"
    );
}

#[test]
fn test_fingerprint_is_content_hash() {
    let build = |value: f32| {
        let mut b = ShaderBuilder::new();
        let color = out_color(&mut b);
        b.main(vec![Stmt::assign(Expr::symbol(color), Expr::construct(Type::vec4(), vec![Expr::float(value)]))]);
        b.finish()
    };
    let (a, sa) = build(0.5);
    let (b, sb) = build(0.5);
    let (c, sc) = build(0.25);
    assert_eq!(a.fingerprint(&sa), b.fingerprint(&sb));
    assert_ne!(a.fingerprint(&sa), c.fingerprint(&sc));
}

// ─── Traversal ─────────────────────────────────────────────────────

/// Replaces `floor(x)` with `x` and brackets the statement with markers.
struct FloorStripper {
    before: VariableId,
    after: VariableId,
}

impl Traverser for FloorStripper {
    fn visit_call(&mut self, call: &mut Call, parent: &mut ParentBlock) -> Visit<Expr> {
        if call.op != CallOp::BuiltIn(BuiltInFn::Floor) {
            return Visit::Recurse;
        }
        parent.insert_around(
            vec![Stmt::assign(Expr::symbol(self.before), Expr::float(1.0))],
            vec![Stmt::assign(Expr::symbol(self.after), Expr::float(2.0))],
        );
        Visit::Replace(call.args.remove(0))
    }
}

#[test]
fn test_traversal_splices_insertions_into_enclosing_block() {
    let mut symbols = SymbolTable::new();
    let x = symbols.declare("x", Type::scalar(BasicType::Float));
    let before = symbols.declare("before", Type::scalar(BasicType::Float));
    let after = symbols.declare("after", Type::scalar(BasicType::Float));
    let nested = Stmt::If {
        cond: Expr::Constant(ConstantValue::Bool(true)),
        then_block: Block::new(vec![Stmt::assign(
            Expr::symbol(x),
            Expr::builtin(BuiltInFn::Floor, vec![Expr::symbol(x)]),
        )]),
        else_block: None,
    };
    let mut block = Block::new(vec![Stmt::Discard, nested]);
    traverse_block(&mut FloorStripper { before, after }, &mut block);

    assert_eq!(block.len(), 2, "insertions belong to the inner block");
    let Stmt::If { then_block, .. } = &block.stmts[1] else {
        panic!("expected if");
    };
    let printed: Vec<String> = then_block
        .stmts
        .iter()
        .map(|s| display::format_stmt(s, &symbols))
        .collect();
    assert_eq!(printed, vec!["before = 1.0;\n", "x = x;\n", "after = 2.0;\n"]);
}

struct Renamer {
    from: VariableId,
    to: VariableId,
}

impl Traverser for Renamer {
    fn visit_symbol(&mut self, var: VariableId) -> Option<Expr> {
        (var == self.from).then(|| Expr::symbol(self.to))
    }
}

#[test]
fn test_symbol_substitution_reaches_loops_and_returns() {
    let mut symbols = SymbolTable::new();
    let a = symbols.declare("a", Type::scalar(BasicType::Int));
    let b = symbols.declare("b", Type::scalar(BasicType::Int));
    let mut block = Block::new(vec![
        Stmt::Loop {
            init: None,
            cond: Some(Expr::binary(BinaryOp::Less, Expr::symbol(a), Expr::int(3))),
            step: None,
            body: Block::new(vec![Stmt::Expr(Expr::binary(
                BinaryOp::AddAssign,
                Expr::symbol(a),
                Expr::int(1),
            ))]),
        },
        Stmt::Return(Some(Expr::symbol(a))),
    ]);
    traverse_block(&mut Renamer { from: a, to: b }, &mut block);
    let printed: String = block
        .stmts
        .iter()
        .map(|s| display::format_stmt(s, &symbols))
        .collect();
    assert_eq!(printed, "while ((b < 3))\n{\n    b += 1;\n}\nreturn b;\n");
}

// ─── Validation ────────────────────────────────────────────────────

#[test]
fn test_validate_accepts_well_formed_shader() {
    let mut b = ShaderBuilder::new();
    let color = out_color(&mut b);
    let local = b.local("v", Type::vec4());
    b.main(vec![
        Stmt::declare_init(local, Expr::construct(Type::vec4(), vec![Expr::float(0.0)])),
        Stmt::assign(Expr::symbol(color), Expr::symbol(local)),
    ]);
    let (shader, symbols) = b.finish();
    assert!(validate(&shader, &symbols, 310).is_ok());
}

#[test]
fn test_validate_rejects_use_before_declaration() {
    let mut b = ShaderBuilder::new();
    let color = out_color(&mut b);
    let local = b.local("v", Type::vec4());
    b.main(vec![
        Stmt::assign(Expr::symbol(color), Expr::symbol(local)),
        Stmt::declare(local),
    ]);
    let (shader, symbols) = b.finish();
    let errors = validate(&shader, &symbols, 310).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("undeclared variable 'v'"));
}

#[test]
fn test_validate_rejects_out_of_scope_use() {
    let mut b = ShaderBuilder::new();
    let color = out_color(&mut b);
    let inner = b.local("inner", Type::vec4());
    b.main(vec![
        Stmt::Block(Block::new(vec![Stmt::declare(inner)])),
        Stmt::assign(Expr::symbol(color), Expr::symbol(inner)),
    ]);
    let (shader, symbols) = b.finish();
    assert!(validate(&shader, &symbols, 310).is_err());
}

#[test]
fn test_validate_rejects_duplicate_declaration() {
    let mut b = ShaderBuilder::new();
    let local = b.local("v", Type::vec4());
    b.main(vec![Stmt::declare(local), Stmt::Block(Block::new(vec![Stmt::declare(local)]))]);
    let (shader, symbols) = b.finish();
    let errors = validate(&shader, &symbols, 310).unwrap_err();
    assert!(errors[0].message.contains("declared more than once"));
}

#[test]
fn test_validate_rejects_shared_output_location() {
    let mut b = ShaderBuilder::new();
    b.output("a", Type::vec4(), None);
    b.output("b", Type::vec4(), Some(0));
    b.main(vec![]);
    let (shader, symbols) = b.finish();
    let errors = validate(&shader, &symbols, 310).unwrap_err();
    assert!(errors[0].message.contains("share location 0"));
}

#[test]
fn test_validate_output_locations_near_limit() {
    let mut b = ShaderBuilder::new();
    b.output("last", Type::vec4().with_array_size(2), Some(u32::MAX - 1));
    b.output("low", Type::vec4(), Some(u32::MAX - 3));
    b.main(vec![]);
    let (shader, symbols) = b.finish();
    assert!(validate(&shader, &symbols, 310).is_ok());
}

#[test]
fn test_validate_checks_builtin_version() {
    let mut b = ShaderBuilder::new();
    let packed = b.local("packed", Type::scalar(BasicType::UInt));
    b.main(vec![Stmt::declare_init(
        packed,
        Expr::builtin(
            BuiltInFn::PackUnorm4x8,
            vec![Expr::construct(Type::vec4(), vec![Expr::float(0.0)])],
        ),
    )]);
    let (shader, symbols) = b.finish();
    assert!(validate(&shader, &symbols, 310).is_ok());
    let errors = validate(&shader, &symbols, 300).unwrap_err();
    assert!(errors[0].message.contains("packUnorm4x8"));
}

#[test]
fn test_validate_rejects_call_before_definition() {
    let mut b = ShaderBuilder::new();
    let helper = b.declare_function("helper");
    b.main(vec![Stmt::Expr(Expr::call(CallOp::Function(helper), vec![]))]);
    b.define(helper, Type::void(), vec![], vec![]);
    let (shader, symbols) = b.finish();
    let errors = validate(&shader, &symbols, 310).unwrap_err();
    assert!(errors[0].message.contains("'helper' before its definition"));
}

#[test]
fn test_pixel_local_remnants_are_reported() {
    let mut b = ShaderBuilder::new();
    let pls = b.pixel_local("pls", ImageInternalFormat::Rgba8, 0, Precision::Medium);
    let color = out_color(&mut b);
    b.main(vec![Stmt::assign(
        Expr::symbol(color),
        builder::pls_load(pls),
    )]);
    let (shader, symbols) = b.finish();
    let errors = check_no_pixel_local(&shader, &symbols).unwrap_err();
    // The declaration, the load call and its operand.
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|d| d.is_error()));
}

// ─── Evaluation ────────────────────────────────────────────────────

#[test]
fn test_eval_signed_byte_unpack() {
    let mut symbols = SymbolTable::new();
    let data = symbols.declare("data", Type::ivec4());
    let shader = Shader::default();
    let mut interp = Interpreter::new(&shader, &symbols);
    // Bytes, low to high: -3, 5, 127, -128.
    interp.set(data, ivec4(0x807F_05FD_u32 as i32, 0, 0, 1));
    let unpack = Expr::binary(
        BinaryOp::ShiftRight,
        Expr::binary(
            BinaryOp::ShiftLeft,
            Expr::swizzle(Expr::symbol(data), &[0, 0, 0, 0]),
            Expr::construct(
                Type::uvec4(),
                vec![Expr::uint(24), Expr::uint(16), Expr::uint(8), Expr::uint(0)],
            ),
        ),
        Expr::uint(24),
    );
    assert_eq!(interp.eval_expr(&unpack).unwrap(), ivec4(-3, 5, 127, -128));
}

#[test]
fn test_eval_pack_unorm() {
    let symbols = SymbolTable::new();
    let shader = Shader::default();
    let mut interp = Interpreter::new(&shader, &symbols);
    let pack = Expr::builtin(
        BuiltInFn::PackUnorm4x8,
        vec![Expr::construct(
            Type::vec4(),
            vec![Expr::float(0.0), Expr::float(1.0), Expr::float(0.5), Expr::float(0.25)],
        )],
    );
    let packed = interp.eval_expr(&pack).unwrap();
    assert_eq!(packed, vec![Scalar::UInt(0x4080_FF00)]);

    let unpack = Expr::builtin(BuiltInFn::UnpackUnorm4x8, vec![Expr::uint(0x4080_FF00)]);
    let unpacked = interp.eval_expr(&unpack).unwrap();
    assert_eq!(unpacked, vec4(0.0, 1.0, 128.0 / 255.0, 64.0 / 255.0));
}

#[test]
fn test_eval_swizzle_store_and_clamp() {
    let mut symbols = SymbolTable::new();
    let v = symbols.declare("v", Type::ivec4());
    let shader = Shader::default();
    let mut interp = Interpreter::new(&shader, &symbols);
    interp.set(v, ivec4(300, -300, 7, 0));
    let clamp = Expr::assign(
        Expr::symbol(v),
        Expr::builtin(
            BuiltInFn::Clamp,
            vec![Expr::symbol(v), Expr::int(-128), Expr::int(127)],
        ),
    );
    interp.eval_expr(&clamp).unwrap();
    let store = Expr::assign(Expr::swizzle(Expr::symbol(v), &[3, 2]), Expr::int(9));
    interp.eval_expr(&store).unwrap();
    assert_eq!(interp.get(v), Some(&ivec4(127, -128, 9, 9)));
}

#[test]
fn test_eval_runs_main_and_user_functions() {
    let mut b = ShaderBuilder::new();
    let color = out_color(&mut b);
    let param = b.local("x", Type::scalar(BasicType::Float).with_qualifier(Qualifier::ParamIn));
    let double = b.function(
        "double",
        Type::scalar(BasicType::Float),
        vec![param],
        vec![Stmt::Return(Some(Expr::binary(
            BinaryOp::Mul,
            Expr::symbol(param),
            Expr::float(2.0),
        )))],
    );
    b.main(vec![Stmt::assign(
        Expr::symbol(color),
        Expr::construct(
            Type::vec4(),
            vec![Expr::call(CallOp::Function(double), vec![Expr::float(0.25)])],
        ),
    )]);
    let (shader, symbols) = b.finish();
    let mut interp = Interpreter::new(&shader, &symbols);
    interp.run_main().unwrap();
    assert_eq!(interp.get(color), Some(&vec4(0.5, 0.5, 0.5, 0.5)));
}
