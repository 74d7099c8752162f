use super::*;
use crate::config::{FragmentSynchronization, PlsBackend};
use crate::ir::builder::{pls_load, pls_store, ShaderBuilder};
use crate::ir::display::{format_stmt, print_shader};
use crate::ir::eval::{ivec4, uvec4, vec4, Interpreter, Scalar, Value};
use crate::ir::{
    BinaryOp, Block, CallOp, ImageInternalFormat, LayoutQualifier, Precision, Qualifier,
    VariableId,
};

const IMAGE_BACKENDS: [PlsBackend; 2] = [
    PlsBackend::ImageStoreNativeFormats,
    PlsBackend::ImageStoreR32PackedFormats,
];

fn options(backend: PlsBackend) -> CompileOptions {
    CompileOptions::default().with_backend(backend)
}

/// A shader that stores `src` to plane `pls` and reads it back into
/// `result` within the same invocation.
struct RoundTrip {
    shader: Shader,
    symbols: SymbolTable,
    src: VariableId,
    result: VariableId,
}

fn round_trip(format: ImageInternalFormat, data: Type) -> RoundTrip {
    let mut b = ShaderBuilder::new();
    let pls = b.pixel_local("pls", format, 0, Precision::Medium);
    let src = b.global(
        "src",
        data.with_precision(Precision::High)
            .with_qualifier(Qualifier::Uniform),
    );
    let result = b.global(
        "result",
        data.with_precision(Precision::High)
            .with_qualifier(Qualifier::Global),
    );
    b.main(vec![
        pls_store(pls, Expr::symbol(src)),
        Stmt::assign(Expr::symbol(result), pls_load(pls)),
    ]);
    let (shader, symbols) = b.finish();
    RoundTrip {
        shader,
        symbols,
        src,
        result,
    }
}

impl RoundTrip {
    fn lower(mut self, options: &CompileOptions) -> Self {
        rewrite_pixel_local_storage(&mut self.shader, &mut self.symbols, options)
            .unwrap_or_else(|e| panic!("lowering failed: {:?}", e));
        self
    }

    fn run(&self, src: Value) -> Value {
        let mut interp = interpreter(&self.shader, &self.symbols);
        interp.set(self.src, src);
        interp.run_main().unwrap();
        interp.get(self.result).cloned().unwrap()
    }
}

fn interpreter<'a>(shader: &'a Shader, symbols: &'a SymbolTable) -> Interpreter<'a> {
    let mut interp = Interpreter::new(shader, symbols);
    interp.set(symbols.builtin("gl_FragCoord"), vec4(3.5, 7.5, 0.0, 1.0));
    interp
}

/// The last global declared under `name`.
fn global_named(shader: &Shader, symbols: &SymbolTable, name: &str) -> VariableId {
    shader
        .root
        .stmts
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Declaration(decl) if symbols.name(decl.var) == name => Some(decl.var),
            _ => None,
        })
        .last()
        .unwrap_or_else(|| panic!("no global named '{}'", name))
}

fn main_body<'a>(shader: &'a Shader, symbols: &SymbolTable) -> &'a Block {
    &shader.find_function(symbols, "main").unwrap().body
}

fn floats(value: &Value) -> Vec<f32> {
    value
        .iter()
        .map(|s| match s {
            Scalar::Float(x) => *x,
            other => panic!("expected float, got {:?}", other),
        })
        .collect()
}

// ─── Numeric round trips ───────────────────────────────────────────

#[test]
fn test_rgba8_round_trip_within_one_step() {
    let src = [0.0, 0.2, 0.5019, 1.0];
    for backend in PlsBackend::ALL {
        let lowered = round_trip(ImageInternalFormat::Rgba8, Type::vec4()).lower(&options(backend));
        let result = floats(&lowered.run(vec4(src[0], src[1], src[2], src[3])));
        for (got, want) in result.iter().zip(src) {
            assert!(
                (got - want).abs() <= 1.0 / 255.0 + 1e-6,
                "{}: {} vs {}",
                backend,
                got,
                want
            );
        }
    }
}

#[test]
fn test_rgba8i_round_trip_is_clamped_and_exact() {
    for backend in IMAGE_BACKENDS {
        let lowered = round_trip(ImageInternalFormat::Rgba8i, Type::ivec4()).lower(&options(backend));
        assert_eq!(
            lowered.run(ivec4(-200, -5, 100, 300)),
            ivec4(-128, -5, 100, 127),
            "{}",
            backend
        );
        assert_eq!(lowered.run(ivec4(-1, 0, 1, -128)), ivec4(-1, 0, 1, -128));
    }
}

#[test]
fn test_rgba8ui_round_trip_is_clamped_and_exact() {
    for backend in IMAGE_BACKENDS {
        let lowered =
            round_trip(ImageInternalFormat::Rgba8ui, Type::uvec4()).lower(&options(backend));
        assert_eq!(
            lowered.run(uvec4(0, 7, 255, 1000)),
            uvec4(0, 7, 255, 255),
            "{}",
            backend
        );
    }
}

#[test]
fn test_framebuffer_fetch_does_not_clamp() {
    let lowered = round_trip(ImageInternalFormat::Rgba8ui, Type::uvec4())
        .lower(&options(PlsBackend::FramebufferFetch));
    assert_eq!(lowered.run(uvec4(0, 7, 255, 1000)), uvec4(0, 7, 255, 1000));
    let printed = print_shader(&lowered.shader, &lowered.symbols);
    assert!(!printed.contains("min("));
}

#[test]
fn test_r32_formats_round_trip_first_component() {
    for backend in PlsBackend::ALL {
        let lowered = round_trip(ImageInternalFormat::R32f, Type::vec4()).lower(&options(backend));
        assert_eq!(lowered.run(vec4(0.75, 9.0, 9.0, 9.0)), vec4(0.75, 0.0, 0.0, 1.0));

        let lowered = round_trip(ImageInternalFormat::R32ui, Type::uvec4()).lower(&options(backend));
        assert_eq!(lowered.run(uvec4(70_000, 9, 9, 9)), uvec4(70_000, 0, 0, 1));
    }
}

#[test]
fn test_packed_load_unpacks_existing_texel() {
    let lowered = round_trip(ImageInternalFormat::Rgba8, Type::vec4())
        .lower(&options(PlsBackend::ImageStoreR32PackedFormats));
    let image = global_named(&lowered.shader, &lowered.symbols, "pls");
    assert_eq!(
        lowered.symbols.ty(image).layout.image_internal_format,
        ImageInternalFormat::R32ui
    );

    // Only the load half: read the seeded texel without storing first.
    let mut shader = lowered.shader.clone();
    let main = shader.main_body_mut(&lowered.symbols).unwrap();
    main.stmts.retain(|stmt| {
        !format_stmt(stmt, &lowered.symbols).contains("imageStore")
    });
    let mut interp = interpreter(&shader, &lowered.symbols);
    interp.set(lowered.src, vec4(0.0, 0.0, 0.0, 0.0));
    interp.set_image(image, uvec4(0x4080_FF00, 0, 0, 0)).unwrap();
    interp.run_main().unwrap();
    assert_eq!(
        interp.get(lowered.result),
        Some(&vec4(0.0, 1.0, 128.0 / 255.0, 64.0 / 255.0))
    );
}

#[test]
fn test_stored_value_is_evaluated_once() {
    for backend in PlsBackend::ALL {
        let mut b = ShaderBuilder::new();
        let pls = b.pixel_local("pls", ImageInternalFormat::Rgba8, 0, Precision::Medium);
        let calls = b.global(
            "calls",
            Type::scalar(BasicType::Int)
                .with_precision(Precision::High)
                .with_qualifier(Qualifier::Global),
        );
        let next = b.function(
            "next",
            Type::vec4().with_precision(Precision::Medium),
            Vec::new(),
            vec![
                Stmt::Expr(Expr::binary(
                    BinaryOp::AddAssign,
                    Expr::symbol(calls),
                    Expr::int(1),
                )),
                Stmt::Return(Some(Expr::construct(Type::vec4(), vec![Expr::float(0.5)]))),
            ],
        );
        b.main(vec![pls_store(
            pls,
            Expr::call(CallOp::Function(next), Vec::new()),
        )]);
        let (mut shader, mut symbols) = b.finish();
        rewrite_pixel_local_storage(&mut shader, &mut symbols, &options(backend)).unwrap();

        let mut interp = interpreter(&shader, &symbols);
        interp.run_main().unwrap();
        assert_eq!(interp.get(calls), Some(&vec![Scalar::Int(1)]), "{}", backend);
    }
}

#[test]
fn test_load_inside_stored_value_runs_before_barrier() {
    let mut b = ShaderBuilder::new();
    let pls = b.pixel_local("pls", ImageInternalFormat::R32f, 0, Precision::High);
    b.main(vec![pls_store(
        pls,
        Expr::binary(
            BinaryOp::Add,
            pls_load(pls),
            Expr::construct(Type::vec4(), vec![Expr::float(1.0)]),
        ),
    )]);
    let (mut shader, mut symbols) = b.finish();
    rewrite_pixel_local_storage(
        &mut shader,
        &mut symbols,
        &options(PlsBackend::ImageStoreNativeFormats),
    )
    .unwrap();

    let mut interp = interpreter(&shader, &symbols);
    interp.run_main().unwrap();
    assert_eq!(
        interp.events,
        vec![
            BuiltInFn::ImageLoad,
            BuiltInFn::MemoryBarrierImage,
            BuiltInFn::ImageStore,
            BuiltInFn::MemoryBarrierImage,
        ]
    );
    let image = global_named(&shader, &symbols, "pls");
    assert_eq!(interp.image(image), Some(&vec4(1.0, 0.0, 0.0, 1.0)));
}

// ─── Loops ─────────────────────────────────────────────────────────

/// `for (int i = 0; i < 3; pixelLocalStoreANGLE(pls, pixelLocalLoadANGLE(pls) + vec4(1.0)))`
/// with `i += 1;` in the body, optionally followed by `if (i == 2) continue;`.
fn accumulating_loop(with_continue: bool) -> (Shader, SymbolTable) {
    let mut b = ShaderBuilder::new();
    let pls = b.pixel_local("pls", ImageInternalFormat::R32f, 0, Precision::High);
    let i = b.local(
        "i",
        Type::scalar(BasicType::Int).with_precision(Precision::High),
    );
    let mut body = vec![Stmt::Expr(Expr::binary(
        BinaryOp::AddAssign,
        Expr::symbol(i),
        Expr::int(1),
    ))];
    if with_continue {
        body.push(Stmt::If {
            cond: Expr::binary(BinaryOp::Equal, Expr::symbol(i), Expr::int(2)),
            then_block: Block::new(vec![Stmt::Continue]),
            else_block: None,
        });
    }
    b.main(vec![Stmt::Loop {
        init: Some(Box::new(Stmt::declare_init(i, Expr::int(0)))),
        cond: Some(Expr::binary(BinaryOp::Less, Expr::symbol(i), Expr::int(3))),
        step: Some(Expr::call(
            CallOp::PixelLocalStore,
            vec![
                Expr::symbol(pls),
                Expr::binary(
                    BinaryOp::Add,
                    pls_load(pls),
                    Expr::construct(Type::vec4(), vec![Expr::float(1.0)]),
                ),
            ],
        )),
        body: Block::new(body),
    }]);
    b.finish()
}

#[test]
fn test_store_in_loop_step_runs_every_iteration() {
    for with_continue in [false, true] {
        for backend in IMAGE_BACKENDS {
            let (mut shader, mut symbols) = accumulating_loop(with_continue);
            rewrite_pixel_local_storage(&mut shader, &mut symbols, &options(backend)).unwrap();

            let text = print_shader(&shader, &symbols);
            let header = text.lines().find(|l| l.trim_start().starts_with("for (")).unwrap();
            assert!(!header.contains("imageStore"), "{}", header);

            let mut interp = interpreter(&shader, &symbols);
            interp.run_main().unwrap();
            let image = global_named(&shader, &symbols, "pls");
            assert_eq!(interp.image(image), Some(&vec4(3.0, 0.0, 0.0, 1.0)), "{}", backend);
            let iteration = [
                BuiltInFn::ImageLoad,
                BuiltInFn::MemoryBarrierImage,
                BuiltInFn::ImageStore,
                BuiltInFn::MemoryBarrierImage,
            ];
            assert_eq!(interp.events, iteration.repeat(3), "{}", backend);
        }
    }
}

#[test]
fn test_store_in_loop_step_with_framebuffer_fetch() {
    for with_continue in [false, true] {
        let (mut shader, mut symbols) = accumulating_loop(with_continue);
        rewrite_pixel_local_storage(
            &mut shader,
            &mut symbols,
            &options(PlsBackend::FramebufferFetch),
        )
        .unwrap();

        let mut interp = interpreter(&shader, &symbols);
        interp.run_main().unwrap();
        let attachment = global_named(&shader, &symbols, "pls");
        assert_eq!(floats(interp.get(attachment).unwrap())[0], 3.0);
    }
}

// ─── Determinism ───────────────────────────────────────────────────

fn three_planes() -> (Shader, SymbolTable) {
    let mut b = ShaderBuilder::new();
    let color = b.output("color", Type::vec4().with_precision(Precision::Medium), None);
    let c = b.pixel_local("c", ImageInternalFormat::R32ui, 2, Precision::High);
    let a = b.pixel_local("a", ImageInternalFormat::Rgba8, 0, Precision::Medium);
    let i = b.pixel_local("i", ImageInternalFormat::Rgba8i, 1, Precision::Medium);
    b.main(vec![
        Stmt::assign(Expr::symbol(color), pls_load(a)),
        pls_store(i, Expr::construct(Type::ivec4(), vec![Expr::int(-3)])),
        pls_store(c, pls_load(c)),
    ]);
    b.finish()
}

#[test]
fn test_lowering_is_deterministic() {
    for backend in PlsBackend::ALL {
        let lowered: Vec<(String, blake3::Hash)> = (0..2)
            .map(|_| {
                let (mut shader, mut symbols) = three_planes();
                rewrite_pixel_local_storage(&mut shader, &mut symbols, &options(backend)).unwrap();
                (print_shader(&shader, &symbols), shader.fingerprint(&symbols))
            })
            .collect();
        assert_eq!(lowered[0], lowered[1], "{}", backend);
    }
}

// ─── Framebuffer fetch ─────────────────────────────────────────────

#[test]
fn test_fetch_attachment_locations() {
    let (mut shader, mut symbols) = three_planes();
    rewrite_pixel_local_storage(
        &mut shader,
        &mut symbols,
        &options(PlsBackend::FramebufferFetch),
    )
    .unwrap();

    let location = |name: &str| {
        let var = global_named(&shader, &symbols, name);
        symbols.ty(var).layout.location
    };
    assert_eq!(location("a"), Some(7));
    assert_eq!(location("i"), Some(6));
    assert_eq!(location("c"), Some(5));
    assert_eq!(location("color"), Some(0));

    let c = global_named(&shader, &symbols, "c");
    let ty = symbols.ty(c);
    assert_eq!(ty.qualifier, Qualifier::FragmentInOut);
    assert_eq!(ty.glsl_name(), "uvec4");
    assert!(ty.layout.noncoherent);
    assert!(!shader.early_fragment_tests);
}

#[test]
fn test_fetch_is_coherent_with_synchronization() {
    let (mut shader, mut symbols) = three_planes();
    let options = options(PlsBackend::FramebufferFetch)
        .with_synchronization(FragmentSynchronization::FragmentShaderInterlockARB);
    rewrite_pixel_local_storage(&mut shader, &mut symbols, &options).unwrap();
    let a = global_named(&shader, &symbols, "a");
    assert!(!symbols.ty(a).layout.noncoherent);
}

#[test]
fn test_fetch_setup_and_finalize_follow_binding_order() {
    let mut b = ShaderBuilder::new();
    let second = b.pixel_local("second", ImageInternalFormat::Rgba8, 1, Precision::Medium);
    let first = b.pixel_local("first", ImageInternalFormat::R32f, 0, Precision::Medium);
    b.main(vec![pls_store(second, pls_load(first))]);
    let (mut shader, mut symbols) = b.finish();
    rewrite_pixel_local_storage(
        &mut shader,
        &mut symbols,
        &options(PlsBackend::FramebufferFetch),
    )
    .unwrap();

    // Declaration order minted `_t0` for binding 1 and `_t1` for binding 0.
    let main: Vec<String> = main_body(&shader, &symbols)
        .stmts
        .iter()
        .map(|stmt| format_stmt(stmt, &symbols).trim_end().to_string())
        .collect();
    assert_eq!(main[0], "_t1 = first.x;");
    assert_eq!(main[1], "_t0 = second;");
    assert_eq!(main[main.len() - 2], "first.x = _t1;");
    assert_eq!(main[main.len() - 1], "second = _t0;");
}

#[test]
fn test_fetch_preloads_attachment() {
    let lowered = round_trip(ImageInternalFormat::Rgba8, Type::vec4())
        .lower(&options(PlsBackend::FramebufferFetch));
    let mut shader = lowered.shader.clone();
    // Drop the store: the load must see the attachment's previous value.
    let main = shader.main_body_mut(&lowered.symbols).unwrap();
    main.stmts.remove(1);
    main.stmts.remove(1);

    let attachment = global_named(&shader, &lowered.symbols, "pls");
    let mut interp = interpreter(&shader, &lowered.symbols);
    interp.set(attachment, vec4(0.25, 0.5, 0.75, 1.0));
    interp.run_main().unwrap();
    assert_eq!(interp.get(lowered.result), Some(&vec4(0.25, 0.5, 0.75, 1.0)));
    assert_eq!(interp.get(attachment), Some(&vec4(0.25, 0.5, 0.75, 1.0)));
}

// ─── Image backend ─────────────────────────────────────────────────

#[test]
fn test_pixel_coordinate_is_initialized_first() {
    let (mut shader, mut symbols) = three_planes();
    let options = options(PlsBackend::ImageStoreR32PackedFormats)
        .with_synchronization(FragmentSynchronization::FragmentShaderInterlockNV);
    rewrite_pixel_local_storage(&mut shader, &mut symbols, &options).unwrap();

    let main = main_body(&shader, &symbols);
    assert_eq!(
        format_stmt(&main.stmts[0], &symbols).trim_end(),
        "_t0 = ivec2(floor(gl_FragCoord.xy));"
    );
    assert_eq!(
        format_stmt(&main.stmts[1], &symbols).trim_end(),
        "beginInvocationInterlockNV();"
    );
    assert_eq!(
        format_stmt(&main.stmts[main.len() - 1], &symbols).trim_end(),
        "endInvocationInterlockNV();"
    );
    let printed = print_shader(&shader, &symbols);
    assert_eq!(printed.matches("ivec2(floor(gl_FragCoord.xy))").count(), 1);
    assert!(shader.early_fragment_tests);
}

#[test]
fn test_synchronization_brackets_pls_access() {
    let cases = [
        (FragmentSynchronization::NotSupported, None, None),
        (
            FragmentSynchronization::FragmentShaderInterlockNV,
            Some(BuiltInFn::BeginInvocationInterlockNV),
            Some(BuiltInFn::EndInvocationInterlockNV),
        ),
        (
            FragmentSynchronization::FragmentShaderOrderingINTEL,
            Some(BuiltInFn::BeginFragmentShaderOrderingINTEL),
            None,
        ),
        (
            FragmentSynchronization::FragmentShaderInterlockARB,
            Some(BuiltInFn::BeginInvocationInterlockARB),
            Some(BuiltInFn::EndInvocationInterlockARB),
        ),
        (FragmentSynchronization::RasterizerOrderViews, None, None),
    ];
    for (sync, begin, end) in cases {
        let lowered = round_trip(ImageInternalFormat::Rgba8, Type::vec4())
            .lower(&options(PlsBackend::ImageStoreNativeFormats).with_synchronization(sync));
        let mut interp = interpreter(&lowered.shader, &lowered.symbols);
        interp.set(lowered.src, vec4(1.0, 1.0, 1.0, 1.0));
        interp.run_main().unwrap();

        let mut expected: Vec<BuiltInFn> = begin.into_iter().collect();
        expected.extend([
            BuiltInFn::MemoryBarrierImage,
            BuiltInFn::ImageStore,
            BuiltInFn::MemoryBarrierImage,
            BuiltInFn::ImageLoad,
        ]);
        expected.extend(end);
        assert_eq!(interp.events, expected, "{}", sync);

        let image = global_named(&lowered.shader, &lowered.symbols, "pls");
        let layout = lowered.symbols.ty(image).layout;
        assert_eq!(
            layout.raster_ordered,
            sync == FragmentSynchronization::RasterizerOrderViews
        );
    }
}

#[test]
fn test_image_declaration_qualifiers() {
    let lowered = round_trip(ImageInternalFormat::Rgba8i, Type::ivec4())
        .lower(&options(PlsBackend::ImageStoreR32PackedFormats));
    let image = global_named(&lowered.shader, &lowered.symbols, "pls");
    let ty = lowered.symbols.ty(image);
    assert_eq!(ty.basic, BasicType::IImage2D);
    assert_eq!(ty.precision, Precision::High);
    assert_eq!(ty.layout.binding, Some(0));
    assert!(ty.memory.coherent && ty.memory.restrict);
    assert_eq!(
        crate::ir::display::format_variable(image, &lowered.symbols),
        "layout(binding=0, r32i) coherent restrict uniform highp iimage2D pls"
    );
}

#[test]
fn test_highp_pack_workaround() {
    let mut options = options(PlsBackend::ImageStoreR32PackedFormats);
    options.pass_highp_to_pack_unorm_snorm_builtins = true;
    let lowered = round_trip(ImageInternalFormat::Rgba8, Type::vec4()).lower(&options);

    let highp: Vec<VariableId> = main_body(&lowered.shader, &lowered.symbols)
        .stmts
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Declaration(decl) => Some(decl.var),
            _ => None,
        })
        .filter(|&var| {
            let ty = lowered.symbols.ty(var);
            ty.basic == BasicType::Float && ty.precision == Precision::High
        })
        .collect();
    assert_eq!(highp.len(), 1);
    let printed = print_shader(&lowered.shader, &lowered.symbols);
    let call = format!("packUnorm4x8({})", lowered.symbols.name(highp[0]));
    assert!(printed.contains(&call), "{}", printed);

    let result = floats(&lowered.run(vec4(0.0, 1.0, 0.5, 0.25)));
    assert!((result[2] - 128.0 / 255.0).abs() < 1e-6);
}

// ─── Edge cases ────────────────────────────────────────────────────

#[test]
fn test_shader_without_pls_is_untouched() {
    let mut b = ShaderBuilder::new();
    let color = b.output("color", Type::vec4().with_precision(Precision::Medium), None);
    b.main(vec![Stmt::assign(
        Expr::symbol(color),
        Expr::construct(Type::vec4(), vec![Expr::float(1.0)]),
    )]);
    let (mut shader, mut symbols) = b.finish();
    let before = shader.clone();
    for backend in PlsBackend::ALL {
        rewrite_pixel_local_storage(&mut shader, &mut symbols, &options(backend)).unwrap();
        assert_eq!(shader, before);
    }
}

#[test]
fn test_missing_main_is_an_error() {
    let mut b = ShaderBuilder::new();
    b.pixel_local("pls", ImageInternalFormat::Rgba8, 0, Precision::Medium);
    let (mut shader, mut symbols) = b.finish();
    let before = shader.clone();
    for backend in PlsBackend::ALL {
        let errors =
            rewrite_pixel_local_storage(&mut shader, &mut symbols, &options(backend)).unwrap_err();
        assert!(errors[0].message.contains("'main'"));
        assert_eq!(shader, before, "{}", backend);
    }
}

#[test]
fn test_output_colliding_with_attachment_is_an_error() {
    let mut b = ShaderBuilder::new();
    let color = b.output("color", Type::vec4().with_precision(Precision::Medium), Some(7));
    let pls = b.pixel_local("pls", ImageInternalFormat::Rgba8, 0, Precision::Medium);
    b.main(vec![Stmt::assign(Expr::symbol(color), pls_load(pls))]);
    let (mut shader, mut symbols) = b.finish();
    let before = shader.clone();

    let errors = rewrite_pixel_local_storage(
        &mut shader,
        &mut symbols,
        &options(PlsBackend::FramebufferFetch),
    )
    .unwrap_err();
    assert!(errors.iter().any(|e| e.message.contains("share location 7")));
    assert_eq!(shader, before);
}

#[test]
fn test_pls_passed_to_functions_is_specialized() {
    let mut b = ShaderBuilder::new();
    let pls = b.pixel_local("pls", ImageInternalFormat::Rgba8ui, 0, Precision::Medium);
    let param = b.local(
        "p",
        Type::scalar(BasicType::UPixelLocal)
            .with_precision(Precision::Medium)
            .with_qualifier(Qualifier::ParamIn),
    );
    let fill = b.function(
        "fill",
        Type::void(),
        vec![param],
        vec![pls_store(param, Expr::construct(Type::uvec4(), vec![Expr::uint(9)]))],
    );
    b.main(vec![Stmt::Expr(Expr::call(
        CallOp::Function(fill),
        vec![Expr::symbol(pls)],
    ))]);
    let (mut shader, mut symbols) = b.finish();
    rewrite_pixel_local_storage(
        &mut shader,
        &mut symbols,
        &options(PlsBackend::ImageStoreNativeFormats),
    )
    .unwrap();

    let mut interp = interpreter(&shader, &symbols);
    interp.run_main().unwrap();
    let image = global_named(&shader, &symbols, "pls");
    assert_eq!(interp.image(image), Some(&uvec4(9, 9, 9, 9)));
}

#[test]
fn test_pls_argument_must_be_uniform() {
    let mut b = ShaderBuilder::new();
    b.pixel_local("pls", ImageInternalFormat::Rgba8, 0, Precision::Medium);
    let param = b.local(
        "p",
        Type::scalar(BasicType::PixelLocal).with_qualifier(Qualifier::ParamIn),
    );
    let f = b.function("f", Type::void(), vec![param], Vec::new());
    let other = b.local("other", Type::scalar(BasicType::PixelLocal));
    b.main(vec![Stmt::Expr(Expr::call(
        CallOp::Function(f),
        vec![Expr::symbol(other)],
    ))]);
    let (mut shader, mut symbols) = b.finish();
    let before = shader.clone();
    assert!(rewrite_pixel_local_storage(&mut shader, &mut symbols, &CompileOptions::default())
        .is_err());
    assert_eq!(shader, before);
}

fn pls_type() -> Type {
    Type::scalar(BasicType::PixelLocal)
        .with_precision(Precision::Medium)
        .with_qualifier(Qualifier::Uniform)
        .with_layout(LayoutQualifier {
            binding: Some(0),
            image_internal_format: ImageInternalFormat::Rgba8,
            ..LayoutQualifier::default()
        })
}

#[test]
#[should_panic(expected = "cannot be an array")]
fn test_pls_array_panics() {
    let mut b = ShaderBuilder::new();
    b.global("planes", pls_type().with_array_size(2));
    b.main(Vec::new());
    let (mut shader, mut symbols) = b.finish();
    let _ = rewrite_pixel_local_storage(&mut shader, &mut symbols, &CompileOptions::default());
}

#[test]
#[should_panic(expected = "must be a uniform")]
fn test_non_uniform_pls_panics() {
    let mut b = ShaderBuilder::new();
    b.global("pls", pls_type().with_qualifier(Qualifier::Global));
    b.main(Vec::new());
    let (mut shader, mut symbols) = b.finish();
    let _ = rewrite_pixel_local_storage(&mut shader, &mut symbols, &CompileOptions::default());
}

#[test]
#[should_panic(expected = "already has a backing store")]
fn test_duplicate_binding_panics() {
    let mut b = ShaderBuilder::new();
    b.pixel_local("a", ImageInternalFormat::Rgba8, 3, Precision::Medium);
    b.pixel_local("b", ImageInternalFormat::R32f, 3, Precision::Medium);
    b.main(Vec::new());
    let (mut shader, mut symbols) = b.finish();
    let _ = rewrite_pixel_local_storage(&mut shader, &mut symbols, &CompileOptions::default());
}
