//! Image backend: every plane becomes a coherent `image2D` accessed at the
//! fragment's own pixel, optionally packed into a single 32-bit channel.

use crate::config::{FragmentSynchronization, PlsBackend};
use crate::ir::traverse::ParentBlock;
use crate::ir::{
    BinaryOp, BuiltInFn, Expr, MemoryQualifier, Precision, Stmt, Type, VariableId,
};

use super::format::{data_type_of_image_type, PlsFormat};
use super::registry::BackingStoreMap;
use super::rewrite::RewriteContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ImagePlane {
    pub image: VariableId,
    pub format: PlsFormat,
    pub packed: bool,
}

pub(crate) struct ImageBackend {
    images: BackingStoreMap<ImagePlane>,
}

const UNPACK_SHIFTS: [u32; 4] = [24, 16, 8, 0];

impl ImageBackend {
    pub fn new() -> Self {
        Self {
            images: BackingStoreMap::new(),
        }
    }

    pub fn plane_count(&self) -> usize {
        self.images.len()
    }

    pub fn declare(
        &mut self,
        ctx: &mut RewriteContext<'_>,
        pls: VariableId,
        parent: &mut ParentBlock,
    ) -> Stmt {
        ctx.ensure_global_pixel_coord(parent);
        let pls_ty = *ctx.symbols.ty(pls);
        let format = PlsFormat::of(&pls_ty);
        let pack_r32 = ctx.options.pls.backend == PlsBackend::ImageStoreR32PackedFormats;
        let image_format = format.image_format(pack_r32);

        let mut ty = pls_ty;
        ty.basic = image_format.basic;
        ty.layout.image_internal_format = image_format.format;
        ty.layout.raster_ordered = ctx.options.pls.fragment_synchronization
            == FragmentSynchronization::RasterizerOrderViews;
        if image_format.packed {
            ty.precision = Precision::High;
        }
        ty.memory = MemoryQualifier {
            coherent: true,
            restrict: true,
            ..MemoryQualifier::default()
        };

        let image = ctx.symbols.create_replacement(pls, ty);
        self.images.insert_new(
            ctx.binding_of(pls),
            ImagePlane {
                image,
                format,
                packed: image_format.packed,
            },
        );
        Stmt::declare(image)
    }

    pub fn load(&self, ctx: &mut RewriteContext<'_>, pls: VariableId) -> Expr {
        let plane = *self.images.find(ctx.binding_of(pls));
        let data = Expr::builtin(
            BuiltInFn::ImageLoad,
            vec![Expr::symbol(plane.image), Expr::symbol(ctx.pixel_coord())],
        );
        if !plane.packed {
            return data;
        }
        match plane.format {
            // unpackUnorm4x8(data.x)
            PlsFormat::Rgba8 => {
                Expr::builtin(BuiltInFn::UnpackUnorm4x8, vec![Expr::swizzle(data, &[0])])
            }
            // data.xxxx << uvec4(24, 16, 8, 0) >> 24u
            // Left then right keeps the sign of signed channels.
            PlsFormat::Rgba8i | PlsFormat::Rgba8ui => Expr::binary(
                BinaryOp::ShiftRight,
                Expr::binary(
                    BinaryOp::ShiftLeft,
                    Expr::swizzle(data, &[0, 0, 0, 0]),
                    Expr::construct(
                        Type::uvec4(),
                        UNPACK_SHIFTS.iter().map(|&s| Expr::uint(s)).collect(),
                    ),
                ),
                Expr::uint(24),
            ),
            PlsFormat::R32f | PlsFormat::R32ui => {
                panic!("internal error: {:?} is never packed", plane.format)
            }
        }
    }

    /// Rewrite a store of the temporary `value`. Clamping and packing go
    /// into the parent block, bracketed by image barriers, and the
    /// returned `imageStore` replaces the PLS store.
    pub fn store(
        &self,
        ctx: &mut RewriteContext<'_>,
        pls: VariableId,
        value: VariableId,
        parent: &mut ParentBlock,
    ) -> Expr {
        let plane = *self.images.find(ctx.binding_of(pls));
        let v = || Expr::symbol(value);
        let mut before = Vec::new();

        // Out-of-range integer stores differ between APIs; clamp to make
        // them GL-like on every backend.
        match plane.format {
            PlsFormat::Rgba8i => before.push(Stmt::assign(
                v(),
                Expr::builtin(BuiltInFn::Clamp, vec![v(), Expr::int(-128), Expr::int(127)]),
            )),
            PlsFormat::Rgba8ui => before.push(Stmt::assign(
                v(),
                Expr::builtin(BuiltInFn::Min, vec![v(), Expr::uint(255)]),
            )),
            PlsFormat::Rgba8 | PlsFormat::R32f | PlsFormat::R32ui => {}
        }

        let data = if plane.packed {
            let packed = match plane.format {
                PlsFormat::Rgba8 => {
                    let mut arg = v();
                    if ctx.options.pass_highp_to_pack_unorm_snorm_builtins {
                        let highp = ctx
                            .symbols
                            .create_temp(Type::vec4().with_precision(Precision::High));
                        before.push(Stmt::declare_init(highp, v()));
                        arg = Expr::symbol(highp);
                    }
                    Expr::builtin(BuiltInFn::PackUnorm4x8, vec![arg])
                }
                PlsFormat::Rgba8i | PlsFormat::Rgba8ui => {
                    if plane.format == PlsFormat::Rgba8i {
                        // Drop sign bits above the low byte.
                        before.push(Stmt::Expr(Expr::binary(
                            BinaryOp::BitAndAssign,
                            v(),
                            Expr::int(0xff),
                        )));
                    }
                    // x | (y << 8u) | (z << 16u) | (w << 24u)
                    (1..4u8).fold(Expr::swizzle(v(), &[0]), |packed, i| {
                        Expr::binary(
                            BinaryOp::BitOr,
                            packed,
                            Expr::binary(
                                BinaryOp::ShiftLeft,
                                Expr::swizzle(v(), &[i]),
                                Expr::uint(u32::from(i) * 8),
                            ),
                        )
                    })
                }
                PlsFormat::R32f | PlsFormat::R32ui => {
                    panic!("internal error: {:?} is never packed", plane.format)
                }
            };
            let image_basic = ctx.symbols.ty(plane.image).basic;
            Expr::construct(
                Type::new(data_type_of_image_type(image_basic), 4),
                vec![packed],
            )
        } else {
            v()
        };

        // Barriers on both sides make dependent loads and stores within the
        // invocation coherent.
        before.push(Stmt::Expr(memory_barrier_image()));
        parent.insert_around(before, vec![Stmt::Expr(memory_barrier_image())]);

        Expr::builtin(
            BuiltInFn::ImageStore,
            vec![
                Expr::symbol(plane.image),
                Expr::symbol(ctx.pixel_coord()),
                data,
            ],
        )
    }

    /// Delimits the start of the per-pixel critical section.
    pub fn setup_code(&self, ctx: &RewriteContext<'_>) -> Vec<Stmt> {
        let begin = match ctx.options.pls.fragment_synchronization {
            FragmentSynchronization::FragmentShaderInterlockNV => {
                Some(BuiltInFn::BeginInvocationInterlockNV)
            }
            FragmentSynchronization::FragmentShaderOrderingINTEL => {
                Some(BuiltInFn::BeginFragmentShaderOrderingINTEL)
            }
            FragmentSynchronization::FragmentShaderInterlockARB => {
                Some(BuiltInFn::BeginInvocationInterlockARB)
            }
            // Raster-ordered views order themselves.
            FragmentSynchronization::RasterizerOrderViews
            | FragmentSynchronization::NotSupported => None,
        };
        begin
            .map(|f| Stmt::Expr(Expr::builtin(f, Vec::new())))
            .into_iter()
            .collect()
    }

    /// Delimits the end of the critical section. INTEL ordering has no end
    /// call.
    pub fn finalize_code(&self, ctx: &RewriteContext<'_>) -> Vec<Stmt> {
        let end = match ctx.options.pls.fragment_synchronization {
            FragmentSynchronization::FragmentShaderInterlockNV => {
                Some(BuiltInFn::EndInvocationInterlockNV)
            }
            FragmentSynchronization::FragmentShaderInterlockARB => {
                Some(BuiltInFn::EndInvocationInterlockARB)
            }
            FragmentSynchronization::FragmentShaderOrderingINTEL
            | FragmentSynchronization::RasterizerOrderViews
            | FragmentSynchronization::NotSupported => None,
        };
        end.map(|f| Stmt::Expr(Expr::builtin(f, Vec::new())))
            .into_iter()
            .collect()
    }
}

fn memory_barrier_image() -> Expr {
    Expr::builtin(BuiltInFn::MemoryBarrierImage, Vec::new())
}
