//! Convenience construction of shader trees.
//!
//! The front end normally produces the tree; drivers, benchmarks and tests
//! use this builder to assemble one by hand without repeating the symbol
//! table bookkeeping.

use super::{
    BasicType, Block, CallOp, Expr, Function, FunctionId, ImageInternalFormat, LayoutQualifier,
    Precision, Qualifier, Shader, Stmt, SymbolTable, Type, VariableId,
};
use crate::span::Span;

#[derive(Debug, Default)]
pub struct ShaderBuilder {
    pub symbols: SymbolTable,
    root: Vec<Stmt>,
    early_fragment_tests: bool,
}

impl ShaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a global PLS uniform, e.g.
    /// `layout(binding=0, rgba8) uniform highp pixelLocalANGLE name;`.
    pub fn pixel_local(
        &mut self,
        name: &str,
        format: ImageInternalFormat,
        binding: u32,
        precision: Precision,
    ) -> VariableId {
        let basic = match format {
            ImageInternalFormat::Rgba8i => BasicType::IPixelLocal,
            ImageInternalFormat::Rgba8ui | ImageInternalFormat::R32ui => BasicType::UPixelLocal,
            _ => BasicType::PixelLocal,
        };
        let ty = Type::scalar(basic)
            .with_precision(precision)
            .with_qualifier(Qualifier::Uniform)
            .with_layout(LayoutQualifier {
                binding: Some(binding),
                image_internal_format: format,
                ..LayoutQualifier::default()
            });
        self.global(name, ty)
    }

    /// Declare a fragment output, optionally at an explicit location.
    pub fn output(&mut self, name: &str, ty: Type, location: Option<u32>) -> VariableId {
        let ty = ty.with_qualifier(Qualifier::FragmentOut).with_layout(LayoutQualifier {
            location,
            ..LayoutQualifier::default()
        });
        self.global(name, ty)
    }

    /// Declare a global variable of the given (fully qualified) type.
    pub fn global(&mut self, name: &str, ty: Type) -> VariableId {
        let var = self.symbols.declare(name, ty);
        self.root.push(Stmt::declare(var));
        var
    }

    /// Register a local variable or parameter; the caller places its
    /// declaration.
    pub fn local(&mut self, name: &str, ty: Type) -> VariableId {
        self.symbols.declare(name, ty)
    }

    /// Register a function name so bodies can call it before it is
    /// defined with [`ShaderBuilder::define`].
    pub fn declare_function(&mut self, name: &str) -> FunctionId {
        self.symbols.declare_function(name)
    }

    pub fn define(
        &mut self,
        id: FunctionId,
        return_type: Type,
        params: Vec<VariableId>,
        body: Vec<Stmt>,
    ) {
        self.root.push(Stmt::Function(Function {
            id,
            return_type,
            params,
            body: Block::new(body),
            span: Span::dummy(),
        }));
    }

    pub fn function(
        &mut self,
        name: &str,
        return_type: Type,
        params: Vec<VariableId>,
        body: Vec<Stmt>,
    ) -> FunctionId {
        let id = self.declare_function(name);
        self.define(id, return_type, params, body);
        id
    }

    pub fn main(&mut self, body: Vec<Stmt>) -> FunctionId {
        self.function("main", Type::void(), Vec::new(), body)
    }

    pub fn early_fragment_tests(&mut self) {
        self.early_fragment_tests = true;
    }

    pub fn finish(self) -> (Shader, SymbolTable) {
        let mut shader = Shader::new(Block::new(self.root));
        shader.early_fragment_tests = self.early_fragment_tests;
        (shader, self.symbols)
    }
}

/// `pixelLocalLoadANGLE(pls)`
pub fn pls_load(pls: VariableId) -> Expr {
    Expr::call(CallOp::PixelLocalLoad, vec![Expr::symbol(pls)])
}

/// `pixelLocalStoreANGLE(pls, value);`
pub fn pls_store(pls: VariableId, value: Expr) -> Stmt {
    Stmt::Expr(Expr::call(
        CallOp::PixelLocalStore,
        vec![Expr::symbol(pls), value],
    ))
}
