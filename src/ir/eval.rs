//! Reference interpreter for lowered shaders.
//!
//! Executes one fragment invocation of the subset of the IR the lowering
//! passes produce. Values are flat component lists; integer arithmetic
//! wraps the way GLSL does. Every image holds exactly one texel (the
//! fragment's own pixel), quantized to the image's internal format on
//! store, which is enough to observe what a PLS load/store round trip
//! does to a value.

use std::collections::BTreeMap;
use std::fmt;

use super::{
    BasicType, BinaryOp, Block, BuiltInFn, Call, CallOp, ConstantValue, Expr, Function,
    FunctionId, ImageInternalFormat, Qualifier, Shader, Stmt, SymbolTable, Type, UnaryOp,
    VariableId,
};

// ─── Values ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
}

/// A scalar or vector value, one entry per component. Void calls
/// evaluate to the empty value.
pub type Value = Vec<Scalar>;

impl Scalar {
    pub fn zero(basic: BasicType) -> Option<Scalar> {
        match basic {
            BasicType::Float => Some(Scalar::Float(0.0)),
            BasicType::Int => Some(Scalar::Int(0)),
            BasicType::UInt => Some(Scalar::UInt(0)),
            BasicType::Bool => Some(Scalar::Bool(false)),
            _ => None,
        }
    }

    fn one(basic: BasicType) -> Option<Scalar> {
        match basic {
            BasicType::Float => Some(Scalar::Float(1.0)),
            BasicType::Int => Some(Scalar::Int(1)),
            BasicType::UInt => Some(Scalar::UInt(1)),
            BasicType::Bool => Some(Scalar::Bool(true)),
            _ => None,
        }
    }

    /// Constructor-style conversion to another scalar kind.
    pub fn convert(self, to: BasicType) -> Result<Scalar, EvalError> {
        let converted = match (to, self) {
            (BasicType::Float, Scalar::Float(x)) => Scalar::Float(x),
            (BasicType::Float, Scalar::Int(x)) => Scalar::Float(x as f32),
            (BasicType::Float, Scalar::UInt(x)) => Scalar::Float(x as f32),
            (BasicType::Float, Scalar::Bool(x)) => Scalar::Float(if x { 1.0 } else { 0.0 }),
            (BasicType::Int, Scalar::Float(x)) => Scalar::Int(x as i32),
            (BasicType::Int, Scalar::Int(x)) => Scalar::Int(x),
            (BasicType::Int, Scalar::UInt(x)) => Scalar::Int(x as i32),
            (BasicType::Int, Scalar::Bool(x)) => Scalar::Int(x as i32),
            (BasicType::UInt, Scalar::Float(x)) => Scalar::UInt(x as u32),
            (BasicType::UInt, Scalar::Int(x)) => Scalar::UInt(x as u32),
            (BasicType::UInt, Scalar::UInt(x)) => Scalar::UInt(x),
            (BasicType::UInt, Scalar::Bool(x)) => Scalar::UInt(x as u32),
            (BasicType::Bool, Scalar::Float(x)) => Scalar::Bool(x != 0.0),
            (BasicType::Bool, Scalar::Int(x)) => Scalar::Bool(x != 0),
            (BasicType::Bool, Scalar::UInt(x)) => Scalar::Bool(x != 0),
            (BasicType::Bool, Scalar::Bool(x)) => Scalar::Bool(x),
            (other, _) => {
                return Err(EvalError::new(format!(
                    "cannot convert to {}",
                    other.glsl_name(1)
                )))
            }
        };
        Ok(converted)
    }

    pub fn as_bool(self) -> Result<bool, EvalError> {
        match self {
            Scalar::Bool(b) => Ok(b),
            other => Err(EvalError::new(format!("expected bool, found {:?}", other))),
        }
    }

    fn as_shift_amount(self) -> Result<u32, EvalError> {
        match self {
            Scalar::Int(x) => Ok(x as u32),
            Scalar::UInt(x) => Ok(x),
            other => Err(EvalError::new(format!(
                "shift amount must be an integer, found {:?}",
                other
            ))),
        }
    }
}

impl From<ConstantValue> for Scalar {
    fn from(value: ConstantValue) -> Self {
        match value {
            ConstantValue::Float(x) => Scalar::Float(x),
            ConstantValue::Int(x) => Scalar::Int(x),
            ConstantValue::UInt(x) => Scalar::UInt(x),
            ConstantValue::Bool(x) => Scalar::Bool(x),
        }
    }
}

pub fn vec4(x: f32, y: f32, z: f32, w: f32) -> Value {
    [x, y, z, w].into_iter().map(Scalar::Float).collect()
}

pub fn ivec4(x: i32, y: i32, z: i32, w: i32) -> Value {
    [x, y, z, w].into_iter().map(Scalar::Int).collect()
}

pub fn uvec4(x: u32, y: u32, z: u32, w: u32) -> Value {
    [x, y, z, w].into_iter().map(Scalar::UInt).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

// ─── Control flow ──────────────────────────────────────────────────

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
    Discard,
}

const MAX_CALL_DEPTH: u32 = 64;
const MAX_LOOP_ITERATIONS: u32 = 1 << 16;

// ─── Interpreter ───────────────────────────────────────────────────

pub struct Interpreter<'a> {
    symbols: &'a SymbolTable,
    shader: &'a Shader,
    functions: BTreeMap<FunctionId, &'a Function>,
    env: BTreeMap<VariableId, Value>,
    images: BTreeMap<VariableId, Value>,
    /// Memory and synchronization built-ins in execution order.
    pub events: Vec<BuiltInFn>,
    /// Set when the invocation executed `discard`.
    pub discarded: bool,
    call_depth: u32,
}

impl<'a> Interpreter<'a> {
    pub fn new(shader: &'a Shader, symbols: &'a SymbolTable) -> Self {
        let functions = shader.functions().map(|f| (f.id, f)).collect();
        Self {
            symbols,
            shader,
            functions,
            env: BTreeMap::new(),
            images: BTreeMap::new(),
            events: Vec::new(),
            discarded: false,
            call_depth: 0,
        }
    }

    pub fn set(&mut self, var: VariableId, value: Value) {
        self.env.insert(var, value);
    }

    pub fn get(&self, var: VariableId) -> Option<&Value> {
        self.env.get(&var)
    }

    /// The texel currently held by `image`.
    pub fn image(&self, image: VariableId) -> Option<&Value> {
        self.images.get(&image)
    }

    /// Seed the texel of `image`, quantized to its internal format.
    pub fn set_image(&mut self, image: VariableId, texel: Value) -> Result<(), EvalError> {
        let texel = self.quantize(image, texel)?;
        self.images.insert(image, texel);
        Ok(())
    }

    /// Execute global declarations, then `main`. Uniforms, inputs and
    /// globals seeded with [`Interpreter::set`] keep their values when their
    /// declaration has no initializer.
    pub fn run_main(&mut self) -> Result<(), EvalError> {
        let shader = self.shader;
        let mut main = None;
        for stmt in &shader.root.stmts {
            match stmt {
                Stmt::Function(f) => {
                    if self.symbols.function_name(f.id) == "main" {
                        main = Some(f);
                    }
                }
                other => {
                    self.exec_stmt(other)?;
                }
            }
        }
        let main = main.ok_or_else(|| EvalError::new("shader has no main".to_string()))?;
        self.call_function(main, &[])?;
        Ok(())
    }

    // ─── Statements ────────────────────────────────────────────────

    fn exec_block(&mut self, block: &Block) -> Result<Flow, EvalError> {
        for stmt in &block.stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal if self.discarded => return Ok(Flow::Discard),
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Declaration(decl) => {
                let ty = *self.symbols.ty(decl.var);
                match &decl.init {
                    Some(init) => {
                        let value = self.eval_expr(init)?;
                        let value = self.coerce(value, &ty)?;
                        self.env.insert(decl.var, value);
                    }
                    None => {
                        if ty.basic.is_image() {
                            if !self.images.contains_key(&decl.var) {
                                let texel = self.zero_texel(&ty)?;
                                self.images.insert(decl.var, texel);
                            }
                        } else if !self.env.contains_key(&decl.var)
                            || !matches!(
                                ty.qualifier,
                                Qualifier::Uniform
                                    | Qualifier::FragmentIn
                                    | Qualifier::FragmentInOut
                                    | Qualifier::Global
                            )
                        {
                            if let Some(zero) = Scalar::zero(ty.basic) {
                                self.env.insert(decl.var, vec![zero; ty.size as usize]);
                            }
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(block) => self.exec_block(block),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval_bool(cond)? {
                    self.exec_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Loop {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.exec_stmt(init)?;
                }
                let mut iterations = 0;
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_bool(cond)? {
                            break;
                        }
                    }
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        return Err(EvalError::new("loop iteration limit exceeded".to_string()));
                    }
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                    if let Some(step) = step {
                        self.eval_expr(step)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Vec::new(),
                };
                Ok(Flow::Return(value))
            }
            Stmt::Discard => Ok(Flow::Discard),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Function(_) => Err(EvalError::new(
                "nested function definition".to_string(),
            )),
        }
    }

    fn call_function(&mut self, function: &Function, args: &[Expr]) -> Result<Value, EvalError> {
        if args.len() != function.params.len() {
            return Err(EvalError::new(format!(
                "'{}' expects {} arguments, got {}",
                self.symbols.function_name(function.id),
                function.params.len(),
                args.len()
            )));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(EvalError::new("call depth limit exceeded".to_string()));
        }
        for (&param, arg) in function.params.iter().zip(args) {
            let ty = *self.symbols.ty(param);
            let value = if ty.qualifier == Qualifier::ParamOut {
                let zero = Scalar::zero(ty.basic)
                    .ok_or_else(|| EvalError::new("opaque out parameter".to_string()))?;
                vec![zero; ty.size as usize]
            } else {
                self.eval_expr(arg)?
            };
            self.env.insert(param, value);
        }
        self.call_depth += 1;
        let flow = self.exec_block(&function.body);
        self.call_depth -= 1;
        let result = match flow? {
            Flow::Return(value) => value,
            Flow::Discard => {
                self.discarded = true;
                Vec::new()
            }
            _ => Vec::new(),
        };
        for (&param, arg) in function.params.iter().zip(args) {
            let qualifier = self.symbols.ty(param).qualifier;
            if matches!(qualifier, Qualifier::ParamOut | Qualifier::ParamInOut) {
                let value = self.lookup(param)?.clone();
                self.assign_to(arg, value)?;
            }
        }
        Ok(result)
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn lookup(&self, var: VariableId) -> Result<&Value, EvalError> {
        self.env.get(&var).ok_or_else(|| {
            EvalError::new(format!(
                "variable '{}' has no value",
                self.symbols.name(var)
            ))
        })
    }

    fn eval_bool(&mut self, expr: &Expr) -> Result<bool, EvalError> {
        let value = self.eval_expr(expr)?;
        match value.as_slice() {
            [scalar] => scalar.as_bool(),
            _ => Err(EvalError::new("condition is not a scalar".to_string())),
        }
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Symbol(var) => self.lookup(*var).cloned(),
            Expr::Constant(value) => Ok(vec![Scalar::from(*value)]),
            Expr::Swizzle { operand, offsets } => {
                let value = self.eval_expr(operand)?;
                offsets
                    .iter()
                    .map(|&offset| {
                        value.get(offset as usize).copied().ok_or_else(|| {
                            EvalError::new(format!("swizzle offset {} out of range", offset))
                        })
                    })
                    .collect()
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                value.into_iter().map(|s| unary(*op, s)).collect()
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval_bool(cond)? {
                    self.eval_expr(then_expr)
                } else {
                    self.eval_expr(else_expr)
                }
            }
            Expr::Index { base, index } => {
                let value = self.eval_expr(base)?;
                let index = self.eval_index(index)?;
                value
                    .get(index)
                    .map(|s| vec![*s])
                    .ok_or_else(|| EvalError::new(format!("index {} out of range", index)))
            }
            Expr::Call(call) => self.eval_call(call),
        }
    }

    fn eval_index(&mut self, index: &Expr) -> Result<usize, EvalError> {
        match self.eval_expr(index)?.as_slice() {
            [Scalar::Int(i)] if *i >= 0 => Ok(*i as usize),
            [Scalar::UInt(i)] => Ok(*i as usize),
            other => Err(EvalError::new(format!("invalid index {:?}", other))),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        match op {
            BinaryOp::LogicalAnd => {
                let result = self.eval_bool(lhs)? && self.eval_bool(rhs)?;
                Ok(vec![Scalar::Bool(result)])
            }
            BinaryOp::LogicalOr => {
                let result = self.eval_bool(lhs)? || self.eval_bool(rhs)?;
                Ok(vec![Scalar::Bool(result)])
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let equal = self.eval_expr(lhs)? == self.eval_expr(rhs)?;
                Ok(vec![Scalar::Bool(equal == (op == BinaryOp::Equal))])
            }
            BinaryOp::Assign => {
                let value = self.eval_expr(rhs)?;
                self.assign_to(lhs, value.clone())?;
                Ok(value)
            }
            BinaryOp::AddAssign | BinaryOp::BitAndAssign | BinaryOp::BitOrAssign => {
                let arithmetic = op.compound_operator().ok_or_else(|| {
                    EvalError::new(format!("'{}' is not a compound assignment", op.symbol()))
                })?;
                let current = self.eval_expr(lhs)?;
                let operand = self.eval_expr(rhs)?;
                let value = componentwise(&current, &operand, |a, b| scalar_binary(arithmetic, a, b))?;
                self.assign_to(lhs, value.clone())?;
                Ok(value)
            }
            _ => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                componentwise(&a, &b, |x, y| scalar_binary(op, x, y))
            }
        }
    }

    /// Store `value` through an lvalue expression.
    fn assign_to(&mut self, target: &Expr, value: Value) -> Result<(), EvalError> {
        match target {
            Expr::Symbol(var) => {
                self.env.insert(*var, value);
                Ok(())
            }
            Expr::Swizzle { operand, offsets } => {
                let mut current = self.eval_expr(operand)?;
                for (i, &offset) in offsets.iter().enumerate() {
                    let component = if value.len() == 1 {
                        value[0]
                    } else {
                        *value.get(i).ok_or_else(|| {
                            EvalError::new("swizzle assignment too short".to_string())
                        })?
                    };
                    let slot = current.get_mut(offset as usize).ok_or_else(|| {
                        EvalError::new(format!("swizzle offset {} out of range", offset))
                    })?;
                    *slot = component;
                }
                self.assign_to(operand, current)
            }
            Expr::Index { base, index } => {
                let index = self.eval_index(index)?;
                let mut current = self.eval_expr(base)?;
                let component = match value.as_slice() {
                    [s] => *s,
                    _ => return Err(EvalError::new("indexed store of a vector".to_string())),
                };
                let slot = current
                    .get_mut(index)
                    .ok_or_else(|| EvalError::new(format!("index {} out of range", index)))?;
                *slot = component;
                self.assign_to(base, current)
            }
            _ => Err(EvalError::new("assignment to a non-lvalue".to_string())),
        }
    }

    fn eval_call(&mut self, call: &Call) -> Result<Value, EvalError> {
        match &call.op {
            CallOp::PixelLocalLoad | CallOp::PixelLocalStore => Err(EvalError::new(
                "pixel local storage must be lowered before evaluation".to_string(),
            )),
            CallOp::Function(id) => {
                let function = *self.functions.get(id).ok_or_else(|| {
                    EvalError::new(format!(
                        "call to undefined function '{}'",
                        self.symbols.function_name(*id)
                    ))
                })?;
                self.call_function(function, &call.args)
            }
            CallOp::Construct(ty) => {
                let mut components = Vec::new();
                for arg in &call.args {
                    components.extend(self.eval_expr(arg)?);
                }
                construct(ty, components)
            }
            CallOp::BuiltIn(func) => self.eval_builtin(*func, &call.args),
        }
    }

    fn eval_builtin(&mut self, func: BuiltInFn, args: &[Expr]) -> Result<Value, EvalError> {
        match func {
            BuiltInFn::ImageLoad => {
                let image = image_operand(args)?;
                if let Some(coord) = args.get(1) {
                    self.eval_expr(coord)?;
                }
                self.events.push(func);
                match self.images.get(&image) {
                    Some(texel) => Ok(texel.clone()),
                    None => self.zero_texel(self.symbols.ty(image)),
                }
            }
            BuiltInFn::ImageStore => {
                let image = image_operand(args)?;
                let (coord, value) = match args {
                    [_, coord, value] => (coord, value),
                    _ => return Err(EvalError::new("imageStore takes 3 arguments".to_string())),
                };
                self.eval_expr(coord)?;
                let value = self.eval_expr(value)?;
                self.events.push(func);
                let texel = self.quantize(image, value)?;
                self.images.insert(image, texel);
                Ok(Vec::new())
            }
            BuiltInFn::MemoryBarrierImage
            | BuiltInFn::BeginInvocationInterlockNV
            | BuiltInFn::EndInvocationInterlockNV
            | BuiltInFn::BeginFragmentShaderOrderingINTEL
            | BuiltInFn::BeginInvocationInterlockARB
            | BuiltInFn::EndInvocationInterlockARB => {
                self.events.push(func);
                Ok(Vec::new())
            }
            _ => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                pure_builtin(func, &values)
            }
        }
    }

    // ─── Images ────────────────────────────────────────────────────

    fn zero_texel(&self, ty: &Type) -> Result<Value, EvalError> {
        let basic = texel_kind(ty.basic)?;
        let zero = Scalar::zero(basic).ok_or_else(|| EvalError::new("bad texel".to_string()))?;
        self.quantize_as(ty, vec![zero; 4])
    }

    fn quantize(&self, image: VariableId, texel: Value) -> Result<Value, EvalError> {
        let ty = *self.symbols.ty(image);
        self.quantize_as(&ty, texel)
    }

    /// What reading back a texel after writing `texel` yields.
    fn quantize_as(&self, ty: &Type, texel: Value) -> Result<Value, EvalError> {
        let basic = texel_kind(ty.basic)?;
        if texel.len() != 4 {
            return Err(EvalError::new(format!(
                "image texels have 4 components, got {}",
                texel.len()
            )));
        }
        let texel: Value = texel
            .into_iter()
            .map(|s| s.convert(basic))
            .collect::<Result<_, _>>()?;
        let quantized = match ty.layout.image_internal_format {
            ImageInternalFormat::R32f | ImageInternalFormat::R32i | ImageInternalFormat::R32ui => {
                let zero = Scalar::zero(basic).ok_or_else(|| EvalError::new("bad texel".to_string()))?;
                let one = Scalar::one(basic).ok_or_else(|| EvalError::new("bad texel".to_string()))?;
                vec![texel[0], zero, zero, one]
            }
            ImageInternalFormat::Rgba8 => texel
                .into_iter()
                .map(|s| match s {
                    Scalar::Float(x) => Scalar::Float((x.clamp(0.0, 1.0) * 255.0).round() / 255.0),
                    other => other,
                })
                .collect(),
            ImageInternalFormat::Rgba8i => texel
                .into_iter()
                .map(|s| match s {
                    Scalar::Int(x) => Scalar::Int(x as i8 as i32),
                    other => other,
                })
                .collect(),
            ImageInternalFormat::Rgba8ui => texel
                .into_iter()
                .map(|s| match s {
                    Scalar::UInt(x) => Scalar::UInt(x as u8 as u32),
                    other => other,
                })
                .collect(),
            ImageInternalFormat::Unspecified => texel,
        };
        Ok(quantized)
    }

    /// Convert an initializer to the declared type (scalars broadcast).
    fn coerce(&self, value: Value, ty: &Type) -> Result<Value, EvalError> {
        if ty.basic.is_opaque() {
            return Err(EvalError::new("initializer on an opaque variable".to_string()));
        }
        if value.len() == ty.size as usize {
            return Ok(value);
        }
        Err(EvalError::new(format!(
            "initializer has {} components, {} expects {}",
            value.len(),
            ty,
            ty.size
        )))
    }
}

// ─── Pure operations ───────────────────────────────────────────────

fn image_operand(args: &[Expr]) -> Result<VariableId, EvalError> {
    args.first()
        .and_then(Expr::as_symbol)
        .ok_or_else(|| EvalError::new("image operand must be a variable".to_string()))
}

fn texel_kind(image: BasicType) -> Result<BasicType, EvalError> {
    match image {
        BasicType::Image2D => Ok(BasicType::Float),
        BasicType::IImage2D => Ok(BasicType::Int),
        BasicType::UImage2D => Ok(BasicType::UInt),
        other => Err(EvalError::new(format!(
            "{} is not an image type",
            other.glsl_name(1)
        ))),
    }
}

fn construct(ty: &Type, components: Value) -> Result<Value, EvalError> {
    let size = ty.size as usize;
    let components: Value = components
        .into_iter()
        .map(|s| s.convert(ty.basic))
        .collect::<Result<_, _>>()?;
    match components.len() {
        1 => Ok(vec![components[0]; size]),
        n if n >= size => Ok(components[..size].to_vec()),
        n => Err(EvalError::new(format!(
            "{} constructed from {} components",
            ty.glsl_name(),
            n
        ))),
    }
}

/// Apply `f` per component, broadcasting a scalar operand.
fn componentwise(
    a: &[Scalar],
    b: &[Scalar],
    f: impl Fn(Scalar, Scalar) -> Result<Scalar, EvalError>,
) -> Result<Value, EvalError> {
    match (a.len(), b.len()) {
        (n, m) if n == m => a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect(),
        (1, _) => b.iter().map(|&y| f(a[0], y)).collect(),
        (_, 1) => a.iter().map(|&x| f(x, b[0])).collect(),
        (n, m) => Err(EvalError::new(format!(
            "component count mismatch: {} vs {}",
            n, m
        ))),
    }
}

fn unary(op: UnaryOp, s: Scalar) -> Result<Scalar, EvalError> {
    match (op, s) {
        (UnaryOp::Negate, Scalar::Float(x)) => Ok(Scalar::Float(-x)),
        (UnaryOp::Negate, Scalar::Int(x)) => Ok(Scalar::Int(x.wrapping_neg())),
        (UnaryOp::Negate, Scalar::UInt(x)) => Ok(Scalar::UInt(x.wrapping_neg())),
        (UnaryOp::LogicalNot, Scalar::Bool(x)) => Ok(Scalar::Bool(!x)),
        (UnaryOp::BitNot, Scalar::Int(x)) => Ok(Scalar::Int(!x)),
        (UnaryOp::BitNot, Scalar::UInt(x)) => Ok(Scalar::UInt(!x)),
        (op, s) => Err(EvalError::new(format!("cannot apply {:?} to {:?}", op, s))),
    }
}

fn scalar_binary(op: BinaryOp, a: Scalar, b: Scalar) -> Result<Scalar, EvalError> {
    use Scalar::{Float, Int, UInt};
    let result = match (op, a, b) {
        (BinaryOp::ShiftLeft, Int(x), amount) => Int(x.wrapping_shl(amount.as_shift_amount()?)),
        (BinaryOp::ShiftLeft, UInt(x), amount) => UInt(x.wrapping_shl(amount.as_shift_amount()?)),
        // Arithmetic for signed operands, logical for unsigned.
        (BinaryOp::ShiftRight, Int(x), amount) => Int(x.wrapping_shr(amount.as_shift_amount()?)),
        (BinaryOp::ShiftRight, UInt(x), amount) => UInt(x.wrapping_shr(amount.as_shift_amount()?)),

        (BinaryOp::Div, Int(_), Int(0)) | (BinaryOp::Div, UInt(_), UInt(0)) => {
            return Err(EvalError::new("integer division by zero".to_string()))
        }

        (BinaryOp::Add, Float(x), Float(y)) => Float(x + y),
        (BinaryOp::Sub, Float(x), Float(y)) => Float(x - y),
        (BinaryOp::Mul, Float(x), Float(y)) => Float(x * y),
        (BinaryOp::Div, Float(x), Float(y)) => Float(x / y),
        (BinaryOp::Add, Int(x), Int(y)) => Int(x.wrapping_add(y)),
        (BinaryOp::Sub, Int(x), Int(y)) => Int(x.wrapping_sub(y)),
        (BinaryOp::Mul, Int(x), Int(y)) => Int(x.wrapping_mul(y)),
        (BinaryOp::Div, Int(x), Int(y)) => Int(x.wrapping_div(y)),
        (BinaryOp::Add, UInt(x), UInt(y)) => UInt(x.wrapping_add(y)),
        (BinaryOp::Sub, UInt(x), UInt(y)) => UInt(x.wrapping_sub(y)),
        (BinaryOp::Mul, UInt(x), UInt(y)) => UInt(x.wrapping_mul(y)),
        (BinaryOp::Div, UInt(x), UInt(y)) => UInt(x / y),

        (BinaryOp::BitAnd, Int(x), Int(y)) => Int(x & y),
        (BinaryOp::BitOr, Int(x), Int(y)) => Int(x | y),
        (BinaryOp::BitXor, Int(x), Int(y)) => Int(x ^ y),
        (BinaryOp::BitAnd, UInt(x), UInt(y)) => UInt(x & y),
        (BinaryOp::BitOr, UInt(x), UInt(y)) => UInt(x | y),
        (BinaryOp::BitXor, UInt(x), UInt(y)) => UInt(x ^ y),

        (BinaryOp::Less, Float(x), Float(y)) => Scalar::Bool(x < y),
        (BinaryOp::Less, Int(x), Int(y)) => Scalar::Bool(x < y),
        (BinaryOp::Less, UInt(x), UInt(y)) => Scalar::Bool(x < y),
        (BinaryOp::Greater, Float(x), Float(y)) => Scalar::Bool(x > y),
        (BinaryOp::Greater, Int(x), Int(y)) => Scalar::Bool(x > y),
        (BinaryOp::Greater, UInt(x), UInt(y)) => Scalar::Bool(x > y),

        (op, a, b) => {
            return Err(EvalError::new(format!(
                "cannot apply '{}' to {:?} and {:?}",
                op.symbol(),
                a,
                b
            )))
        }
    };
    Ok(result)
}

fn scalar_min(a: Scalar, b: Scalar) -> Result<Scalar, EvalError> {
    match (a, b) {
        (Scalar::Float(x), Scalar::Float(y)) => Ok(Scalar::Float(x.min(y))),
        (Scalar::Int(x), Scalar::Int(y)) => Ok(Scalar::Int(x.min(y))),
        (Scalar::UInt(x), Scalar::UInt(y)) => Ok(Scalar::UInt(x.min(y))),
        (a, b) => Err(EvalError::new(format!("min({:?}, {:?})", a, b))),
    }
}

fn scalar_max(a: Scalar, b: Scalar) -> Result<Scalar, EvalError> {
    match (a, b) {
        (Scalar::Float(x), Scalar::Float(y)) => Ok(Scalar::Float(x.max(y))),
        (Scalar::Int(x), Scalar::Int(y)) => Ok(Scalar::Int(x.max(y))),
        (Scalar::UInt(x), Scalar::UInt(y)) => Ok(Scalar::UInt(x.max(y))),
        (a, b) => Err(EvalError::new(format!("max({:?}, {:?})", a, b))),
    }
}

fn pure_builtin(func: BuiltInFn, args: &[Value]) -> Result<Value, EvalError> {
    match (func, args) {
        (BuiltInFn::Floor, [x]) => x
            .iter()
            .map(|s| match s {
                Scalar::Float(v) => Ok(Scalar::Float(v.floor())),
                other => Err(EvalError::new(format!("floor({:?})", other))),
            })
            .collect(),
        (BuiltInFn::Min, [a, b]) => componentwise(a, b, scalar_min),
        (BuiltInFn::Max, [a, b]) => componentwise(a, b, scalar_max),
        (BuiltInFn::Clamp, [x, lo, hi]) => {
            let raised = componentwise(x, lo, scalar_max)?;
            componentwise(&raised, hi, scalar_min)
        }
        (BuiltInFn::PackUnorm4x8, [v]) => {
            if v.len() != 4 {
                return Err(EvalError::new("packUnorm4x8 takes a vec4".to_string()));
            }
            let mut packed = 0u32;
            for (i, s) in v.iter().enumerate() {
                let Scalar::Float(c) = s else {
                    return Err(EvalError::new(format!("packUnorm4x8 of {:?}", s)));
                };
                let byte = (c.clamp(0.0, 1.0) * 255.0).round() as u32;
                packed |= byte << (8 * i);
            }
            Ok(vec![Scalar::UInt(packed)])
        }
        (BuiltInFn::UnpackUnorm4x8, [v]) => match v.as_slice() {
            [Scalar::UInt(packed)] => {
                let packed = *packed;
                Ok((0..4u32)
                    .map(|i| Scalar::Float(((packed >> (8 * i)) & 0xff) as f32 / 255.0))
                    .collect())
            }
            other => Err(EvalError::new(format!("unpackUnorm4x8 of {:?}", other))),
        },
        (func, args) => Err(EvalError::new(format!(
            "{} does not take {} arguments",
            func.name(),
            args.len()
        ))),
    }
}
