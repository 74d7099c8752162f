//! Symbol table: the single owner of every variable and function identity
//! referenced from the tree.

use std::collections::BTreeMap;

use super::types::{BasicType, Precision, Qualifier, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// Where a symbol's name came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Declared in the shader source.
    User,
    /// Minted by a pass.
    Temp,
    /// Predeclared by the language (`gl_FragCoord`, ...).
    BuiltIn,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
}

/// Prefix of pass-minted temporaries. User identifiers are never allowed to
/// start with it, so temporaries cannot collide with them.
pub const TEMP_VARIABLE_PREFIX: &str = "_t";

#[derive(Clone, Debug)]
pub struct SymbolTable {
    variables: Vec<Variable>,
    functions: Vec<String>,
    builtins: BTreeMap<&'static str, VariableId>,
    temp_counter: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            variables: Vec::new(),
            functions: Vec::new(),
            builtins: BTreeMap::new(),
            temp_counter: 0,
        };
        table.declare_builtin(
            "gl_FragCoord",
            Type::vec4()
                .with_precision(Precision::High)
                .with_qualifier(Qualifier::BuiltIn),
        );
        table.declare_builtin(
            "gl_FrontFacing",
            Type::scalar(BasicType::Bool).with_qualifier(Qualifier::BuiltIn),
        );
        table
    }

    fn push(&mut self, name: String, kind: SymbolKind, ty: Type) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        self.variables.push(Variable { id, name, kind, ty });
        id
    }

    fn declare_builtin(&mut self, name: &'static str, ty: Type) {
        let id = self.push(name.to_string(), SymbolKind::BuiltIn, ty);
        self.builtins.insert(name, id);
    }

    /// Declare a variable written in the shader source.
    pub fn declare(&mut self, name: &str, ty: Type) -> VariableId {
        self.push(name.to_string(), SymbolKind::User, ty)
    }

    /// Mint a fresh temporary of the given type.
    pub fn create_temp(&mut self, ty: Type) -> VariableId {
        let name = format!("{}{}", TEMP_VARIABLE_PREFIX, self.temp_counter);
        self.temp_counter += 1;
        self.push(name, SymbolKind::Temp, ty)
    }

    /// Mint a new identity for `original` with a different type, keeping its
    /// name and kind. Used when a declaration is replaced in place.
    pub fn create_replacement(&mut self, original: VariableId, ty: Type) -> VariableId {
        let (name, kind) = {
            let var = self.get(original);
            (var.name.clone(), var.kind)
        };
        self.push(name, kind, ty)
    }

    /// Mint a copy of `original` under a new identity (same name, same type).
    pub fn clone_variable(&mut self, original: VariableId) -> VariableId {
        let ty = self.get(original).ty;
        self.create_replacement(original, ty)
    }

    pub fn declare_function(&mut self, name: &str) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(name.to_string());
        id
    }

    pub fn get(&self, id: VariableId) -> &Variable {
        match self.variables.get(id.0 as usize) {
            Some(var) => var,
            None => panic!("internal error: unknown variable id {}", id.0),
        }
    }

    pub fn ty(&self, id: VariableId) -> &Type {
        &self.get(id).ty
    }

    pub fn name(&self, id: VariableId) -> &str {
        &self.get(id).name
    }

    pub fn function_name(&self, id: FunctionId) -> &str {
        match self.functions.get(id.0 as usize) {
            Some(name) => name,
            None => panic!("internal error: unknown function id {}", id.0),
        }
    }

    pub fn builtin(&self, name: &str) -> VariableId {
        match self.builtins.get(name) {
            Some(&id) => id,
            None => panic!("internal error: unknown built-in variable '{}'", name),
        }
    }

    pub fn is_builtin(&self, id: VariableId) -> bool {
        self.get(id).kind == SymbolKind::BuiltIn
    }
}
