//! Plain-data descriptions of WebAssembly types.
//!
//! These mirror what the native engine reports about functions, globals,
//! memories and tables, but own no engine state:
//! - [`ValKind`]: the kind of a single value
//! - [`FuncType`], [`GlobalType`], [`MemoryType`], [`TableType`]
//! - [`ExternType`], [`ImportType`], [`ExportType`]: module interface entries

use std::fmt;

/// The kind of a WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValKind {
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
    /// 128-bit vector. Only ever reported by module introspection.
    V128,
    /// Nullable reference to a function.
    FuncRef,
    /// Nullable reference to an opaque host object.
    ExternRef,
}

impl ValKind {
    /// Returns `true` for the numeric kinds.
    pub fn is_num(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    /// Returns `true` for the reference kinds.
    pub fn is_ref(self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }
}

impl fmt::Display for ValKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::V128 => "v128",
            Self::FuncRef => "funcref",
            Self::ExternRef => "externref",
        };
        f.write_str(name)
    }
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    params: Vec<ValKind>,
    results: Vec<ValKind>,
}

impl FuncType {
    /// Create a signature from parameter and result kinds.
    pub fn new(
        params: impl IntoIterator<Item = ValKind>,
        results: impl IntoIterator<Item = ValKind>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// Parameter kinds, in order.
    pub fn params(&self) -> &[ValKind] {
        &self.params
    }

    /// Result kinds, in order.
    pub fn results(&self) -> &[ValKind] {
        &self.results
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, ")")
    }
}

/// Whether a global may be written after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// Immutable global.
    Const,
    /// Mutable global.
    Var,
}

/// Type of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    /// Kind of the stored value.
    pub content: ValKind,
    /// Whether `set` is allowed.
    pub mutability: Mutability,
}

impl GlobalType {
    /// Create a global type.
    pub fn new(content: ValKind, mutability: Mutability) -> Self {
        Self {
            content,
            mutability,
        }
    }
}

/// Size limits of a memory (in pages) or a table (in elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Initial size.
    pub min: u64,
    /// Maximum size, `None` if unbounded.
    pub max: Option<u64>,
}

impl Limits {
    /// Create limits.
    pub fn new(min: u64, max: Option<u64>) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `size` lies within these limits.
    pub fn contains(&self, size: u64) -> bool {
        size >= self.min && self.max.is_none_or(|max| size <= max)
    }
}

/// Type of a linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    /// Limits in 64 KiB pages.
    pub limits: Limits,
    /// Whether the memory is indexed with 64-bit addresses.
    pub is_64: bool,
}

impl MemoryType {
    /// Create a 32-bit memory type.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self {
            limits: Limits::new(u64::from(min), max.map(u64::from)),
            is_64: false,
        }
    }

    /// Create a 64-bit memory type.
    pub fn new64(min: u64, max: Option<u64>) -> Self {
        Self {
            limits: Limits::new(min, max),
            is_64: true,
        }
    }
}

/// Type of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    /// Element kind, either [`ValKind::FuncRef`] or [`ValKind::ExternRef`].
    pub element: ValKind,
    /// Limits in elements.
    pub limits: Limits,
}

impl TableType {
    /// Create a table type.
    pub fn new(element: ValKind, min: u32, max: Option<u32>) -> Self {
        Self {
            element,
            limits: Limits::new(u64::from(min), max.map(u64::from)),
        }
    }
}

/// Type of anything that can be imported or exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// A function.
    Func(FuncType),
    /// A global.
    Global(GlobalType),
    /// A linear memory.
    Memory(MemoryType),
    /// A table.
    Table(TableType),
}

impl ExternType {
    /// Short name of the extern kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Func(_) => "func",
            Self::Global(_) => "global",
            Self::Memory(_) => "memory",
            Self::Table(_) => "table",
        }
    }
}

impl From<FuncType> for ExternType {
    fn from(ty: FuncType) -> Self {
        Self::Func(ty)
    }
}

impl From<GlobalType> for ExternType {
    fn from(ty: GlobalType) -> Self {
        Self::Global(ty)
    }
}

impl From<MemoryType> for ExternType {
    fn from(ty: MemoryType) -> Self {
        Self::Memory(ty)
    }
}

impl From<TableType> for ExternType {
    fn from(ty: TableType) -> Self {
        Self::Table(ty)
    }
}

/// A module import: `module`, `name` and the expected type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportType {
    /// Module namespace of the import.
    pub module: String,
    /// Field name of the import.
    pub name: String,
    /// Expected type.
    pub ty: ExternType,
}

/// A module export: `name` and its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportType {
    /// Export name.
    pub name: String,
    /// Exported type.
    pub ty: ExternType,
}
