use std::fmt;

use serde::{Deserialize, Serialize};

/// Heap value types understood by the virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Bool,
    Int,
    UInt,
    Float,
    String,
    Vector3,
    Object,
    GameObject,
    Player,
    Other(String),
}

impl VarType {
    /// Name of the type as written in assembly.
    pub fn vm_name(&self) -> &str {
        match self {
            VarType::Bool => "SystemBoolean",
            VarType::Int => "SystemInt32",
            VarType::UInt => "SystemUInt32",
            VarType::Float => "SystemSingle",
            VarType::String => "SystemString",
            VarType::Vector3 => "Vector3",
            VarType::Object => "SystemObject",
            VarType::GameObject => "GameObject",
            VarType::Player => "PlayerApi",
            VarType::Other(name) => name,
        }
    }

    /// Whether values of this type can be replicated over the network.
    pub fn is_syncable(&self) -> bool {
        matches!(
            self,
            VarType::Bool
                | VarType::Int
                | VarType::UInt
                | VarType::Float
                | VarType::String
                | VarType::Vector3
        )
    }

    pub fn default_value(&self) -> Value {
        match self {
            VarType::Bool => Value::Bool(false),
            VarType::Int => Value::Int(0),
            VarType::UInt => Value::UInt(0),
            VarType::Float => Value::Float(0.0),
            VarType::String => Value::Null,
            VarType::Vector3 => Value::Vector3([0.0, 0.0, 0.0]),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vm_name())
    }
}

/// Literal values stored in the heap.
///
/// `This`, `Label` and `Method` are compiler-produced: `This` is the owning
/// object, `Label` becomes the address of a code label once addresses are
/// resolved, and `Method` names a method the VM may invoke by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Str(String),
    Vector3([f32; 3]),
    This,
    Label(String),
    Method(String),
}

impl Value {
    /// Key used to pool value-identified constants.
    pub fn pool_key(&self, ty: &VarType) -> String {
        format!("{}|{:?}", ty.vm_name(), self)
    }

    /// Best-effort type of a literal when the slot does not say.
    pub fn natural_type(&self) -> VarType {
        match self {
            Value::Bool(_) => VarType::Bool,
            Value::Int(_) => VarType::Int,
            Value::UInt(_) | Value::Label(_) => VarType::UInt,
            Value::Float(_) => VarType::Float,
            Value::Str(_) | Value::Method(_) => VarType::String,
            Value::Vector3(_) => VarType::Vector3,
            Value::This => VarType::GameObject,
            Value::Null => VarType::Object,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "0x{:08X}", u),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) | Value::Method(s) => write!(f, "{:?}", s),
            Value::Vector3([x, y, z]) => write!(f, "({:?}, {:?}, {:?})", x, y, z),
            Value::This => write!(f, "this"),
            Value::Label(l) => write!(f, "&{}", l),
        }
    }
}
