//! Values passed to script constructors and editor property metadata

use crate::instance::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value that can be passed to a script constructor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Vector2 value
    Vec2([f32; 2]),
    /// Vector3 value
    Vec3([f32; 3]),
    /// Entity reference
    Entity(EntityId),
    /// Array of values
    Array(Vec<ScriptValue>),
    /// Nested object
    Object(HashMap<String, ScriptValue>),
}

impl ScriptValue {
    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(v) => Some(*v),
            ScriptValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ScriptValue::Float(v) => Some(*v),
            ScriptValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as entity reference
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            ScriptValue::Entity(v) => Some(*v),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Vec2(_) => "vec2",
            ScriptValue::Vec3(_) => "vec3",
            ScriptValue::Entity(_) => "entity",
            ScriptValue::Array(_) => "array",
            ScriptValue::Object(_) => "object",
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        ScriptValue::Bool(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        ScriptValue::Int(v)
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        ScriptValue::Float(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        ScriptValue::String(v.to_string())
    }
}

impl From<EntityId> for ScriptValue {
    fn from(v: EntityId) -> Self {
        ScriptValue::Entity(v)
    }
}

/// Positional accessors for constructor argument lists
pub trait ScriptArgs {
    /// Get a bool argument
    fn bool_arg(&self, index: usize) -> Option<bool>;
    /// Get an int argument
    fn int_arg(&self, index: usize) -> Option<i64>;
    /// Get a float argument
    fn float_arg(&self, index: usize) -> Option<f64>;
    /// Get a string argument
    fn str_arg(&self, index: usize) -> Option<&str>;
    /// Get an entity argument
    fn entity_arg(&self, index: usize) -> Option<EntityId>;
}

impl ScriptArgs for [ScriptValue] {
    fn bool_arg(&self, index: usize) -> Option<bool> {
        self.get(index).and_then(|v| v.as_bool())
    }

    fn int_arg(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(|v| v.as_int())
    }

    fn float_arg(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    fn str_arg(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_str())
    }

    fn entity_arg(&self, index: usize) -> Option<EntityId> {
        self.get(index).and_then(|v| v.as_entity())
    }
}

/// Editor-visible property declared by an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorProperty {
    /// Property name
    pub name: String,
    /// Property kind
    pub kind: PropertyKind,
    /// Tooltip/description
    pub description: Option<String>,
    /// Default value
    pub default: Option<ScriptValue>,
    /// Minimum value (for numeric kinds)
    pub min: Option<f64>,
    /// Maximum value (for numeric kinds)
    pub max: Option<f64>,
}

impl EditorProperty {
    /// Create a property with no limits or default
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            default: None,
            min: None,
            max: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<ScriptValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set numeric limits
    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// Editor property kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
    Vec3,
    Entity,
    File,
}

impl Default for PropertyKind {
    fn default() -> Self {
        PropertyKind::String
    }
}
