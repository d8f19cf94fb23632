//! Script roles and type classification
//!
//! A loaded type declares which role contracts it implements through its
//! [`Capabilities`] table. Classification reads that table once; it never
//! matches on type names.

use crate::error::{BridgeError, Result};
use crate::script_type::ScriptType;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of roles a script type can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptRole {
    /// Not a script, or "any role" when used as a lookup scope
    Unknown,
    Entity,
    Actor,
    GameRules,
    FlowNode,
    UIEventSystem,
    ScriptCompiler,
}

impl ScriptRole {
    /// Number of roles
    pub const COUNT: usize = 7;

    /// All roles in enumeration order
    pub const ALL: [ScriptRole; Self::COUNT] = [
        ScriptRole::Unknown,
        ScriptRole::Entity,
        ScriptRole::Actor,
        ScriptRole::GameRules,
        ScriptRole::FlowNode,
        ScriptRole::UIEventSystem,
        ScriptRole::ScriptCompiler,
    ];

    /// Position in enumeration order
    pub fn index(self) -> usize {
        self as usize
    }

    /// `Unknown` as a lookup scope means every bucket
    pub fn is_any(self) -> bool {
        self == ScriptRole::Unknown
    }

    /// Roles selected by this scope, in enumeration order
    pub fn scope(self) -> &'static [ScriptRole] {
        if self.is_any() {
            &ROLE_TABLE
        } else {
            std::slice::from_ref(&ROLE_TABLE[self.index()])
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            ScriptRole::Unknown => "Unknown",
            ScriptRole::Entity => "Entity",
            ScriptRole::Actor => "Actor",
            ScriptRole::GameRules => "GameRules",
            ScriptRole::FlowNode => "FlowNode",
            ScriptRole::UIEventSystem => "UIEventSystem",
            ScriptRole::ScriptCompiler => "ScriptCompiler",
        }
    }
}

static ROLE_TABLE: [ScriptRole; ScriptRole::COUNT] = ScriptRole::ALL;

impl Default for ScriptRole {
    fn default() -> Self {
        ScriptRole::Unknown
    }
}

impl fmt::Display for ScriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for ScriptRole {
    type Error = BridgeError;

    fn try_from(value: i32) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| {
                BridgeError::InvalidArgument(format!("role value {} is not a defined script role", value))
            })
    }
}

bitflags! {
    /// Contracts and markers a loaded type declares
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Base script-instance contract
        const SCRIPT_INSTANCE = 1 << 0;
        const ENTITY = 1 << 1;
        const ACTOR = 1 << 2;
        const GAME_RULES = 1 << 3;
        const FLOW_NODE = 1 << 4;
        const UI_EVENT_SYSTEM = 1 << 5;
        const SCRIPT_COMPILER = 1 << 6;

        /// Opt out of loader dispatch and member processing
        const EXCLUDE_FROM_COMPILATION = 1 << 8;
        /// Declares editor-visible properties
        const EDITOR_PROPERTIES = 1 << 9;
        /// Declares an editor extension form
        const EDITOR_EXTENSION = 1 << 10;
    }
}

/// Role contracts checked in priority order; Actor refines Entity so it wins.
const ROLE_PRIORITY: [(Capabilities, ScriptRole); 6] = [
    (Capabilities::SCRIPT_COMPILER, ScriptRole::ScriptCompiler),
    (Capabilities::ACTOR, ScriptRole::Actor),
    (Capabilities::ENTITY, ScriptRole::Entity),
    (Capabilities::GAME_RULES, ScriptRole::GameRules),
    (Capabilities::FLOW_NODE, ScriptRole::FlowNode),
    (Capabilities::UI_EVENT_SYSTEM, ScriptRole::UIEventSystem),
];

impl Capabilities {
    /// Role implied by the declared contracts
    pub fn role(self) -> ScriptRole {
        ROLE_PRIORITY
            .iter()
            .find(|(cap, _)| self.contains(*cap))
            .map(|(_, role)| *role)
            .unwrap_or(ScriptRole::Unknown)
    }
}

/// Outcome of classifying one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Registry bucket the type belongs to
    pub role: ScriptRole,
    /// Abstract or explicitly excluded; no loader runs
    pub excluded: bool,
}

impl Classification {
    /// Whether role loaders and member processing should run
    pub fn is_eligible(&self) -> bool {
        !self.excluded
    }
}

/// Determine a type's role. Pure inspection, no side effects.
pub fn classify(ty: &ScriptType) -> Classification {
    let caps = ty.capabilities();
    Classification {
        role: caps.role(),
        excluded: ty.is_abstract() || caps.contains(Capabilities::EXCLUDE_FROM_COMPILATION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_priority() {
        assert_eq!((Capabilities::ENTITY | Capabilities::ACTOR).role(), ScriptRole::Actor);
        assert_eq!(Capabilities::ENTITY.role(), ScriptRole::Entity);
        assert_eq!(Capabilities::SCRIPT_INSTANCE.role(), ScriptRole::Unknown);
        assert_eq!(Capabilities::EDITOR_PROPERTIES.role(), ScriptRole::Unknown);
        assert_eq!(
            (Capabilities::SCRIPT_COMPILER | Capabilities::FLOW_NODE).role(),
            ScriptRole::ScriptCompiler
        );
    }

    #[test]
    fn test_classify_excluded() {
        let ty = ScriptType::builder("NativeEntity")
            .capabilities(Capabilities::ENTITY | Capabilities::EXCLUDE_FROM_COMPILATION)
            .build();
        let class = classify(&ty);
        assert_eq!(class.role, ScriptRole::Entity);
        assert!(!class.is_eligible());

        let ty = ScriptType::builder("EntityBase")
            .capabilities(Capabilities::ENTITY)
            .abstract_type()
            .build();
        assert!(classify(&ty).excluded);

        let ty = ScriptType::builder("Door").capabilities(Capabilities::ENTITY).build();
        assert!(classify(&ty).is_eligible());
    }

    #[test]
    fn test_role_from_int() {
        assert_eq!(ScriptRole::try_from(0).unwrap(), ScriptRole::Unknown);
        assert_eq!(ScriptRole::try_from(3).unwrap(), ScriptRole::GameRules);
        assert!(matches!(ScriptRole::try_from(7), Err(BridgeError::InvalidArgument(_))));
        assert!(ScriptRole::try_from(-1).is_err());
    }

    #[test]
    fn test_scope() {
        assert_eq!(ScriptRole::Unknown.scope().len(), ScriptRole::COUNT);
        assert_eq!(ScriptRole::FlowNode.scope(), &[ScriptRole::FlowNode]);
    }
}
