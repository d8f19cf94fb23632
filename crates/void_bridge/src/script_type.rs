//! Reflectable type metadata exposed by loadable units
//!
//! A [`ScriptType`] is the type handle the registry keys on. It is built once
//! per loaded type and carries the capability table used for classification,
//! the role-specific metadata consumed by role loaders, and the constructor
//! used to create instances.

use crate::error::{BridgeError, Result};
use crate::instance::{panic_message, HookResult, InstanceContext, ScriptObject};
use crate::role::Capabilities;
use crate::value::{EditorProperty, ScriptValue};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Shared handle to a loaded type
pub type TypeHandle = Arc<ScriptType>;

/// Creates a script object from constructor arguments
pub type Constructor =
    Arc<dyn Fn(&InstanceContext, &[ScriptValue]) -> HookResult<Box<dyn ScriptObject>> + Send + Sync>;

/// Creates a compiler plugin with no arguments
pub type CompilerFactory = Arc<dyn Fn() -> HookResult<Box<dyn ScriptCompiler>> + Send + Sync>;

/// Console command handler
pub type CommandHandler = Arc<dyn Fn(&[String]) + Send + Sync>;

/// A compiler plugin produces further types to classify
pub trait ScriptCompiler: Send {
    /// Compile and return every type in the compiled output
    fn compile(&mut self) -> HookResult<Vec<TypeHandle>>;
}

/// Registry identity of a type: its namespace-qualified name
///
/// Stays the same when the unit declaring the type is reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    /// Build a key from an optional namespace and a type name
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Self(format!("{}.{}", ns, name)),
            _ => Self(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A static console command declared by a type
#[derive(Clone)]
pub struct ConsoleCommand {
    pub name: String,
    pub comment: String,
    pub handler: CommandHandler,
}

impl fmt::Debug for ConsoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleCommand")
            .field("name", &self.name)
            .field("comment", &self.comment)
            .finish()
    }
}

/// Metadata for one loaded type
pub struct ScriptType {
    key: TypeKey,
    name: String,
    namespace: Option<String>,
    capabilities: Capabilities,
    is_abstract: bool,
    category: Option<String>,
    registered_name: Option<String>,
    editor_helper: Option<String>,
    editor_icon: Option<String>,
    editor_properties: Vec<EditorProperty>,
    console_commands: Vec<ConsoleCommand>,
    constructor: Option<Constructor>,
    compiler: Option<CompilerFactory>,
}

impl ScriptType {
    /// Start describing a type
    pub fn builder(name: impl Into<String>) -> ScriptTypeBuilder {
        ScriptTypeBuilder::new(name)
    }

    /// Registry key
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Short type name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Declared contracts and markers
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Check whether the type declares all of `caps`
    pub fn implements(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Editor / flow-graph category
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Name to register under instead of the type name
    pub fn registered_name(&self) -> Option<&str> {
        self.registered_name.as_deref()
    }

    pub fn editor_helper(&self) -> Option<&str> {
        self.editor_helper.as_deref()
    }

    pub fn editor_icon(&self) -> Option<&str> {
        self.editor_icon.as_deref()
    }

    pub fn editor_properties(&self) -> &[EditorProperty] {
        &self.editor_properties
    }

    pub fn console_commands(&self) -> &[ConsoleCommand] {
        &self.console_commands
    }

    /// Whether instances can be constructed from this type
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some() && !self.is_abstract
    }

    /// Construct a new script object
    pub fn construct(&self, cx: &InstanceContext, args: &[ScriptValue]) -> Result<Box<dyn ScriptObject>> {
        if self.is_abstract {
            return Err(BridgeError::instantiation_failed(&self.name, "type is abstract"));
        }
        let constructor = self
            .constructor
            .as_ref()
            .ok_or_else(|| BridgeError::instantiation_failed(&self.name, "no constructor"))?;

        match panic::catch_unwind(AssertUnwindSafe(|| constructor(cx, args))) {
            Ok(Ok(object)) => Ok(object),
            Ok(Err(e)) => Err(BridgeError::instantiation_failed(&self.name, e.0)),
            Err(payload) => Err(BridgeError::instantiation_failed(&self.name, panic_message(payload.as_ref()))),
        }
    }

    /// Create the compiler plugin this type provides
    pub fn create_compiler(&self) -> Result<Box<dyn ScriptCompiler>> {
        let factory = self
            .compiler
            .as_ref()
            .ok_or_else(|| BridgeError::compiler_failed(&self.name, "type provides no compiler"))?;

        match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(compiler)) => Ok(compiler),
            Ok(Err(e)) => Err(BridgeError::compiler_failed(&self.name, e.0)),
            Err(payload) => Err(BridgeError::compiler_failed(&self.name, panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptType")
            .field("key", &self.key)
            .field("capabilities", &self.capabilities)
            .field("is_abstract", &self.is_abstract)
            .field("constructible", &self.constructor.is_some())
            .finish()
    }
}

/// Builder for [`ScriptType`]
pub struct ScriptTypeBuilder {
    name: String,
    namespace: Option<String>,
    capabilities: Capabilities,
    is_abstract: bool,
    category: Option<String>,
    registered_name: Option<String>,
    editor_helper: Option<String>,
    editor_icon: Option<String>,
    editor_properties: Vec<EditorProperty>,
    console_commands: Vec<ConsoleCommand>,
    constructor: Option<Constructor>,
    compiler: Option<CompilerFactory>,
}

impl ScriptTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            capabilities: Capabilities::empty(),
            is_abstract: false,
            category: None,
            registered_name: None,
            editor_helper: None,
            editor_icon: None,
            editor_properties: Vec::new(),
            console_commands: Vec::new(),
            constructor: None,
            compiler: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add declared contracts/markers
    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities |= caps;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn registered_name(mut self, name: impl Into<String>) -> Self {
        self.registered_name = Some(name.into());
        self
    }

    pub fn editor_helper(mut self, helper: impl Into<String>) -> Self {
        self.editor_helper = Some(helper.into());
        self
    }

    pub fn editor_icon(mut self, icon: impl Into<String>) -> Self {
        self.editor_icon = Some(icon.into());
        self
    }

    pub fn editor_property(mut self, property: EditorProperty) -> Self {
        self.capabilities |= Capabilities::EDITOR_PROPERTIES;
        self.editor_properties.push(property);
        self
    }

    pub fn console_command<F>(mut self, name: impl Into<String>, comment: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.console_commands.push(ConsoleCommand {
            name: name.into(),
            comment: comment.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&InstanceContext, &[ScriptValue]) -> HookResult<Box<dyn ScriptObject>> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    /// Use `T::default()` as the parameterless constructor
    pub fn default_constructor<T: ScriptObject + Default>(self) -> Self {
        self.constructor(|_, args| {
            if !args.is_empty() {
                return Err(format!("no constructor takes {} arguments", args.len()).into());
            }
            Ok(Box::new(T::default()))
        })
    }

    pub fn compiler<F>(mut self, f: F) -> Self
    where
        F: Fn() -> HookResult<Box<dyn ScriptCompiler>> + Send + Sync + 'static,
    {
        self.capabilities |= Capabilities::SCRIPT_COMPILER;
        self.compiler = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> TypeHandle {
        Arc::new(ScriptType {
            key: TypeKey::new(self.namespace.as_deref(), &self.name),
            name: self.name,
            namespace: self.namespace,
            capabilities: self.capabilities,
            is_abstract: self.is_abstract,
            category: self.category,
            registered_name: self.registered_name,
            editor_helper: self.editor_helper,
            editor_icon: self.editor_icon,
            editor_properties: self.editor_properties,
            console_commands: self.console_commands,
            constructor: self.constructor,
            compiler: self.compiler,
        })
    }
}
