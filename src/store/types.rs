//! Core value types shared by the declaration table, the analysis pipeline,
//! and the runtime engine.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// The identity of a declared type. Names are fully qualified by the discovery tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(pub String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

/// A position in the source text the declaration was scanned from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The structural kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeKind {
    Interface,
    #[default]
    Class,
    AbstractClass,
    /// Structs, enums and other by-value types. Never injectable.
    ValueType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    Singleton,
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("Singleton"),
            Lifetime::Transient => f.write_str("Transient"),
        }
    }
}

/// The DI role derived for a type. Exactly one variant applies; `HostAndUser`
/// is the only dual role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Service,
    Host,
    User,
    HostAndUser,
    Scope,
    None,
}

impl Role {
    pub fn provides(self) -> bool { matches!(self, Role::Host | Role::HostAndUser) }
    pub fn injects(self) -> bool { matches!(self, Role::User | Role::HostAndUser) }

    /// Roles whose instances live in the hierarchy and rely on attach/detach.
    pub fn is_hierarchy_role(self) -> bool {
        matches!(self, Role::Host | Role::User | Role::HostAndUser | Role::Scope)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Service => "Service",
            Role::Host => "Host",
            Role::User => "User",
            Role::HostAndUser => "HostAndUser",
            Role::Scope => "Scope",
            Role::None => "None",
        };
        f.write_str(s)
    }
}

// --- Capability Flags ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Scope,
    ServicesReady,
    HierarchyMember,
}

impl Capability {
    const ALL: [Capability; 3] = [Capability::Scope, Capability::ServicesReady, Capability::HierarchyMember];

    fn bit(self) -> u8 {
        match self {
            Capability::Scope => 0b001,
            Capability::ServicesReady => 0b010,
            Capability::HierarchyMember => 0b100,
        }
    }
}

/// Capability bit-set. Serialized as a list of capability names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);

    pub fn with(mut self, cap: Capability) -> Self {
        self.0 |= cap.bit();
        self
    }

    pub fn contains(&self, cap: Capability) -> bool { self.0 & cap.bit() != 0 }

    pub fn union(self, other: Capabilities) -> Self { Capabilities(self.0 | other.0) }
}

impl From<Vec<Capability>> for Capabilities {
    fn from(caps: Vec<Capability>) -> Self {
        caps.into_iter().fold(Capabilities::NONE, Capabilities::with)
    }
}

impl From<Capabilities> for Vec<Capability> {
    fn from(caps: Capabilities) -> Self {
        Capability::ALL.into_iter().filter(|c| caps.contains(*c)).collect()
    }
}

// --- Declarative Markers ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMarker {
    pub lifetime: Lifetime,
    /// Empty means "the service type itself".
    #[serde(default)]
    pub exposes: Vec<TypeName>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesMarker {
    #[serde(default)]
    pub instantiate: Vec<TypeName>,
    #[serde(default)]
    pub expect: Vec<TypeName>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvideMarker {
    /// Empty means "the member's declared type".
    #[serde(default)]
    pub exposes: Vec<TypeName>,
}

// --- Declarations ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeName,
    #[serde(default)]
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorDecl {
    #[serde(default)]
    pub is_static: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub designated: bool,
    #[serde(default)]
    pub params: SmallVec<[ParamDecl; 4]>,
    #[serde(default)]
    pub location: Location,
}

impl Default for CtorDecl {
    fn default() -> Self {
        Self { is_static: false, is_public: true, designated: false, params: SmallVec::new(), location: Location::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Field { read_only: bool },
    Property { has_setter: bool },
}

impl MemberKind {
    pub fn is_writable(&self) -> bool {
        match *self {
            MemberKind::Field { read_only } => !read_only,
            MemberKind::Property { has_setter } => has_setter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub name: String,
    pub ty: TypeName,
    pub kind: MemberKind,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub provide: Option<ProvideMarker>,
    #[serde(default)]
    pub inject: bool,
    #[serde(default)]
    pub location: Location,
}

/// Raw declarative facts about one type, as handed over by the discovery tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDecl {
    pub name: TypeName,
    pub kind: TypeKind,
    /// Whether the declaration can be partitioned across source files.
    pub extensible: bool,
    pub open_generic: bool,
    /// Direct base class and implemented interfaces.
    pub bases: Vec<TypeName>,
    pub service: Vec<ServiceMarker>,
    pub host: bool,
    pub user: bool,
    pub modules: Option<ModulesMarker>,
    pub auto_scan: bool,
    pub capabilities: Capabilities,
    pub constructors: Vec<CtorDecl>,
    pub members: Vec<MemberDecl>,
    pub location: Location,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self { name: TypeName::new(name), kind, ..Default::default() }
    }

    pub fn has(&self, cap: Capability) -> bool { self.capabilities.contains(cap) }

    /// Whether any DI marker or capability is present on the type or its members.
    pub fn is_di_relevant(&self) -> bool {
        !self.service.is_empty()
            || self.host
            || self.user
            || self.modules.is_some()
            || self.auto_scan
            || self.has(Capability::Scope)
            || self.has(Capability::ServicesReady)
            || self.constructors.iter().any(|c| c.designated)
            || self.members.iter().any(|m| m.inject || m.provide.is_some())
    }
}

/// The classification result for one type. Produced once per analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredType {
    pub name: TypeName,
    pub role: Role,
    /// Only set for `Role::Service`.
    pub lifetime: Option<Lifetime>,
    pub hierarchy_member: bool,
    pub services_ready: bool,
}

fn default_true() -> bool { true }
