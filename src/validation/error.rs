//! Defines the diagnostic records produced by the static analysis pipeline.
use crate::store::{Location, TypeName};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The broad area a diagnostic belongs to. Rendered as a single letter in ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Per-type classification and role constraints.
    Type,
    Constructor,
    Member,
    /// Module resolution, dependency resolution and cycles.
    Graph,
    Internal,
}

impl Category {
    pub fn letter(self) -> char {
        match self {
            Category::Type => 'T',
            Category::Constructor => 'C',
            Category::Member => 'M',
            Category::Graph => 'G',
            Category::Internal => 'E',
        }
    }
}

/// The specific rule a diagnostic reports.
///
// Matching on the kind is more robust than matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    LifetimeConflict,
    ServicesReadyRequiresUser,
    MarkerConflict,
    ServiceIsHierarchyMember,
    HierarchyMemberRequired,
    MissingModules,
    ConflictingModules,
    NotExtensible,
    DuplicateDeclaration,

    NoUsableConstructor,
    AmbiguousConstructor,
    InvalidConstructorParameter,
    DesignatedOnNonService,

    ProvideAndInject,
    ProvideRequiresHost,
    InjectRequiresUser,
    StaticMember,
    ExposedTypeNotImplemented,
    ExposedTypeShouldBeInterface,
    ProvidesServiceInstance,
    InjectMemberNotWritable,
    InvalidInjectType,

    ModuleEntryNotService,
    ModuleEntryNotHost,
    DuplicateProvider,
    UnresolvedDependency,
    CircularDependency,
    UnknownType,
    AutoScanSummary,

    InternalError,
}

impl DiagnosticKind {
    pub fn category(self) -> Category {
        use DiagnosticKind::*;
        match self {
            LifetimeConflict | ServicesReadyRequiresUser | MarkerConflict | ServiceIsHierarchyMember
            | HierarchyMemberRequired | MissingModules | ConflictingModules | NotExtensible
            | DuplicateDeclaration => Category::Type,
            NoUsableConstructor | AmbiguousConstructor | InvalidConstructorParameter | DesignatedOnNonService => {
                Category::Constructor
            }
            ProvideAndInject | ProvideRequiresHost | InjectRequiresUser | StaticMember | ExposedTypeNotImplemented
            | ExposedTypeShouldBeInterface | ProvidesServiceInstance | InjectMemberNotWritable
            | InvalidInjectType => Category::Member,
            ModuleEntryNotService | ModuleEntryNotHost | DuplicateProvider | UnresolvedDependency
            | CircularDependency | UnknownType | AutoScanSummary => Category::Graph,
            InternalError => Category::Internal,
        }
    }

    /// The numeric code within the category.
    pub fn code(self) -> u16 {
        use DiagnosticKind::*;
        match self {
            LifetimeConflict => 1,
            ServicesReadyRequiresUser => 2,
            MarkerConflict => 3,
            ServiceIsHierarchyMember => 4,
            HierarchyMemberRequired => 5,
            MissingModules => 6,
            ConflictingModules => 7,
            NotExtensible => 8,
            DuplicateDeclaration => 9,

            NoUsableConstructor => 1,
            AmbiguousConstructor => 2,
            InvalidConstructorParameter => 3,
            DesignatedOnNonService => 4,

            ProvideAndInject => 1,
            ProvideRequiresHost => 2,
            InjectRequiresUser => 3,
            StaticMember => 4,
            ExposedTypeNotImplemented => 5,
            ExposedTypeShouldBeInterface => 6,
            ProvidesServiceInstance => 7,
            InjectMemberNotWritable => 8,
            InvalidInjectType => 9,

            ModuleEntryNotService => 1,
            ModuleEntryNotHost => 2,
            DuplicateProvider => 3,
            UnresolvedDependency => 4,
            CircularDependency => 5,
            UnknownType => 6,
            AutoScanSummary => 7,

            InternalError => 1,
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::ExposedTypeShouldBeInterface => Severity::Warning,
            DiagnosticKind::AutoScanSummary => Severity::Info,
            _ => Severity::Error,
        }
    }

    /// The stable id, e.g. `C002`.
    pub fn id(self) -> String {
        format!("{}{:03}", self.category().letter(), self.code())
    }
}

/// A structured report from the static analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub kind: DiagnosticKind,
    pub category: char,
    pub code: u16,
    pub severity: Severity,
    /// The type the diagnostic is attached to. Error diagnostics exclude it from the graph.
    pub subject: TypeName,
    pub message: String,
    pub location: Location,
    #[serde(default)]
    pub additional_locations: Vec<Location>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: &TypeName, location: &Location, message: impl Into<String>) -> Self {
        Self {
            id: kind.id(),
            kind,
            category: kind.category().letter(),
            code: kind.code(),
            severity: kind.default_severity(),
            subject: subject.clone(),
            message: message.into(),
            location: location.clone(),
            additional_locations: Vec::new(),
        }
    }

    pub fn with_locations(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.additional_locations.extend(locations);
        self
    }

    pub fn is_error(&self) -> bool { self.severity == Severity::Error }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}: {} [{}] {}", self.location, level, self.id, self.message)
    }
}
