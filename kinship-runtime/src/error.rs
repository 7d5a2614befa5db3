//! Error types for association loading and field projection.
//!
//! Every failure carries an [`ErrorCode`] for programmatic handling plus a
//! human readable message and optional suggestions.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: K{category}{number}
//! - 1xxx: Projection errors (unknown field, invalid selection, stubs)
//! - 2xxx: Association errors (loader failure, missing related entity)
//! - 7xxx: Configuration errors (incomplete descriptors, duplicate fields)
//!
//! ```rust
//! use kinship_runtime::{EntityError, ErrorCode};
//!
//! let err = EntityError::missing_loader("Post", "author");
//! assert_eq!(err.code, ErrorCode::MissingLoader);
//! assert!(err.is_configuration());
//! assert!(err.to_string().contains("author"));
//! ```
//!
//! # Loader Errors
//!
//! Errors returned by caller-supplied loaders are carried, never translated.
//! The original error object stays reachable through [`EntityError::loader_error`]:
//!
//! ```rust
//! use kinship_runtime::EntityError;
//!
//! let io = std::io::Error::new(std::io::ErrorKind::Other, "db down");
//! let err = EntityError::loader_failed("Post", "author", Box::new(io));
//! let original = err.loader_error().unwrap();
//! assert!(original.downcast_ref::<std::io::Error>().is_some());
//! ```

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

/// Boxed error returned by caller-supplied loaders and computed fields.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Projection errors (1xxx)
    /// Selection names a field the entity does not declare (K1001).
    UnknownField = 1001,
    /// Selection shape does not fit the field kind (K1002).
    InvalidSelection = 1002,
    /// Computed field declared but never implemented (K1003).
    NotImplemented = 1003,
    /// Computed field implementation failed (K1004).
    ComputedFieldFailed = 1004,

    // Association errors (2xxx)
    /// Caller-supplied loader failed (K2001).
    LoaderFailed = 2001,
    /// Required single association has no loaded counterpart (K2002).
    RelatedNotFound = 2002,
    /// Association name is not declared on the entity (K2003).
    UnknownAssociation = 2003,
    /// Slot still unresolved after its batch ran (K2004).
    Unresolved = 2004,

    // Configuration errors (7xxx)
    /// Descriptor has no getter (K7001).
    MissingGetter = 7001,
    /// Descriptor has no loader (K7002).
    MissingLoader = 7002,
    /// Descriptor has no setter (K7003).
    MissingSetter = 7003,
    /// A field name is declared twice (K7004).
    DuplicateField = 7004,
    /// Invalid configuration file or value (K7005).
    InvalidConfiguration = 7005,
}

impl ErrorCode {
    /// Get the error code string (e.g., "K7001").
    pub fn code(&self) -> String {
        format!("K{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownField => "Unknown field",
            Self::InvalidSelection => "Invalid selection",
            Self::NotImplemented => "Not implemented",
            Self::ComputedFieldFailed => "Computed field failed",
            Self::LoaderFailed => "Loader failed",
            Self::RelatedNotFound => "Related entity not found",
            Self::UnknownAssociation => "Unknown association",
            Self::Unresolved => "Association unresolved",
            Self::MissingGetter => "Missing getter",
            Self::MissingLoader => "Missing loader",
            Self::MissingSetter => "Missing setter",
            Self::DuplicateField => "Duplicate field",
            Self::InvalidConfiguration => "Invalid configuration",
        }
    }

    /// Whether this code denotes a configuration error.
    pub fn is_configuration(&self) -> bool {
        (*self as u16) / 1000 == 7
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The entity schema involved.
    pub entity: Option<String>,
    /// The field or relation involved.
    pub field: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Create new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entity.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add a suggestion.
    pub fn suggest(mut self, text: impl Into<String>) -> Self {
        self.suggestions.push(text.into());
        self
    }

    /// Set help text.
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Errors raised while resolving associations or projecting entities.
///
/// Cloning is cheap: the source error is shared, which lets one loader failure
/// reach every caller that was waiting on the same batch.
#[derive(Error, Debug, Clone)]
pub struct EntityError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl EntityError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.context.entity = Some(entity.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the source error.
    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(Arc::from(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a missing getter error.
    pub fn missing_getter(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::incomplete_descriptor(ErrorCode::MissingGetter, "getter", entity, relation)
    }

    /// Create a missing loader error.
    pub fn missing_loader(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::incomplete_descriptor(ErrorCode::MissingLoader, "loader", entity, relation)
    }

    /// Create a missing setter error.
    pub fn missing_setter(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::incomplete_descriptor(ErrorCode::MissingSetter, "setter", entity, relation)
            .with_suggestion("Supply `related_key` so the default setter can index loaded entities")
    }

    fn incomplete_descriptor(
        code: ErrorCode,
        part: &str,
        entity: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let relation = relation.into();
        Self::new(
            code,
            format!("Association {}.{} has no {}", entity, relation, part),
        )
        .with_entity(&entity)
        .with_field(&relation)
        .with_suggestion(format!(
            "Set the {} for `{}` inside `Schema::describe`",
            part, relation
        ))
    }

    /// Create a duplicate field error.
    pub fn duplicate_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::DuplicateField,
            format!("Field {}.{} is declared more than once", entity, field),
        )
        .with_entity(&entity)
        .with_field(&field)
    }

    /// Create an unknown field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownField,
            format!("{} has no field named `{}`", entity, field),
        )
        .with_entity(&entity)
        .with_field(&field)
        .with_help("Set `presentation.strict_selection = false` to skip unknown keys")
    }

    /// Create an invalid selection error.
    pub fn invalid_selection(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::InvalidSelection,
            format!("Invalid selection for {}.{}: {}", entity, field, message.into()),
        )
        .with_entity(&entity)
        .with_field(&field)
    }

    /// Create a not implemented error for a computed field stub.
    pub fn not_implemented(entity: impl Into<String>, field: impl Into<String>) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(
            ErrorCode::NotImplemented,
            format!("{}.{} is not implemented", entity, field),
        )
        .with_entity(&entity)
        .with_field(&field)
        .with_help("Register an implementation with `computed` or `computed_async`")
    }

    /// Create a computed field failure, keeping the original error as source.
    pub fn computed_failed(
        entity: impl Into<String>,
        field: impl Into<String>,
        source: BoxError,
    ) -> Self {
        let entity = entity.into();
        let field = field.into();
        Self::new(ErrorCode::ComputedFieldFailed, source.to_string())
            .with_entity(&entity)
            .with_field(&field)
            .with_source(source)
    }

    /// Create a loader failure, keeping the original error as source.
    ///
    /// The message is the loader's own message; nothing is added to it.
    pub fn loader_failed(
        entity: impl Into<String>,
        relation: impl Into<String>,
        source: BoxError,
    ) -> Self {
        let entity = entity.into();
        let relation = relation.into();
        Self::new(ErrorCode::LoaderFailed, source.to_string())
            .with_entity(&entity)
            .with_field(&relation)
            .with_source(source)
    }

    /// Create a related-not-found error for a required single association.
    pub fn related_not_found(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        let entity = entity.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::RelatedNotFound,
            format!(
                "Loader returned no entity for required association {}.{}",
                entity, relation
            ),
        )
        .with_entity(&entity)
        .with_field(&relation)
        .with_suggestion("Declare the association with `LoadDescriptor::optional` if it may be absent")
    }

    /// Create an unknown association error.
    pub fn unknown_association(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        let entity = entity.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::UnknownAssociation,
            format!("{} has no association named `{}`", entity, relation),
        )
        .with_entity(&entity)
        .with_field(&relation)
    }

    /// Create an unresolved error: the descriptor's filter skipped this entity.
    pub fn unresolved(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        let entity = entity.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::Unresolved,
            format!("Association {}.{} was not resolved by its batch", entity, relation),
        )
        .with_entity(&entity)
        .with_field(&relation)
        .with_help("A custom filter must select every entity whose slot is unresolved")
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    // ============== Predicates ==============

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.code.is_configuration()
    }

    /// Check if this error came from a caller-supplied loader.
    pub fn is_loader_failure(&self) -> bool {
        self.code == ErrorCode::LoaderFailed
    }

    /// Check if this is a not implemented error.
    pub fn is_not_implemented(&self) -> bool {
        self.code == ErrorCode::NotImplemented
    }

    /// The original loader error, if this error wraps one.
    pub fn loader_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        if self.is_loader_failure() {
            self.source.as_deref()
        } else {
            None
        }
    }

    /// Get the error code.
    pub fn error_code(&self) -> &ErrorCode {
        &self.code
    }

    /// Display the error with all context on multiple lines.
    pub fn display_full(&self) -> String {
        let mut output = format!("Error [{}]: {}", self.code.code(), self.message);

        if let Some(entity) = &self.context.entity {
            output.push_str(&format!("\n  Entity: {}", entity));
        }
        if let Some(field) = &self.context.field {
            output.push_str(&format!("\n  Field: {}", field));
        }
        if !self.context.suggestions.is_empty() {
            output.push_str("\n\nSuggestions:");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, suggestion));
            }
        }
        if let Some(help) = &self.context.help {
            output.push_str(&format!("\n\nHelp: {}", help));
        }

        output
    }
}
