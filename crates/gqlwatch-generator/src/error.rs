//! Generator error types.

use thiserror::Error;

/// Structural errors raised while building or emitting generated code.
///
/// Every variant carries the path of the offending document so callers can
/// render it with file context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// A selection references a field the parent type does not define.
    #[error("Field \"{field_name}\" not found on type \"{type_name}\" in {path}")]
    FieldNotFound {
        type_name: String,
        field_name: String,
        path: String,
    },

    /// A type condition, variable or root references an unknown type.
    #[error("Type \"{type_name}\" not found in {path}")]
    TypeNotFound { type_name: String, path: String },

    /// A spread references a fragment that is not defined anywhere.
    #[error("Fragment \"{fragment_name}\" not found in {path}")]
    FragmentNotFound { fragment_name: String, path: String },

    /// Two documents define an operation or fragment with the same name.
    #[error("\"{name}\" is defined in both {first_path} and {second_path}")]
    DuplicateDefinition {
        name: String,
        first_path: String,
        second_path: String,
    },
}

impl GeneratorError {
    pub fn field_not_found(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::FieldNotFound {
            type_name: type_name.into(),
            field_name: field_name.into(),
            path: path.into(),
        }
    }

    pub fn type_not_found(type_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_name: type_name.into(),
            path: path.into(),
        }
    }

    pub fn fragment_not_found(fragment_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::FragmentNotFound {
            fragment_name: fragment_name.into(),
            path: path.into(),
        }
    }

    /// Path of the document the error should be reported against.
    pub fn path(&self) -> &str {
        match self {
            Self::FieldNotFound { path, .. }
            | Self::TypeNotFound { path, .. }
            | Self::FragmentNotFound { path, .. } => path,
            Self::DuplicateDefinition { second_path, .. } => second_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_display() {
        let err = GeneratorError::field_not_found("User", "nickname", "src/user.graphql");
        assert_eq!(err.path(), "src/user.graphql");
        assert_eq!(
            err.to_string(),
            "Field \"nickname\" not found on type \"User\" in src/user.graphql"
        );

        let err = GeneratorError::DuplicateDefinition {
            name: "User".into(),
            first_path: "a.graphql".into(),
            second_path: "b.graphql".into(),
        };
        assert_eq!(err.path(), "b.graphql");
    }
}
