//! Validation of executable documents against a [`Schema`].
//!
//! Messages follow the wording of the GraphQL reference implementation so
//! that reports read the same as in other GraphQL tooling.

mod rules;

use async_graphql_parser::Pos;
use async_graphql_parser::types::ExecutableDocument;
use serde::Serialize;

use crate::document::parse_executable;
use crate::error::GraphQLError;
use crate::schema::Schema;

/// A position in the validated source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub locations: Vec<Location>,
}

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>, positions: impl IntoIterator<Item = Pos>) -> Self {
        Self {
            message: message.into(),
            locations: positions.into_iter().map(Location::from).collect(),
        }
    }
}

/// Validates `document` against `schema`. An empty result means valid.
pub fn validate(schema: &Schema, document: &ExecutableDocument) -> Vec<ValidationError> {
    rules::Validator::new(schema, document).run()
}

/// Parses and validates `source` in one step.
///
/// Syntax errors are returned as `Err`, validation failures as `Ok` with a
/// non-empty list.
pub fn validate_source(
    schema: &Schema,
    path: &str,
    source: &str,
) -> Result<Vec<ValidationError>, GraphQLError> {
    let document = parse_executable(source).map_err(|e| GraphQLError::parse(path, e.to_string()))?;
    Ok(validate(schema, &document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::TEST_SDL;

    fn messages(source: &str) -> Vec<String> {
        let schema = Schema::parse(TEST_SDL).unwrap();
        validate_source(&schema, "test.graphql", source)
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    fn assert_valid(source: &str) {
        let errors = messages(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_valid_operation_with_fragments() {
        assert_valid(
            r#"
query User($id: ID!, $first: Int!) {
  user(id: $id) {
    ...UserFields
    friends(first: $first) { __typename id }
  }
  search(text: "x") {
    ... on User { name }
    ... on Post { title author { ...UserFields } }
  }
  node(id: $id) { id ... on User { role } }
}

fragment UserFields on User {
  id
  name @include(if: true)
  email
}
"#,
        );
    }

    #[test]
    fn test_valid_mutation_with_input() {
        assert_valid(
            "mutation Create($input: PostInput!) { createPost(input: $input) { id title } }",
        );
    }

    #[test]
    fn test_introspection_fields() {
        assert_valid("query Meta { __typename __schema { types { name } } }");
    }

    #[test]
    fn test_unknown_field() {
        assert_eq!(
            messages("query Q { user(id: 1) { id nickname } }"),
            vec![r#"Cannot query field "nickname" on type "User"."#]
        );
    }

    #[test]
    fn test_field_on_union_requires_fragment() {
        assert_eq!(
            messages("query Q { search(text: \"a\") { id } }"),
            vec![r#"Cannot query field "id" on type "SearchResult"."#]
        );
    }

    #[test]
    fn test_arguments() {
        assert_eq!(
            messages("query Q { user(id: 1, verbose: true) { id } posts { id } }"),
            vec![r#"Unknown argument "verbose" on field "Query.user"."#]
        );
        assert_eq!(
            messages("query Q { user { id } }"),
            vec![r#"Field "user" argument "id" of type "ID!" is required, but it was not provided."#]
        );
    }

    #[test]
    fn test_selection_shape() {
        assert_eq!(
            messages("query Q { user(id: 1) }"),
            vec![
                r#"Field "user" of type "User" must have a selection of subfields. Did you mean "user { ... }"?"#
            ]
        );
        assert_eq!(
            messages("query Q { user(id: 1) { name { first } } }"),
            vec![r#"Field "name" must not have a selection since type "String" has no subfields."#]
        );
    }

    #[test]
    fn test_unknown_fragment() {
        assert_eq!(
            messages("query Q { user(id: 1) { ...Missing } }"),
            vec![r#"Unknown fragment "Missing"."#]
        );
    }

    #[test]
    fn test_unused_fragment() {
        assert_eq!(
            messages("query Q { posts { id } }\nfragment Extra on User { id }"),
            vec![r#"Fragment "Extra" is never used."#]
        );
    }

    #[test]
    fn test_fragment_type_conditions() {
        assert_eq!(
            messages("query Q { user(id: 1) { ...F } }\nfragment F on Ghost { id }"),
            vec![r#"Unknown type "Ghost"."#]
        );
        assert_eq!(
            messages("query Q { user(id: 1) { ...F } }\nfragment F on Role { id }"),
            vec![r#"Fragment "F" cannot condition on non composite type "Role"."#]
        );
        assert_eq!(
            messages("query Q { user(id: 1) { ...F } }\nfragment F on Post { id }"),
            vec![
                r#"Fragment "F" cannot be spread here as objects of type "User" can never be of type "Post"."#
            ]
        );
    }

    #[test]
    fn test_fragment_cycles() {
        let errors = messages(
            "query Q { user(id: 1) { ...A } }\nfragment A on User { ...B }\nfragment B on User { ...A }",
        );
        assert_eq!(
            errors,
            vec![r#"Cannot spread fragment "A" within itself via "B"."#]
        );

        let errors = messages("query Q { user(id: 1) { ...A } }\nfragment A on User { id ...A }");
        assert_eq!(errors, vec![r#"Cannot spread fragment "A" within itself."#]);
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            messages("query Q { user(id: $id) { id } }"),
            vec![r#"Variable "$id" is not defined by operation "Q"."#]
        );
        assert_eq!(
            messages("query Q($id: ID!, $unused: Int) { user(id: $id) { id } }"),
            vec![r#"Variable "$unused" is never used in operation "Q"."#]
        );
        assert_eq!(
            messages("query Q($id: ID!, $id: ID!) { user(id: $id) { id } }"),
            vec![r#"There can be only one variable named "$id"."#]
        );
        assert_eq!(
            messages("query Q($u: User) { posts { id } }\n"),
            vec![
                r#"Variable "$u" cannot be non-input type "User"."#,
                r#"Variable "$u" is never used in operation "Q"."#
            ]
        );
        assert_eq!(
            messages("query Q($u: Ghost) { posts { id } }\n"),
            vec![
                r#"Unknown type "Ghost"."#,
                r#"Variable "$u" is never used in operation "Q"."#
            ]
        );
    }

    #[test]
    fn test_variables_used_through_fragments() {
        assert_valid(
            "query Q($first: Int!) { user(id: 1) { ...F } }\nfragment F on User { friends(first: $first) { id } }",
        );
        assert_eq!(
            messages("query Q { user(id: 1) { ...F } }\nfragment F on User { friends(first: $n) { id } }"),
            vec![r#"Variable "$n" is not defined by operation "Q"."#]
        );
    }

    #[test]
    fn test_unknown_directive() {
        assert_eq!(
            messages("query Q { posts @live { id } }"),
            vec![r#"Unknown directive "@live"."#]
        );
    }

    #[test]
    fn test_unsupported_root() {
        assert_eq!(
            messages("subscription S { posts { id } }"),
            vec!["Schema is not configured to execute subscription operation."]
        );
    }

    #[test]
    fn test_error_locations() {
        let schema = Schema::parse(TEST_SDL).unwrap();
        let errors = validate_source(&schema, "q.graphql", "query Q {\n  nope\n}").unwrap();
        assert_eq!(errors[0].locations, vec![Location { line: 2, column: 3 }]);
    }

    #[test]
    fn test_syntax_error_is_err() {
        let schema = Schema::parse(TEST_SDL).unwrap();
        let err = validate_source(&schema, "q.graphql", "query {").unwrap_err();
        assert!(err.is_parse_error());
    }
}
