//! GraphQL schema model.
//!
//! The schema is loaded from SDL and indexed by type name so that the
//! validator and the type emitter can resolve fields, arguments and
//! possible types without walking the SDL AST.

mod introspection;
mod provider;

pub use introspection::{INTROSPECTION_QUERY, IntrospectionResponse, render_sdl};
pub use provider::{
    FileSchemaProvider, LoadOptions, RemoteSchemaProvider, SchemaProvider, StaticSchemaProvider,
    provider_for,
};

use std::collections::HashSet;

use async_graphql_parser::parse_schema;
use async_graphql_parser::types::{
    BaseType, FieldDefinition, InputValueDefinition, Type, TypeKind as AstTypeKind,
    TypeSystemDefinition,
};
use async_graphql_parser::Positioned;
use indexmap::IndexMap;

use crate::document::OperationKind;
use crate::error::GraphQLError;

/// Scalars every schema has, whether or not the SDL declares them.
pub const BUILTIN_SCALARS: &[&str] = &["Int", "Float", "String", "Boolean", "ID"];

/// Directives every schema has.
pub const BUILTIN_DIRECTIVES: &[&str] = &["skip", "include", "deprecated", "specifiedBy", "oneOf"];

/// Kind of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

/// An argument or input field.
#[derive(Debug, Clone)]
pub struct InputValue {
    pub name: String,
    pub ty: Type,
    pub has_default: bool,
}

impl InputValue {
    /// Required means non-null without a default value.
    pub fn is_required(&self) -> bool {
        !self.ty.nullable && !self.has_default
    }
}

/// A field of an object or interface type.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
    pub arguments: IndexMap<String, InputValue>,
}

/// A named type with everything the validator needs about it.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldInfo>,
    pub input_fields: IndexMap<String, InputValue>,
    pub interfaces: Vec<String>,
    /// Union members or interface implementors.
    pub possible_types: Vec<String>,
    pub enum_values: Vec<String>,
}

impl TypeInfo {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: IndexMap::new(),
            input_fields: IndexMap::new(),
            interfaces: Vec::new(),
            possible_types: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    /// Object, interface or union.
    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }

    /// Scalar or enum.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar | TypeKind::Enum)
    }

    /// Scalar, enum or input object.
    pub fn is_input(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject
        )
    }
}

/// Returns the innermost named type of a (possibly wrapped) type.
pub fn named_type(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => named_type(inner),
    }
}

/// Parsed and indexed GraphQL schema.
#[derive(Debug, Clone)]
pub struct Schema {
    sdl: String,
    types: IndexMap<String, TypeInfo>,
    directives: HashSet<String>,
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
}

impl Schema {
    /// Parses and indexes SDL.
    pub fn parse(sdl: impl Into<String>) -> Result<Self, GraphQLError> {
        let sdl = sdl.into();
        let document =
            parse_schema(&sdl).map_err(|e| GraphQLError::schema_parse(e.to_string()))?;

        let mut types: IndexMap<String, TypeInfo> = BUILTIN_SCALARS
            .iter()
            .map(|name| (name.to_string(), TypeInfo::new(*name, TypeKind::Scalar)))
            .collect();
        let mut directives: HashSet<String> =
            BUILTIN_DIRECTIVES.iter().map(|d| d.to_string()).collect();
        let mut roots: [Option<String>; 3] = [None, None, None];

        for definition in document.definitions {
            match definition {
                TypeSystemDefinition::Schema(schema) => {
                    let schema = schema.node;
                    let named = [schema.query, schema.mutation, schema.subscription];
                    for (slot, name) in roots.iter_mut().zip(named) {
                        if let Some(name) = name {
                            *slot = Some(name.node.to_string());
                        }
                    }
                }
                TypeSystemDefinition::Directive(directive) => {
                    directives.insert(directive.node.name.node.to_string());
                }
                TypeSystemDefinition::Type(ty) => {
                    let ty = ty.node;
                    let name = ty.name.node.to_string();
                    let kind = match &ty.kind {
                        AstTypeKind::Scalar => TypeKind::Scalar,
                        AstTypeKind::Object(_) => TypeKind::Object,
                        AstTypeKind::Interface(_) => TypeKind::Interface,
                        AstTypeKind::Union(_) => TypeKind::Union,
                        AstTypeKind::Enum(_) => TypeKind::Enum,
                        AstTypeKind::InputObject(_) => TypeKind::InputObject,
                    };

                    let info = types
                        .entry(name.clone())
                        .or_insert_with(|| TypeInfo::new(&name, kind));
                    if info.kind != kind {
                        return Err(GraphQLError::schema_parse(format!(
                            "type \"{name}\" is declared with conflicting kinds"
                        )));
                    }

                    match ty.kind {
                        AstTypeKind::Scalar => {}
                        AstTypeKind::Object(object) => {
                            info.interfaces
                                .extend(object.implements.into_iter().map(|i| i.node.to_string()));
                            add_fields(info, object.fields);
                        }
                        AstTypeKind::Interface(interface) => {
                            info.interfaces.extend(
                                interface.implements.into_iter().map(|i| i.node.to_string()),
                            );
                            add_fields(info, interface.fields);
                        }
                        AstTypeKind::Union(union) => {
                            info.possible_types
                                .extend(union.members.into_iter().map(|m| m.node.to_string()));
                        }
                        AstTypeKind::Enum(enumeration) => {
                            info.enum_values.extend(
                                enumeration
                                    .values
                                    .into_iter()
                                    .map(|v| v.node.value.node.to_string()),
                            );
                        }
                        AstTypeKind::InputObject(input) => {
                            for field in input.fields {
                                let value = input_value(field);
                                info.input_fields.insert(value.name.clone(), value);
                            }
                        }
                    }
                }
            }
        }

        // Interface implementors become possible types of the interface.
        let implementations: Vec<(String, String)> = types
            .values()
            .filter(|t| t.kind == TypeKind::Object)
            .flat_map(|t| t.interfaces.iter().map(|i| (i.clone(), t.name.clone())))
            .collect();
        for (interface, object) in implementations {
            if let Some(info) = types.get_mut(&interface)
                && !info.possible_types.contains(&object)
            {
                info.possible_types.push(object);
            }
        }

        let [query, mutation, subscription] = roots;
        let default_root = |explicit: Option<String>, fallback: &str| {
            explicit.or_else(|| types.contains_key(fallback).then(|| fallback.to_string()))
        };
        let query_type = default_root(query, "Query");
        let mutation_type = default_root(mutation, "Mutation");
        let subscription_type = default_root(subscription, "Subscription");

        let Some(query_name) = &query_type else {
            return Err(GraphQLError::schema_parse("schema has no query root type"));
        };
        if !types.contains_key(query_name) {
            return Err(GraphQLError::schema_parse(format!(
                "query root type \"{query_name}\" is not defined"
            )));
        }

        Ok(Self {
            sdl,
            types,
            directives,
            query_type,
            mutation_type,
            subscription_type,
        })
    }

    /// The SDL this schema was built from.
    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains(name)
    }

    /// Name of the root type for an operation kind.
    pub fn root_type_name(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => self.query_type.as_deref(),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Root type for an operation kind, if the schema supports it.
    pub fn root_type(&self, kind: OperationKind) -> Option<&TypeInfo> {
        self.root_type_name(kind).and_then(|name| self.get_type(name))
    }

    /// Looks up a field on an object or interface type.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldInfo> {
        self.get_type(type_name)?.fields.get(field_name)
    }

    /// Concrete object types a composite type may resolve to.
    pub fn possible_types(&self, type_name: &str) -> Vec<&str> {
        match self.get_type(type_name) {
            Some(info) if info.kind == TypeKind::Object => vec![info.name.as_str()],
            Some(info) => info.possible_types.iter().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }
}

fn add_fields(info: &mut TypeInfo, fields: Vec<Positioned<FieldDefinition>>) {
    for field in fields {
        let field = field.node;
        let arguments = field
            .arguments
            .into_iter()
            .map(|arg| {
                let value = input_value(arg);
                (value.name.clone(), value)
            })
            .collect();

        let name = field.name.node.to_string();
        info.fields.insert(
            name.clone(),
            FieldInfo {
                name,
                ty: field.ty.node,
                arguments,
            },
        );
    }
}

fn input_value(value: Positioned<InputValueDefinition>) -> InputValue {
    let value = value.node;
    InputValue {
        name: value.name.node.to_string(),
        ty: value.ty.node,
        has_default: value.default_value.is_some(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_SDL: &str = r#"
interface Node {
  id: ID!
}

type User implements Node {
  id: ID!
  name: String
  email(masked: Boolean = true): String
  friends(first: Int!): [User!]!
  role: Role!
}

type Post implements Node {
  id: ID!
  title: String!
  author: User
}

union SearchResult = User | Post

enum Role {
  ADMIN
  MEMBER
}

input PostInput {
  title: String!
}

type Query {
  user(id: ID!): User
  search(text: String!): [SearchResult!]!
  node(id: ID!): Node
  posts: [Post!]!
}

type Mutation {
  createPost(input: PostInput!): Post
}
"#;

    #[test]
    fn test_parse_schema_index() {
        let schema = Schema::parse(TEST_SDL).unwrap();

        assert_eq!(schema.root_type_name(OperationKind::Query), Some("Query"));
        assert_eq!(schema.root_type_name(OperationKind::Mutation), Some("Mutation"));
        assert_eq!(schema.root_type_name(OperationKind::Subscription), None);

        let user = schema.get_type("User").unwrap();
        assert_eq!(user.kind, TypeKind::Object);
        assert!(user.is_composite());
        assert_eq!(user.interfaces, vec!["Node"]);

        let friends = schema.field("User", "friends").unwrap();
        assert_eq!(named_type(&friends.ty), "User");
        assert!(friends.arguments["first"].is_required());
        assert!(!schema.field("User", "email").unwrap().arguments["masked"].is_required());

        assert!(schema.get_type("String").unwrap().is_leaf());
        assert!(schema.get_type("Role").unwrap().is_leaf());
        assert!(schema.get_type("PostInput").unwrap().is_input());
    }

    #[test]
    fn test_possible_types() {
        let schema = Schema::parse(TEST_SDL).unwrap();
        assert_eq!(schema.possible_types("SearchResult"), vec!["User", "Post"]);
        assert_eq!(schema.possible_types("Node"), vec!["User", "Post"]);
        assert_eq!(schema.possible_types("User"), vec!["User"]);
    }

    #[test]
    fn test_explicit_schema_definition() {
        let schema = Schema::parse(
            "schema { query: Root }\ntype Root { ok: Boolean }\ndirective @cached on FIELD",
        )
        .unwrap();
        assert_eq!(schema.root_type_name(OperationKind::Query), Some("Root"));
        assert!(schema.has_directive("cached"));
        assert!(schema.has_directive("include"));
    }

    #[test]
    fn test_type_extension_merges_fields() {
        let schema =
            Schema::parse("type Query { a: Int }\nextend type Query { b: String }").unwrap();
        let query = schema.get_type("Query").unwrap();
        assert!(query.fields.contains_key("a"));
        assert!(query.fields.contains_key("b"));
    }

    #[test]
    fn test_missing_query_root() {
        let err = Schema::parse("type User { id: ID }").unwrap_err();
        assert!(matches!(err, GraphQLError::SchemaParse(_)));
    }

    #[test]
    fn test_invalid_sdl() {
        assert!(Schema::parse("type Query {").is_err());
    }
}
