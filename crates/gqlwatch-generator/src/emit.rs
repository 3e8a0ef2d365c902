//! TypeScript type emission.
//!
//! Each operation becomes a result type and a variables type, each fragment
//! a `<Name>Fragment` type that operations intersect where they spread it.
//! Enums and input objects of the schema are emitted once at the top.

use std::fmt::Write as _;

use async_graphql_parser::types::{
    BaseType, ExecutableDocument, Selection, SelectionSet, Type, VariableDefinition,
};
use async_graphql_parser::Positioned;
use gqlwatch_graphql::schema::TypeKind;
use gqlwatch_graphql::{OperationKind, Schema, parse_executable};

use crate::error::GeneratorError;
use crate::types::GeneratorOutput;

const HEADER: &str = "// Generated by gqlwatch. Do not edit.\n";

impl GeneratorOutput {
    /// Emits TypeScript declarations for every operation and fragment.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::FieldNotFound`], [`GeneratorError::TypeNotFound`]
    /// or [`GeneratorError::FragmentNotFound`] for references the schema or the
    /// fragment set cannot resolve.
    pub fn emit_types(&self, schema: &Schema) -> Result<String, GeneratorError> {
        let mut out = String::from(HEADER);
        emit_schema_types(&mut out, schema);

        for fragment in self.fragments() {
            let emitter = Emitter::new(schema, self, &fragment.path);
            let document = emitter.parse(&fragment.source)?;
            let Some(definition) = document.fragments.values().next() else {
                continue;
            };
            let body = emitter.selection_set(&fragment.type_condition, &definition.node.selection_set.node, 0)?;
            let _ = writeln!(out, "\nexport type {}Fragment = {body};", fragment.name);
        }

        for operation in self.collected_operations() {
            let emitter = Emitter::new(schema, self, &operation.path);
            let document = emitter.parse(&operation.source)?;
            let Some((_, definition)) = document.operations.iter().next() else {
                continue;
            };

            let root = schema
                .root_type_name(operation.operation_kind)
                .ok_or_else(|| {
                    GeneratorError::type_not_found(
                        suffix(operation.operation_kind),
                        &operation.path,
                    )
                })?;
            let type_name = operation_type_name(&operation.name, operation.operation_kind);
            let body = emitter.selection_set(root, &definition.node.selection_set.node, 0)?;
            let variables = emitter.variables(&definition.node.variable_definitions)?;

            let _ = writeln!(out, "\nexport type {type_name} = {body};");
            let _ = writeln!(out, "\nexport type {type_name}Variables = {variables};");
        }

        Ok(out)
    }
}

fn suffix(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Query => "Query",
        OperationKind::Mutation => "Mutation",
        OperationKind::Subscription => "Subscription",
    }
}

/// `User` + query becomes `UserQuery`; `UserQuery` stays as is.
pub fn operation_type_name(name: &str, kind: OperationKind) -> String {
    let suffix = suffix(kind);
    if name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

fn emit_schema_types(out: &mut String, schema: &Schema) {
    for info in schema.types() {
        if info.name.starts_with("__") {
            continue;
        }
        match info.kind {
            TypeKind::Enum => {
                let values: Vec<String> =
                    info.enum_values.iter().map(|v| format!("\"{v}\"")).collect();
                let body = if values.is_empty() {
                    "never".to_string()
                } else {
                    values.join(" | ")
                };
                let _ = writeln!(out, "\nexport type {} = {body};", info.name);
            }
            TypeKind::InputObject => {
                let _ = writeln!(out, "\nexport type {} = {{", info.name);
                for field in info.input_fields.values() {
                    let optional = if field.ty.nullable { "?" } else { "" };
                    let _ = writeln!(out, "  {}{optional}: {};", field.name, input_type(&field.ty));
                }
                out.push_str("};\n");
            }
            _ => {}
        }
    }
}

/// TypeScript type of an input position. Named types are referenced by name.
fn input_type(ty: &Type) -> String {
    let inner = match &ty.base {
        BaseType::Named(name) => scalar_type(name.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string()),
        BaseType::List(item) => format!("Array<{}>", input_type(item)),
    };
    nullable(inner, ty.nullable)
}

fn scalar_type(name: &str) -> Option<&'static str> {
    match name {
        "ID" | "String" => Some("string"),
        "Int" | "Float" => Some("number"),
        "Boolean" => Some("boolean"),
        _ => None,
    }
}

fn nullable(ty: String, nullable: bool) -> String {
    if nullable { format!("{ty} | null") } else { ty }
}

struct Emitter<'a> {
    schema: &'a Schema,
    output: &'a GeneratorOutput,
    path: &'a str,
}

impl<'a> Emitter<'a> {
    fn new(schema: &'a Schema, output: &'a GeneratorOutput, path: &'a str) -> Self {
        Self {
            schema,
            output,
            path,
        }
    }

    fn parse(&self, source: &str) -> Result<ExecutableDocument, GeneratorError> {
        // Sources were parsed when their documents were added, so this only
        // fails if a document changed underneath the build output.
        parse_executable(source)
            .map_err(|e| GeneratorError::type_not_found(format!("<unparsable: {e}>"), self.path))
    }

    fn variables(
        &self,
        definitions: &[Positioned<VariableDefinition>],
    ) -> Result<String, GeneratorError> {
        if definitions.is_empty() {
            return Ok("Record<string, never>".to_string());
        }

        let mut body = String::from("{\n");
        for definition in definitions {
            let ty = &definition.node.var_type.node;
            let type_name = gqlwatch_graphql::schema::named_type(ty);
            if self.schema.get_type(type_name).is_none() {
                return Err(GeneratorError::type_not_found(type_name, self.path));
            }
            let optional = if ty.nullable || definition.node.default_value.is_some() {
                "?"
            } else {
                ""
            };
            let _ = writeln!(
                body,
                "  {}{optional}: {};",
                definition.node.name.node,
                input_type(ty)
            );
        }
        body.push('}');
        Ok(body)
    }

    fn selection_set(
        &self,
        parent: &str,
        set: &SelectionSet,
        depth: usize,
    ) -> Result<String, GeneratorError> {
        let Some(parent_info) = self.schema.get_type(parent) else {
            return Err(GeneratorError::type_not_found(parent, self.path));
        };

        let indent = "  ".repeat(depth + 1);
        let mut fields = String::new();
        let mut intersections = Vec::new();

        for item in &set.items {
            match &item.node {
                Selection::Field(field) => {
                    let node = &field.node;
                    let name = node.name.node.as_str();
                    let key = node.alias.as_ref().map_or(name, |a| a.node.as_str());

                    let ty = if name == "__typename" {
                        match parent_info.kind {
                            TypeKind::Object => format!("\"{parent}\""),
                            _ => "string".to_string(),
                        }
                    } else {
                        let Some(definition) = self.schema.field(parent, name) else {
                            return Err(GeneratorError::field_not_found(parent, name, self.path));
                        };
                        self.output_type(&definition.ty, &node.selection_set.node, depth + 1)?
                    };
                    let _ = writeln!(fields, "{indent}{key}: {ty};");
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    if self.output.fragment(name).is_none() {
                        return Err(GeneratorError::fragment_not_found(name, self.path));
                    }
                    intersections.push(format!("{name}Fragment"));
                }
                Selection::InlineFragment(inline) => {
                    let condition = inline
                        .node
                        .type_condition
                        .as_ref()
                        .map(|c| c.node.on.node.as_str());
                    match condition {
                        None => {
                            intersections.push(self.selection_set(
                                parent,
                                &inline.node.selection_set.node,
                                depth,
                            )?);
                        }
                        Some(condition) if condition == parent => {
                            intersections.push(self.selection_set(
                                parent,
                                &inline.node.selection_set.node,
                                depth,
                            )?);
                        }
                        Some(condition) => {
                            let body = self.selection_set(
                                condition,
                                &inline.node.selection_set.node,
                                depth,
                            )?;
                            intersections.push(format!("Partial<{body}>"));
                        }
                    }
                }
            }
        }

        let closing = "  ".repeat(depth);
        let mut ty = if fields.is_empty() && !intersections.is_empty() {
            String::new()
        } else {
            format!("{{\n{fields}{closing}}}")
        };
        for intersection in intersections {
            if ty.is_empty() {
                ty = intersection;
            } else {
                ty = format!("{ty} & {intersection}");
            }
        }
        Ok(ty)
    }

    fn output_type(
        &self,
        ty: &Type,
        selection: &SelectionSet,
        depth: usize,
    ) -> Result<String, GeneratorError> {
        let inner = match &ty.base {
            BaseType::List(item) => format!("Array<{}>", self.output_type(item, selection, depth)?),
            BaseType::Named(name) => {
                let name = name.as_str();
                let Some(info) = self.schema.get_type(name) else {
                    return Err(GeneratorError::type_not_found(name, self.path));
                };
                match info.kind {
                    TypeKind::Scalar => scalar_type(name).unwrap_or("unknown").to_string(),
                    TypeKind::Enum => name.to_string(),
                    _ => self.selection_set(name, selection, depth)?,
                }
            }
        };
        Ok(nullable(inner, ty.nullable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DocumentGenerator, Generator};
    use gqlwatch_graphql::ParsedDocument;

    const SDL: &str = r#"
type User {
  id: ID!
  name: String
  role: Role!
  friends: [User!]!
}

enum Role { ADMIN MEMBER }

input Filter { term: String! limit: Int }

type Query {
  user(id: ID!): User
  users(filter: Filter): [User!]!
}
"#;

    fn build(sources: &[(&str, &str)]) -> GeneratorOutput {
        let mut generator = DocumentGenerator::new();
        for (path, source) in sources {
            generator
                .add(path, &ParsedDocument::parse(path, source).unwrap())
                .unwrap();
        }
        generator.build().unwrap()
    }

    #[test]
    fn test_emit_operation_and_fragment() {
        let output = build(&[
            (
                "user.graphql",
                "query User($id: ID!) { user(id: $id) { ...UserFields friends { id } } }",
            ),
            ("fields.graphql", "fragment UserFields on User { id name role }"),
        ]);
        let schema = Schema::parse(SDL).unwrap();
        let ts = output.emit_types(&schema).unwrap();

        assert!(ts.starts_with(HEADER));
        assert!(ts.contains("export type Role = \"ADMIN\" | \"MEMBER\";"));
        assert!(ts.contains("export type Filter = {\n  term: string;\n  limit?: number | null;\n};"));
        assert!(ts.contains(
            "export type UserFieldsFragment = {\n  id: string;\n  name: string | null;\n  role: Role;\n};"
        ));
        assert!(ts.contains("export type UserQuery = {\n  user: {\n    friends: Array<{\n      id: string;\n    }>;\n  } & UserFieldsFragment | null;\n};"));
        assert!(ts.contains("export type UserQueryVariables = {\n  id: string;\n};"));
    }

    #[test]
    fn test_variables_optional_and_empty() {
        let output = build(&[(
            "users.graphql",
            "query Users($filter: Filter) { users(filter: $filter) { __typename } }\nquery Plain { users { id } }",
        )]);
        let ts = output.emit_types(&Schema::parse(SDL).unwrap()).unwrap();
        assert!(ts.contains("export type UsersQueryVariables = {\n  filter?: Filter | null;\n};"));
        assert!(ts.contains("export type PlainQueryVariables = Record<string, never>;"));
        assert!(ts.contains("__typename: \"User\";"));
    }

    #[test]
    fn test_unresolved_references() {
        let schema = Schema::parse(SDL).unwrap();

        let output = build(&[("a.graphql", "query A { user(id: 1) { nickname } }")]);
        assert_eq!(
            output.emit_types(&schema).unwrap_err(),
            GeneratorError::field_not_found("User", "nickname", "a.graphql")
        );

        let output = build(&[("b.graphql", "query B { user(id: 1) { ...Missing } }")]);
        assert_eq!(
            output.emit_types(&schema).unwrap_err(),
            GeneratorError::fragment_not_found("Missing", "b.graphql")
        );

        let output = build(&[("c.graphql", "fragment C on Ghost { id }")]);
        assert_eq!(
            output.emit_types(&schema).unwrap_err(),
            GeneratorError::type_not_found("Ghost", "c.graphql")
        );
    }

    #[test]
    fn test_operation_type_name() {
        assert_eq!(operation_type_name("User", OperationKind::Query), "UserQuery");
        assert_eq!(operation_type_name("UserQuery", OperationKind::Query), "UserQuery");
        assert_eq!(operation_type_name("Save", OperationKind::Mutation), "SaveMutation");
    }
}
