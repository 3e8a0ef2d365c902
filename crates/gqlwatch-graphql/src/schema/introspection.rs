//! Introspection query and SDL rendering of its result.

use std::fmt::Write as _;

use serde::Deserialize;

use super::{BUILTIN_DIRECTIVES, BUILTIN_SCALARS};
use crate::error::GraphQLError;

/// Standard introspection query sent to schema endpoints.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      isRepeatable
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType { kind name }
          }
        }
      }
    }
  }
}
"#;

/// Response body of the introspection query.
#[derive(Debug, Deserialize)]
pub struct IntrospectionResponse {
    pub data: Option<IntrospectionData>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

impl IntrospectionResponse {
    /// Extracts the `__schema` payload, failing on GraphQL errors.
    pub fn into_schema(self) -> Result<IntrospectionSchema, GraphQLError> {
        match self.data {
            Some(data) if self.errors.is_empty() => Ok(data.schema),
            _ => {
                let messages: Vec<String> = self
                    .errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(serde_json::Value::as_str)
                            .map_or_else(|| e.to_string(), str::to_string)
                    })
                    .collect();
                Err(GraphQLError::schema_download(if messages.is_empty() {
                    "introspection returned no data".to_string()
                } else {
                    messages.join("; ")
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IntrospectionData {
    #[serde(rename = "__schema")]
    pub schema: IntrospectionSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    pub query_type: Option<NamedRef>,
    pub mutation_type: Option<NamedRef>,
    pub subscription_type: Option<NamedRef>,
    pub types: Vec<FullType>,
    #[serde(default)]
    pub directives: Vec<DirectiveDef>,
}

#[derive(Debug, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntrospectionKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullType {
    pub kind: IntrospectionKind,
    pub name: String,
    pub description: Option<String>,
    pub fields: Option<Vec<FieldDef>>,
    pub input_fields: Option<Vec<InputValueDef>>,
    pub interfaces: Option<Vec<TypeRef>>,
    pub enum_values: Option<Vec<EnumValueDef>>,
    pub possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<InputValueDef>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: IntrospectionKind,
    pub name: Option<String>,
    pub of_type: Option<Box<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveDef {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub args: Vec<InputValueDef>,
    #[serde(default)]
    pub is_repeatable: bool,
}

impl TypeRef {
    fn render(&self) -> String {
        match self.kind {
            IntrospectionKind::NonNull => match &self.of_type {
                Some(inner) => format!("{}!", inner.render()),
                None => String::new(),
            },
            IntrospectionKind::List => match &self.of_type {
                Some(inner) => format!("[{}]", inner.render()),
                None => String::new(),
            },
            _ => self.name.clone().unwrap_or_default(),
        }
    }
}

/// Renders an introspection result as SDL.
///
/// Introspection types (`__*`) and built-in scalars and directives are left out.
pub fn render_sdl(schema: IntrospectionSchema) -> String {
    let mut out = String::new();

    let roots = [
        ("query", &schema.query_type),
        ("mutation", &schema.mutation_type),
        ("subscription", &schema.subscription_type),
    ];
    out.push_str("schema {\n");
    for (operation, root) in roots {
        if let Some(root) = root {
            let _ = writeln!(out, "  {operation}: {}", root.name);
        }
    }
    out.push_str("}\n");

    for ty in &schema.types {
        if ty.name.starts_with("__") || BUILTIN_SCALARS.contains(&ty.name.as_str()) {
            continue;
        }
        out.push('\n');
        render_description(&mut out, ty.description.as_deref(), "");
        render_type(&mut out, ty);
    }

    for directive in &schema.directives {
        if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
            continue;
        }
        out.push('\n');
        render_description(&mut out, directive.description.as_deref(), "");
        let _ = write!(out, "directive @{}{}", directive.name, render_args(&directive.args));
        if directive.is_repeatable {
            out.push_str(" repeatable");
        }
        let _ = writeln!(out, " on {}", directive.locations.join(" | "));
    }

    out
}

fn render_type(out: &mut String, ty: &FullType) {
    let name = &ty.name;
    match ty.kind {
        IntrospectionKind::Scalar => {
            let _ = writeln!(out, "scalar {name}");
        }
        IntrospectionKind::Object | IntrospectionKind::Interface => {
            let keyword = if ty.kind == IntrospectionKind::Object {
                "type"
            } else {
                "interface"
            };
            let _ = write!(out, "{keyword} {name}");
            let interfaces: Vec<&str> = ty
                .interfaces
                .iter()
                .flatten()
                .filter_map(|i| i.name.as_deref())
                .collect();
            if !interfaces.is_empty() {
                let _ = write!(out, " implements {}", interfaces.join(" & "));
            }
            out.push_str(" {\n");
            for field in ty.fields.iter().flatten() {
                render_description(out, field.description.as_deref(), "  ");
                let _ = write!(
                    out,
                    "  {}{}: {}",
                    field.name,
                    render_args(&field.args),
                    field.ty.render()
                );
                render_deprecation(out, field.is_deprecated, field.deprecation_reason.as_deref());
                out.push('\n');
            }
            out.push_str("}\n");
        }
        IntrospectionKind::Union => {
            let members: Vec<&str> = ty
                .possible_types
                .iter()
                .flatten()
                .filter_map(|t| t.name.as_deref())
                .collect();
            let _ = writeln!(out, "union {name} = {}", members.join(" | "));
        }
        IntrospectionKind::Enum => {
            let _ = writeln!(out, "enum {name} {{");
            for value in ty.enum_values.iter().flatten() {
                render_description(out, value.description.as_deref(), "  ");
                let _ = write!(out, "  {}", value.name);
                render_deprecation(out, value.is_deprecated, value.deprecation_reason.as_deref());
                out.push('\n');
            }
            out.push_str("}\n");
        }
        IntrospectionKind::InputObject => {
            let _ = writeln!(out, "input {name} {{");
            for field in ty.input_fields.iter().flatten() {
                render_description(out, field.description.as_deref(), "  ");
                let _ = writeln!(out, "  {}", render_input_value(field));
            }
            out.push_str("}\n");
        }
        IntrospectionKind::List | IntrospectionKind::NonNull => {}
    }
}

fn render_args(args: &[InputValueDef]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = args.iter().map(render_input_value).collect();
    format!("({})", rendered.join(", "))
}

fn render_input_value(value: &InputValueDef) -> String {
    match &value.default_value {
        Some(default) => format!("{}: {} = {default}", value.name, value.ty.render()),
        None => format!("{}: {}", value.name, value.ty.render()),
    }
}

fn render_description(out: &mut String, description: Option<&str>, indent: &str) {
    if let Some(text) = description.filter(|d| !d.is_empty()) {
        let escaped = text.replace("\"\"\"", "\\\"\"\"");
        let _ = writeln!(out, "{indent}\"\"\"{escaped}\"\"\"");
    }
}

fn render_deprecation(out: &mut String, deprecated: bool, reason: Option<&str>) {
    if !deprecated {
        return;
    }
    match reason {
        Some(reason) => {
            let _ = write!(out, " @deprecated(reason: {})", serde_json::Value::from(reason));
        }
        None => out.push_str(" @deprecated"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn sample() -> IntrospectionSchema {
        let json = serde_json::json!({
            "queryType": { "name": "Query" },
            "mutationType": null,
            "subscriptionType": null,
            "types": [
                {
                    "kind": "OBJECT", "name": "Query", "description": "Entry point",
                    "fields": [
                        {
                            "name": "user",
                            "description": null,
                            "args": [{
                                "name": "id", "description": null, "defaultValue": null,
                                "type": { "kind": "NON_NULL", "name": null,
                                          "ofType": { "kind": "SCALAR", "name": "ID", "ofType": null } }
                            }],
                            "type": { "kind": "OBJECT", "name": "User", "ofType": null },
                            "isDeprecated": false, "deprecationReason": null
                        },
                        {
                            "name": "legacy", "description": null, "args": [],
                            "type": { "kind": "SCALAR", "name": "String", "ofType": null },
                            "isDeprecated": true, "deprecationReason": "use user"
                        }
                    ],
                    "inputFields": null, "interfaces": [], "enumValues": null, "possibleTypes": null
                },
                {
                    "kind": "OBJECT", "name": "User", "description": null,
                    "fields": [{
                        "name": "tags", "description": null,
                        "args": [{
                            "name": "limit", "description": null, "defaultValue": "10",
                            "type": { "kind": "SCALAR", "name": "Int", "ofType": null }
                        }],
                        "type": { "kind": "NON_NULL", "name": null, "ofType": {
                            "kind": "LIST", "name": null, "ofType": {
                                "kind": "NON_NULL", "name": null, "ofType": {
                                    "kind": "SCALAR", "name": "String", "ofType": null } } } },
                        "isDeprecated": false, "deprecationReason": null
                    }],
                    "inputFields": null,
                    "interfaces": [{ "kind": "INTERFACE", "name": "Node", "ofType": null }],
                    "enumValues": null, "possibleTypes": null
                },
                {
                    "kind": "INTERFACE", "name": "Node", "description": null,
                    "fields": [{
                        "name": "tags", "description": null, "args": [],
                        "type": { "kind": "SCALAR", "name": "String", "ofType": null },
                        "isDeprecated": false, "deprecationReason": null
                    }],
                    "inputFields": null, "interfaces": [], "enumValues": null,
                    "possibleTypes": [{ "kind": "OBJECT", "name": "User", "ofType": null }]
                },
                {
                    "kind": "ENUM", "name": "Role", "description": null, "fields": null,
                    "inputFields": null, "interfaces": null, "possibleTypes": null,
                    "enumValues": [
                        { "name": "ADMIN", "description": null, "isDeprecated": false, "deprecationReason": null }
                    ]
                },
                {
                    "kind": "SCALAR", "name": "String", "description": null, "fields": null,
                    "inputFields": null, "interfaces": null, "enumValues": null, "possibleTypes": null
                },
                {
                    "kind": "OBJECT", "name": "__Type", "description": null, "fields": [],
                    "inputFields": null, "interfaces": [], "enumValues": null, "possibleTypes": null
                }
            ],
            "directives": [
                { "name": "include", "description": null, "locations": ["FIELD"], "args": [] },
                { "name": "cached", "description": null, "locations": ["FIELD", "QUERY"],
                  "args": [], "isRepeatable": true }
            ]
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_render_sdl() {
        let sdl = render_sdl(sample());

        assert!(sdl.contains("schema {\n  query: Query\n}"));
        assert!(sdl.contains("\"\"\"Entry point\"\"\"\ntype Query {"));
        assert!(sdl.contains("  user(id: ID!): User\n"));
        assert!(sdl.contains("  legacy: String @deprecated(reason: \"use user\")"));
        assert!(sdl.contains("type User implements Node {"));
        assert!(sdl.contains("  tags(limit: Int = 10): [String!]!"));
        assert!(sdl.contains("enum Role {\n  ADMIN\n}"));
        assert!(sdl.contains("directive @cached repeatable on FIELD | QUERY"));
        assert!(!sdl.contains("__Type"));
        assert!(!sdl.contains("scalar String"));
        assert!(!sdl.contains("@include"));
    }

    #[test]
    fn test_rendered_sdl_parses() {
        let schema = Schema::parse(render_sdl(sample())).unwrap();
        assert!(schema.field("User", "tags").is_some());
        assert!(schema.has_directive("cached"));
        assert_eq!(schema.possible_types("Node"), vec!["User"]);
    }

    #[test]
    fn test_errors_become_download_error() {
        let response: IntrospectionResponse = serde_json::from_value(serde_json::json!({
            "data": null,
            "errors": [{ "message": "introspection disabled" }]
        }))
        .unwrap();
        let err = response.into_schema().unwrap_err();
        assert!(err.to_string().contains("introspection disabled"));
    }
}
