use std::collections::{BTreeMap, HashMap, HashSet};

use async_graphql_parser::types::{
    Directive, ExecutableDocument, Field, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, VariableDefinition,
};
use async_graphql_parser::{Pos, Positioned};
use async_graphql_value::{Name, Value};

use super::ValidationError;
use crate::document::OperationKind;
use crate::schema::{Schema, named_type};

type Arguments = [(Positioned<Name>, Positioned<Value>)];

pub(super) struct Validator<'a> {
    schema: &'a Schema,
    document: &'a ExecutableDocument,
    fragments: BTreeMap<&'a str, &'a Positioned<FragmentDefinition>>,
    errors: Vec<ValidationError>,
}

impl<'a> Validator<'a> {
    pub(super) fn new(schema: &'a Schema, document: &'a ExecutableDocument) -> Self {
        let fragments = document
            .fragments
            .iter()
            .map(|(name, fragment)| (name.as_str(), fragment))
            .collect();

        Self {
            schema,
            document,
            fragments,
            errors: Vec::new(),
        }
    }

    pub(super) fn run(mut self) -> Vec<ValidationError> {
        let mut operations: Vec<(Option<&'a str>, &'a Positioned<OperationDefinition>)> = self
            .document
            .operations
            .iter()
            .map(|(name, operation)| (name.map(Name::as_str), operation))
            .collect();
        operations.sort_by_key(|(name, _)| *name);

        for &(name, operation) in &operations {
            self.check_operation(name, operation);
        }

        let fragments: Vec<_> = self.fragments.iter().map(|(n, f)| (*n, *f)).collect();
        for (name, fragment) in fragments {
            self.check_fragment(name, fragment);
        }

        self.check_unused_fragments(&operations);
        self.check_fragment_cycles();
        self.errors
    }

    fn error(&mut self, message: impl Into<String>, pos: Pos) {
        self.errors.push(ValidationError::new(message, [pos]));
    }

    fn check_operation(&mut self, name: Option<&'a str>, operation: &'a Positioned<OperationDefinition>) {
        let kind = OperationKind::from(operation.node.ty);
        self.check_directives(&operation.node.directives);
        self.check_variable_definitions(&operation.node.variable_definitions);

        let schema = self.schema;
        match schema.root_type(kind) {
            Some(root) => self.check_selection_set(&root.name, &operation.node.selection_set),
            None => self.error(
                format!("Schema is not configured to execute {kind} operation."),
                operation.pos,
            ),
        }

        self.check_variable_usage(name, operation);
    }

    fn check_variable_definitions(&mut self, definitions: &'a [Positioned<VariableDefinition>]) {
        let mut seen = HashSet::new();
        for definition in definitions {
            let name = definition.node.name.node.as_str();
            if !seen.insert(name) {
                self.error(
                    format!("There can be only one variable named \"${name}\"."),
                    definition.pos,
                );
            }

            let var_type = &definition.node.var_type;
            let type_name = named_type(&var_type.node);
            match self.schema.get_type(type_name) {
                None => self.error(format!("Unknown type \"{type_name}\"."), var_type.pos),
                Some(info) if !info.is_input() => self.error(
                    format!(
                        "Variable \"${name}\" cannot be non-input type \"{}\".",
                        var_type.node
                    ),
                    var_type.pos,
                ),
                Some(_) => {}
            }
        }
    }

    fn check_fragment(&mut self, name: &'a str, fragment: &'a Positioned<FragmentDefinition>) {
        self.check_directives(&fragment.node.directives);

        let condition = &fragment.node.type_condition;
        let type_name = condition.node.on.node.as_str();
        match self.schema.get_type(type_name) {
            None => self.error(format!("Unknown type \"{type_name}\"."), condition.pos),
            Some(info) if !info.is_composite() => self.error(
                format!("Fragment \"{name}\" cannot condition on non composite type \"{type_name}\"."),
                condition.pos,
            ),
            Some(_) => self.check_selection_set(type_name, &fragment.node.selection_set),
        }
    }

    fn check_selection_set(&mut self, parent: &'a str, set: &'a Positioned<SelectionSet>) {
        for item in &set.node.items {
            match &item.node {
                Selection::Field(field) => self.check_field(parent, field),
                Selection::FragmentSpread(spread) => {
                    self.check_directives(&spread.node.directives);
                    let name = spread.node.fragment_name.node.as_str();
                    match self.fragments.get(name).copied() {
                        None => self.error(
                            format!("Unknown fragment \"{name}\"."),
                            spread.node.fragment_name.pos,
                        ),
                        Some(fragment) => {
                            let condition = fragment.node.type_condition.node.on.node.as_str();
                            self.check_spread_possible(Some(name), parent, condition, spread.pos);
                        }
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.check_directives(&inline.node.directives);
                    let target = match &inline.node.type_condition {
                        None => parent,
                        Some(condition) => {
                            let type_name = condition.node.on.node.as_str();
                            match self.schema.get_type(type_name) {
                                None => {
                                    self.error(format!("Unknown type \"{type_name}\"."), condition.pos);
                                    continue;
                                }
                                Some(info) if !info.is_composite() => {
                                    self.error(
                                        format!(
                                            "Fragment cannot condition on non composite type \"{type_name}\"."
                                        ),
                                        condition.pos,
                                    );
                                    continue;
                                }
                                Some(_) => {}
                            }
                            self.check_spread_possible(None, parent, type_name, inline.pos);
                            type_name
                        }
                    };
                    self.check_selection_set(target, &inline.node.selection_set);
                }
            }
        }
    }

    fn check_field(&mut self, parent: &'a str, field: &'a Positioned<Field>) {
        let node = &field.node;
        let name = node.name.node.as_str();
        self.check_directives(&node.directives);

        if name == "__typename" {
            return;
        }
        let schema = self.schema;
        if matches!(name, "__schema" | "__type")
            && schema.root_type_name(OperationKind::Query) == Some(parent)
        {
            return;
        }

        let Some(definition) = schema.field(parent, name) else {
            self.error(
                format!("Cannot query field \"{name}\" on type \"{parent}\"."),
                field.pos,
            );
            return;
        };

        for (argument, _) in &node.arguments {
            if !definition.arguments.contains_key(argument.node.as_str()) {
                self.error(
                    format!(
                        "Unknown argument \"{}\" on field \"{parent}.{name}\".",
                        argument.node
                    ),
                    argument.pos,
                );
            }
        }
        for required in definition.arguments.values().filter(|a| a.is_required()) {
            if !node.arguments.iter().any(|(n, _)| n.node.as_str() == required.name) {
                self.error(
                    format!(
                        "Field \"{name}\" argument \"{}\" of type \"{}\" is required, but it was not provided.",
                        required.name, required.ty
                    ),
                    field.pos,
                );
            }
        }

        let type_name = named_type(&definition.ty);
        let has_selection = !node.selection_set.node.items.is_empty();
        match schema.get_type(type_name) {
            Some(info) if info.is_leaf() => {
                if has_selection {
                    self.error(
                        format!(
                            "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                            definition.ty
                        ),
                        node.selection_set.pos,
                    );
                }
            }
            Some(info) => {
                if has_selection {
                    self.check_selection_set(&info.name, &node.selection_set);
                } else {
                    self.error(
                        format!(
                            "Field \"{name}\" of type \"{}\" must have a selection of subfields. Did you mean \"{name} {{ ... }}\"?",
                            definition.ty
                        ),
                        field.pos,
                    );
                }
            }
            None => {}
        }
    }

    fn check_spread_possible(
        &mut self,
        fragment: Option<&str>,
        parent: &str,
        condition: &str,
        pos: Pos,
    ) {
        let parent_types = self.schema.possible_types(parent);
        let condition_types = self.schema.possible_types(condition);
        if parent_types.is_empty() || condition_types.is_empty() {
            return;
        }
        if parent_types.iter().any(|t| condition_types.contains(t)) {
            return;
        }

        let message = match fragment {
            Some(name) => format!(
                "Fragment \"{name}\" cannot be spread here as objects of type \"{parent}\" can never be of type \"{condition}\"."
            ),
            None => format!(
                "Fragment cannot be spread here as objects of type \"{parent}\" can never be of type \"{condition}\"."
            ),
        };
        self.error(message, pos);
    }

    fn check_directives(&mut self, directives: &[Positioned<Directive>]) {
        for directive in directives {
            let name = directive.node.name.node.as_str();
            if !self.schema.has_directive(name) {
                self.error(format!("Unknown directive \"@{name}\"."), directive.pos);
            }
        }
    }

    fn check_variable_usage(
        &mut self,
        name: Option<&'a str>,
        operation: &'a Positioned<OperationDefinition>,
    ) {
        let mut usages = Vec::new();
        let mut visited = HashSet::new();
        directive_variables(&operation.node.directives, &mut usages);
        self.collect_variables(&operation.node.selection_set.node, &mut visited, &mut usages);

        let defined: Vec<&str> = operation
            .node
            .variable_definitions
            .iter()
            .map(|d| d.node.name.node.as_str())
            .collect();

        let mut reported = HashSet::new();
        for (variable, pos) in &usages {
            if !defined.contains(variable) && reported.insert(*variable) {
                let message = match name {
                    Some(op) => format!("Variable \"${variable}\" is not defined by operation \"{op}\"."),
                    None => format!("Variable \"${variable}\" is not defined."),
                };
                self.error(message, *pos);
            }
        }

        for definition in &operation.node.variable_definitions {
            let variable = definition.node.name.node.as_str();
            if !usages.iter().any(|(used, _)| *used == variable) && reported.insert(variable) {
                let message = match name {
                    Some(op) => format!("Variable \"${variable}\" is never used in operation \"{op}\"."),
                    None => format!("Variable \"${variable}\" is never used."),
                };
                self.error(message, definition.pos);
            }
        }
    }

    /// Variables referenced by a selection set and every fragment it reaches.
    fn collect_variables(
        &self,
        set: &'a SelectionSet,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<(&'a str, Pos)>,
    ) {
        for item in &set.items {
            match &item.node {
                Selection::Field(field) => {
                    argument_variables(&field.node.arguments, out);
                    directive_variables(&field.node.directives, out);
                    self.collect_variables(&field.node.selection_set.node, visited, out);
                }
                Selection::FragmentSpread(spread) => {
                    directive_variables(&spread.node.directives, out);
                    let name = spread.node.fragment_name.node.as_str();
                    if visited.insert(name)
                        && let Some(fragment) = self.fragments.get(name).copied()
                    {
                        directive_variables(&fragment.node.directives, out);
                        self.collect_variables(&fragment.node.selection_set.node, visited, out);
                    }
                }
                Selection::InlineFragment(inline) => {
                    directive_variables(&inline.node.directives, out);
                    self.collect_variables(&inline.node.selection_set.node, visited, out);
                }
            }
        }
    }

    fn check_unused_fragments(
        &mut self,
        operations: &[(Option<&'a str>, &'a Positioned<OperationDefinition>)],
    ) {
        let mut used: HashSet<&'a str> = HashSet::new();
        let mut stack: Vec<&'a str> = Vec::new();
        for &(_, operation) in operations {
            spread_names(&operation.node.selection_set.node, &mut stack);
        }
        while let Some(name) = stack.pop() {
            if used.insert(name)
                && let Some(fragment) = self.fragments.get(name).copied()
            {
                spread_names(&fragment.node.selection_set.node, &mut stack);
            }
        }

        let unused: Vec<(&'a str, Pos)> = self
            .fragments
            .iter()
            .filter(|(name, _)| !used.contains(*name))
            .map(|(name, fragment)| (*name, fragment.pos))
            .collect();
        for (name, pos) in unused {
            self.error(format!("Fragment \"{name}\" is never used."), pos);
        }
    }

    fn check_fragment_cycles(&mut self) {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut index = HashMap::new();
        let names: Vec<&'a str> = self.fragments.keys().copied().collect();
        for name in names {
            self.detect_cycle(name, &mut visited, &mut path, &mut index);
        }
    }

    fn detect_cycle(
        &mut self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<(&'a str, Pos)>,
        index: &mut HashMap<&'a str, usize>,
    ) {
        if !visited.insert(name) {
            return;
        }
        let Some(fragment) = self.fragments.get(name).copied() else {
            return;
        };

        let mut spreads = Vec::new();
        spread_positions(&fragment.node.selection_set.node, &mut spreads);
        if spreads.is_empty() {
            return;
        }

        index.insert(name, path.len());
        for (spread, pos) in spreads {
            path.push((spread, pos));
            match index.get(spread).copied() {
                None => self.detect_cycle(spread, visited, path, index),
                Some(start) => {
                    let cycle = &path[start..];
                    let via: Vec<String> = cycle[..cycle.len() - 1]
                        .iter()
                        .map(|(n, _)| format!("\"{n}\""))
                        .collect();
                    let message = if via.is_empty() {
                        format!("Cannot spread fragment \"{spread}\" within itself.")
                    } else {
                        format!(
                            "Cannot spread fragment \"{spread}\" within itself via {}.",
                            via.join(", ")
                        )
                    };
                    let positions: Vec<Pos> = cycle.iter().map(|(_, p)| *p).collect();
                    self.errors.push(ValidationError::new(message, positions));
                }
            }
            path.pop();
        }
        index.remove(name);
    }
}

fn spread_names<'a>(set: &'a SelectionSet, out: &mut Vec<&'a str>) {
    let mut positioned = Vec::new();
    spread_positions(set, &mut positioned);
    out.extend(positioned.into_iter().map(|(name, _)| name));
}

fn spread_positions<'a>(set: &'a SelectionSet, out: &mut Vec<(&'a str, Pos)>) {
    for item in &set.items {
        match &item.node {
            Selection::Field(field) => spread_positions(&field.node.selection_set.node, out),
            Selection::FragmentSpread(spread) => {
                out.push((spread.node.fragment_name.node.as_str(), spread.pos));
            }
            Selection::InlineFragment(inline) => {
                spread_positions(&inline.node.selection_set.node, out)
            }
        }
    }
}

fn argument_variables<'a>(arguments: &'a Arguments, out: &mut Vec<(&'a str, Pos)>) {
    for (_, value) in arguments {
        value_variables(&value.node, value.pos, out);
    }
}

fn directive_variables<'a>(directives: &'a [Positioned<Directive>], out: &mut Vec<(&'a str, Pos)>) {
    for directive in directives {
        argument_variables(&directive.node.arguments, out);
    }
}

fn value_variables<'a>(value: &'a Value, pos: Pos, out: &mut Vec<(&'a str, Pos)>) {
    match value {
        Value::Variable(name) => out.push((name.as_str(), pos)),
        Value::List(items) => {
            for item in items {
                value_variables(item, pos, out);
            }
        }
        Value::Object(fields) => {
            for field in fields.values() {
                value_variables(field, pos, out);
            }
        }
        _ => {}
    }
}
