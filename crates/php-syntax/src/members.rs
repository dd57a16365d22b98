//! Class members read from class source files: method parameters, public
//! properties and the parent class.

use crate::error::ParseResult;
use crate::tree::{self, fields, render, significant, Grammar};
use rustc_hash::FxHashMap;
use tree_sitter::Node;

/// A declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Fully-qualified class name or lowercase builtin; `None` when untyped
    /// or declared with a union or intersection of several types.
    pub type_name: Option<String>,
    pub builtin: bool,
    pub nullable: bool,
    pub has_default: bool,
}

/// A public property, declared or promoted from the constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    /// Resolved like [`Parameter::type_name`].
    pub type_name: Option<String>,
    pub builtin: bool,
    pub nullable: bool,
}

/// The first class declared in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDecl {
    /// Fully-qualified name.
    pub name: String,
    /// Fully-qualified parent class.
    pub extends: Option<String>,
    pub properties: Vec<Property>,
    /// Lowercase method name to parameters.
    methods: FxHashMap<String, Vec<Parameter>>,
}

impl ClassDecl {
    /// Parameters of a method declared in the class body.
    pub fn method(&self, name: &str) -> Option<&[Parameter]> {
        self.methods
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }
}

const BUILTIN_TYPES: &[&str] = &[
    "array", "bool", "callable", "false", "float", "int", "iterable", "mixed", "never", "null",
    "object", "parent", "self", "static", "string", "true", "void",
];

const PARAMETERS: &[&str] = &[
    "simple_parameter",
    "property_promotion_parameter",
    "variadic_parameter",
];

/// Namespace and imports in effect for a file.
#[derive(Debug, Default)]
struct NameContext {
    namespace: Option<String>,
    /// Lowercase alias to fully-qualified name.
    imports: FxHashMap<String, String>,
}

impl NameContext {
    fn resolve(&self, name: &str) -> String {
        if let Some(qualified) = name.strip_prefix('\\') {
            return qualified.to_string();
        }
        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if let Some(full) = self.imports.get(&first.to_ascii_lowercase()) {
            return match rest {
                Some(rest) => format!("{full}\\{rest}"),
                None => full.clone(),
            };
        }
        match &self.namespace {
            Some(namespace) => format!("{namespace}\\{name}"),
            None => name.to_string(),
        }
    }

    fn add_imports(&mut self, declaration: Node<'_>, source: &str) {
        let kinds: Vec<&str> = tree::children(declaration)
            .iter()
            .map(|c| c.kind())
            .collect();
        if kinds.contains(&"function") || kinds.contains(&"const") {
            return;
        }
        for clause in significant(declaration) {
            if clause.kind() != "namespace_use_clause" {
                continue;
            }
            let parts = significant(clause);
            let Some(name) = parts.first() else {
                continue;
            };
            let full = tree::text(*name, source).trim_start_matches('\\').to_string();
            let alias = match parts.get(1) {
                Some(alias) => {
                    let name = significant(*alias).first().copied().unwrap_or(*alias);
                    tree::text(name, source)
                }
                None => full.rsplit('\\').next().unwrap_or(&full),
            }
            .to_ascii_lowercase();
            self.imports.insert(alias, full);
        }
    }
}

/// Read the first class declared in `source`.
///
/// Returns `Ok(None)` when the file declares no class.
pub fn class_declaration(source: &str) -> ParseResult<Option<ClassDecl>> {
    let tree = tree::parse_tree(source, Grammar::File)?;
    let mut names = NameContext::default();
    let mut pending = significant(tree.root_node());
    pending.reverse();
    while let Some(node) = pending.pop() {
        match node.kind() {
            "namespace_definition" => {
                names.namespace = node
                    .child_by_field_name("name")
                    .map(|name| tree::text(name, source).trim_start_matches('\\').to_string());
                if let Some(body) = node.child_by_field_name("body") {
                    pending.extend(significant(body).into_iter().rev());
                }
            }
            "namespace_use_declaration" => names.add_imports(node, source),
            "class_declaration" => return Ok(Some(read_class(node, source, &names))),
            _ => {}
        }
    }
    Ok(None)
}

/// Find `function <method>(...)` in a class file and read its parameters.
///
/// Returns `Ok(None)` when the file declares no such method.
pub fn method_parameters(source: &str, method: &str) -> ParseResult<Option<Vec<Parameter>>> {
    Ok(class_declaration(source)?.and_then(|class| class.method(method).map(<[_]>::to_vec)))
}

fn read_class(node: Node<'_>, source: &str, names: &NameContext) -> ClassDecl {
    let mut class = ClassDecl {
        name: node
            .child_by_field_name("name")
            .map(|name| names.resolve(tree::text(name, source)))
            .unwrap_or_default(),
        ..ClassDecl::default()
    };
    for child in significant(node) {
        match child.kind() {
            "base_clause" => {
                class.extends = significant(child)
                    .first()
                    .map(|parent| names.resolve(tree::text(*parent, source)));
            }
            "declaration_list" => read_members(child, source, names, &mut class),
            _ => {}
        }
    }
    class
}

fn read_members(body: Node<'_>, source: &str, names: &NameContext, class: &mut ClassDecl) {
    for member in significant(body) {
        match member.kind() {
            "property_declaration" if is_public(member, source) => {
                let declared = member
                    .child_by_field_name("type")
                    .map(|ty| render(ty, source));
                for element in significant(member) {
                    if element.kind() != "property_element" {
                        continue;
                    }
                    let Some(name) = variable_name(element, source) else {
                        continue;
                    };
                    let (type_name, builtin, nullable) = resolve_type(declared.as_deref(), names);
                    class.properties.push(Property {
                        name,
                        type_name,
                        builtin,
                        nullable,
                    });
                }
            }
            "method_declaration" => {
                let Some(name) = member.child_by_field_name("name") else {
                    continue;
                };
                let params: Vec<(Node<'_>, Parameter)> = member
                    .child_by_field_name("parameters")
                    .map(significant)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|param| PARAMETERS.contains(&param.kind()))
                    .filter_map(|param| Some((param, parameter(param, source, names)?)))
                    .collect();
                let method = tree::text(name, source).to_ascii_lowercase();
                if method == "__construct" {
                    for (node, param) in &params {
                        if node.kind() == "property_promotion_parameter" && is_public(*node, source) {
                            class.properties.push(Property {
                                name: param.name.clone(),
                                type_name: param.type_name.clone(),
                                builtin: param.builtin,
                                nullable: param.nullable,
                            });
                        }
                    }
                }
                class
                    .methods
                    .insert(method, params.into_iter().map(|(_, param)| param).collect());
            }
            _ => {}
        }
    }
}

/// Public unless a `protected` or `private` modifier says otherwise.
fn is_public(node: Node<'_>, source: &str) -> bool {
    !tree::children(node).iter().any(|child| {
        child.kind() == "visibility_modifier"
            && matches!(
                tree::text(*child, source).to_ascii_lowercase().as_str(),
                "protected" | "private"
            )
    })
}

/// The name of the first variable under `node`, without `$`.
fn variable_name(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "variable_name" {
        return Some(tree::text(node, source).trim_start_matches('$').to_string());
    }
    tree::children(node)
        .into_iter()
        .find_map(|child| variable_name(child, source))
}

fn parameter(node: Node<'_>, source: &str, names: &NameContext) -> Option<Parameter> {
    let name = variable_name(node.child_by_field_name("name")?, source)?;
    let declared = node.child_by_field_name("type").map(|ty| render(ty, source));
    let has_default = fields(node)
        .iter()
        .any(|(field, child)| *field == Some("default_value") || child.kind() == "=");
    let (type_name, builtin, nullable) = resolve_type(declared.as_deref(), names);
    Some(Parameter {
        name,
        type_name,
        builtin,
        nullable,
        has_default,
    })
}

/// Resolve a declared type to (name, builtin, nullable).
fn resolve_type(declared: Option<&str>, names: &NameContext) -> (Option<String>, bool, bool) {
    let Some(declared) = declared else {
        return (None, false, false);
    };
    let declared: String = declared.chars().filter(|c| !c.is_whitespace()).collect();
    let mut nullable = false;
    let mut declared = declared.as_str();
    if let Some(rest) = declared.strip_prefix('?') {
        nullable = true;
        declared = rest;
    }
    let members: Vec<&str> = declared.split('|').filter(|m| !m.is_empty()).collect();
    let named: Vec<&str> = members
        .iter()
        .copied()
        .filter(|m| !m.eq_ignore_ascii_case("null"))
        .collect();
    if named.len() < members.len() {
        nullable = true;
    }

    match named.as_slice() {
        [single] if !single.contains('&') && !single.contains('(') => {
            let lower = single.to_ascii_lowercase();
            if BUILTIN_TYPES.contains(&lower.as_str()) {
                if lower == "mixed" {
                    nullable = true;
                }
                (Some(lower), true, nullable)
            } else {
                (Some(names.resolve(single)), false, nullable)
            }
        }
        _ => (None, false, nullable),
    }
}
