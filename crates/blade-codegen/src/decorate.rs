//! `@var` declarations for the variables a template is rendered with.

use php_syntax::{Comment, Stmt};
use std::fmt;

const BUILTIN_TYPES: &[&str] = &[
    "array", "bool", "callable", "false", "float", "int", "iterable", "mixed", "null", "object",
    "string", "true",
];

/// Type of a variable passed to a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhpType {
    Mixed,
    /// A class or interface by fully-qualified name.
    Object(String),
    /// `$this` of the given class.
    This(String),
    Nullable(Box<PhpType>),
    /// Any other PHPDoc type, kept as written.
    Raw(String),
}

impl PhpType {
    /// Read a PHPDoc type as written in configuration or render metadata.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("mixed") {
            return Self::Mixed;
        }
        if let Some(inner) = text.strip_prefix('?') {
            return Self::Nullable(Box::new(Self::parse(inner)));
        }
        let lower = text.to_ascii_lowercase();
        let is_class = text
            .trim_start_matches('\\')
            .split('\\')
            .all(|part| {
                part.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
                    && part.chars().all(|c| c.is_alphanumeric() || c == '_')
            });
        if is_class && !BUILTIN_TYPES.contains(&lower.as_str()) {
            Self::Object(text.trim_start_matches('\\').to_string())
        } else {
            Self::Raw(text.to_string())
        }
    }

    /// A class type by fully-qualified name.
    pub fn object(class: impl Into<String>) -> Self {
        Self::Object(class.into())
    }

    /// The type as written in a PHPDoc tag.
    pub fn describe(&self) -> String {
        match self {
            Self::Mixed => "mixed".to_string(),
            Self::Object(class) | Self::This(class) => class.clone(),
            Self::Nullable(inner) => match inner.as_ref() {
                Self::Mixed => "mixed".to_string(),
                inner => format!("{}|null", inner.describe()),
            },
            Self::Raw(text) => text.clone(),
        }
    }
}

impl fmt::Display for PhpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A template variable and its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAndType {
    pub name: String,
    pub ty: PhpType,
}

impl VariableAndType {
    /// A variable; a leading `$` in `name` is dropped.
    pub fn new(name: impl Into<String>, ty: PhpType) -> Self {
        Self {
            name: name.into().trim_start_matches('$').to_string(),
            ty,
        }
    }

    /// The PHPDoc spelling of the variable type.
    pub fn type_as_string(&self) -> String {
        self.ty.describe()
    }
}

/// One `/** @var T $name */` statement per variable, in order.
pub fn var_docs(variables: &[VariableAndType]) -> Vec<Stmt> {
    variables
        .iter()
        .map(|variable| {
            Stmt::nop(vec![Comment::new(
                format!("/** @var {} ${} */", variable.type_as_string(), variable.name),
                0,
            )])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use php_syntax::print;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_types() {
        assert_eq!(PhpType::parse("\\App\\Models\\User"), PhpType::object("App\\Models\\User"));
        assert_eq!(PhpType::parse(""), PhpType::Mixed);
        assert_eq!(PhpType::parse("int"), PhpType::Raw("int".to_string()));
        assert_eq!(
            PhpType::parse("array<int, App\\Models\\User>"),
            PhpType::Raw("array<int, App\\Models\\User>".to_string())
        );
        assert_eq!(
            PhpType::parse("?App\\Models\\User").describe(),
            "App\\Models\\User|null"
        );
    }

    #[test]
    fn test_this_describes_as_class() {
        let variable = VariableAndType::new("$component", PhpType::This("App\\View\\Alert".into()));
        assert_eq!(variable.name, "component");
        assert_eq!(variable.type_as_string(), "App\\View\\Alert");
    }

    #[test]
    fn test_var_docs() {
        let docs = var_docs(&[
            VariableAndType::new("user", PhpType::object("App\\Models\\User")),
            VariableAndType::new("count", PhpType::parse("int")),
        ]);
        assert_eq!(
            print(&docs),
            "/** @var App\\Models\\User $user */\n/** @var int $count */"
        );
    }
}
