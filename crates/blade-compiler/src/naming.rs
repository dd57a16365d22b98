//! Name conversions used when resolving components.

fn words(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `user-profile` -> `UserProfile`
pub fn studly_case(value: &str) -> String {
    words(value).map(upper_first).collect()
}

/// `user-name` -> `userName`
pub fn camel_case(value: &str) -> String {
    let studly = studly_case(value);
    let mut chars = studly.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Class name for a dotted component name under `namespace`.
///
/// `forms.text-input` in `App\View\Components` becomes
/// `App\View\Components\Forms\TextInput`.
pub fn component_class_name(namespace: &str, name: &str) -> String {
    let mut class = namespace.trim_matches('\\').to_string();
    for segment in name.split('.') {
        if !class.is_empty() {
            class.push('\\');
        }
        class.push_str(&studly_case(segment));
    }
    class
}
