//! Variables a class-backed view is rendered with: the public properties of
//! its component or Livewire class.

use crate::decorate::{PhpType, VariableAndType};
use crate::reflect::ClassReflector;
use php_syntax::Property;

const VIEW_COMPONENT: &str = "Illuminate\\View\\Component";
const LIVEWIRE_COMPONENT: &str = "Livewire\\Component";
const COMPONENT_SLOT: &str = "Illuminate\\View\\ComponentSlot";

/// Parent classes followed before giving up on a hierarchy.
const MAX_ANCESTORS: usize = 32;

/// Public properties of `class` and its project ancestors, child first.
///
/// View components also get `$slot`; Livewire components get `$__livewire`,
/// `$_instance` and `$this`, all typed as the component itself. Returns `None`
/// when the class declaration cannot be read.
pub fn class_variables<C: ClassReflector + ?Sized>(
    reflector: &C,
    class: &str,
) -> Option<Vec<VariableAndType>> {
    let class = class.trim().trim_start_matches('\\');
    let decl = reflector.class_declaration(class)?;

    let mut variables: Vec<VariableAndType> = Vec::new();
    for property in &decl.properties {
        push(&mut variables, property_variable(property));
    }

    let mut base = None;
    let mut parent = decl.extends;
    for _ in 0..MAX_ANCESTORS {
        let Some(name) = parent.take() else {
            break;
        };
        if [VIEW_COMPONENT, LIVEWIRE_COMPONENT]
            .iter()
            .any(|known| name.eq_ignore_ascii_case(known))
        {
            base = Some(name);
            break;
        }
        let Some(ancestor) = reflector.class_declaration(&name) else {
            tracing::debug!(class, parent = %name, "ancestor not reflected");
            break;
        };
        for property in &ancestor.properties {
            push(&mut variables, property_variable(property));
        }
        parent = ancestor.extends;
    }

    match base.as_deref() {
        Some(name) if name.eq_ignore_ascii_case(VIEW_COMPONENT) => {
            push(
                &mut variables,
                VariableAndType::new("slot", PhpType::object(COMPONENT_SLOT)),
            );
        }
        Some(_) => {
            for name in ["__livewire", "_instance", "this"] {
                push(&mut variables, VariableAndType::new(name, PhpType::object(class)));
            }
        }
        None => {}
    }
    Some(variables)
}

/// Add `variable` unless a variable of that name is already present.
fn push(variables: &mut Vec<VariableAndType>, variable: VariableAndType) {
    if !variables.iter().any(|v| v.name == variable.name) {
        variables.push(variable);
    }
}

fn property_variable(property: &Property) -> VariableAndType {
    let ty = match &property.type_name {
        None => PhpType::Mixed,
        Some(name) if name == "mixed" => PhpType::Mixed,
        Some(name) if property.builtin => PhpType::parse(name),
        Some(name) => PhpType::object(name.as_str()),
    };
    let ty = if property.nullable && ty != PhpType::Mixed {
        PhpType::Nullable(Box::new(ty))
    } else {
        ty
    };
    VariableAndType::new(property.name.as_str(), ty)
}
