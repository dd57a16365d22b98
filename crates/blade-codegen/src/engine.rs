//! Component lookup backed by the project's views and classes.

use crate::finder::TemplateFinder;
use crate::reflect::ClassReflector;
use blade_compiler::{component_class_name, ComponentLookup};

/// Resolves `<x-...>` tags against a view finder and a class reflector.
pub struct ProjectComponents<'a, F: ?Sized, C: ?Sized> {
    finder: &'a F,
    reflector: &'a C,
    namespace: &'a str,
}

impl<'a, F, C> ProjectComponents<'a, F, C>
where
    F: TemplateFinder + ?Sized,
    C: ClassReflector + ?Sized,
{
    /// Look up components in `namespace` and the anonymous component views.
    pub fn new(finder: &'a F, reflector: &'a C, namespace: &'a str) -> Self {
        Self {
            finder,
            reflector,
            namespace,
        }
    }
}

impl<F, C> ComponentLookup for ProjectComponents<'_, F, C>
where
    F: TemplateFinder + ?Sized,
    C: ClassReflector + ?Sized,
{
    fn component_class(&self, name: &str) -> Option<String> {
        if name.contains("::") {
            return None;
        }
        let class = component_class_name(self.namespace, name);
        self.reflector.class_exists(&class).then_some(class)
    }

    fn constructor_parameters(&self, class: &str) -> Option<Vec<String>> {
        self.reflector
            .method_parameters(class, "__construct")
            .map(|params| params.into_iter().map(|p| p.name).collect())
    }

    fn view_exists(&self, view: &str) -> bool {
        self.finder.find(view).is_ok()
    }
}
