//! PHP syntax for bladecheck, on top of tree-sitter-php.
//!
//! tree-sitter parses and validates; this crate lowers the syntax tree to a
//! small statement AST the template pipeline rewrites and prints. Statements
//! are structured (control flow, closures, imports); expressions are kept as
//! normalized text.

pub mod ast;
pub mod error;
pub mod expr;
pub mod members;
pub mod parser;
pub mod printer;
pub mod tree;

pub use ast::*;
pub use error::{ErrorCode, ParseError, ParseResult};
pub use expr::{
    balanced_prefix, binds_tighter_than_not, parse_array_literal, split_arguments,
    string_literal_value, ArrayItem,
};
pub use members::{class_declaration, method_parameters, ClassDecl, Parameter, Property};
pub use parser::{parse, parse_code};
pub use printer::{print, print_file};
pub use tree::{parse_tree, Grammar};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_compiled_template() {
        let source = "<?php if(isset($errors)): ?>\n<ul>\n<?php $__currentLoopData = $errors->all(); $__env->addLoop($__currentLoopData); foreach($__currentLoopData as $error): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop(); ?>\n<li><?php echo e($error); ?></li>\n<?php endforeach; $__env->popLoop(); $loop = $__env->getLastLoop(); ?>\n</ul>\n<?php endif; ?>\n";
        let stmts = parse(source).unwrap();
        assert_eq!(stmts.len(), 1);

        let mut foreach_count = 0;
        walk(&stmts, &mut |stmt| {
            if matches!(stmt.kind, StmtKind::Foreach(_)) {
                foreach_count += 1;
            }
        });
        assert_eq!(foreach_count, 1);
    }

    #[test]
    fn test_round_trip_code() {
        let code = "$a = ['x' => 1];\nif ($a) {\n    echo e($a['x']);\n}";
        assert_eq!(print(&parse_code(code).unwrap()), code);
    }
}
