//! Functions every program can call without declaring them.
//!
//! They are provided by the runtime the compiled program is linked against.

use begonia_source::Source;

pub const PRELUDE: &str = "\
func exit(code int) void;
func puts(text string) int;
func print_double(value double) void;
";

/// Returns the prelude as a [`Source`] so that it can go through the regular parser.
pub fn prelude_source() -> Source {
    Source::new("<prelude>", PRELUDE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use begonia_parser::ast::StmtKind;
    use begonia_parser::parser::Parser;

    #[test]
    fn test_prelude_is_forward_declarations() {
        let source = prelude_source();
        let block = Parser::new(&source).parse_program().unwrap();
        let names = block
            .iter()
            .map(|stmt| match &stmt.kind {
                StmtKind::DeclareFunc(func) => {
                    assert!(func.is_forward_decl());
                    func.name.as_str()
                }
                other => panic!("unexpected prelude statement {:?}", other),
            })
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["exit", "puts", "print_double"]);
    }
}
