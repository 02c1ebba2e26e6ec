#![no_main]
use arbor::backend::program::ProgramBuilder;
use arbor::backend::ruby::RubyBuilder;
use arbor::grammar::Grammar;
use libfuzzer_sys::fuzz_target;

// Any JSON document must either be rejected with an error or compile cleanly
// with every backend.
fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(grammar) = Grammar::from_sexp(&value) else {
        return;
    };
    assert_eq!(Grammar::from_sexp(&grammar.to_sexp()).as_ref(), Ok(&grammar));

    let program = arbor::compile(&grammar, ProgramBuilder::new("fuzz.peg"));
    let ruby = arbor::compile(&grammar, RubyBuilder::new("fuzz.peg"));
    assert_eq!(program.is_ok(), ruby.is_ok());
});
