//! Compile a grammar to Ruby
//!
//! Usage: `compile_grammar [grammar.json] [input]`
//!
//! The grammar is read in its serialized form (`["grammar", name, ["rule",
//! ...], ...]`). Without arguments a small key/value grammar is used. The
//! generated Ruby is written next to the grammar file, or printed when the
//! built-in grammar is used. With an input string, the grammar is also run on
//! it and the resulting tree or error is printed.

use std::error::Error;

use arbor::backend::ruby::RubyBuilder;
use arbor::grammar::Grammar;
use arbor::testing::{Machine, compile_program, format_tree};

const BUILTIN: &str = r#"["grammar", "Settings",
  ["rule", "settings", ["repeat", 0, ["reference", "line"]]],
  ["rule", "line", ["sequence",
    ["label", "key", ["repeat", 1, ["char-class", "[a-z_]"]]],
    ["string", "="],
    ["label", "value", ["repeat", 0, ["char-class", "[^\\n]"]]],
    ["string", "\n"]]]]"#;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next();
    let input = args.next();

    let (source, destination) = match &path {
        Some(path) => (std::fs::read_to_string(path)?, path.clone()),
        None => (BUILTIN.to_owned(), "settings.peg".to_owned()),
    };
    let grammar = Grammar::from_sexp(&serde_json::from_str(&source)?)?;

    let output = arbor::compile(&grammar, RubyBuilder::new(destination))?;
    for (file, ruby) in output.files() {
        if path.is_some() {
            std::fs::write(file, ruby)?;
            println!("wrote {}", file.display());
        } else {
            println!("# {}\n{ruby}", file.display());
        }
    }

    if let Some(input) = input {
        let program = compile_program(&grammar)?;
        match Machine::new(&program)?.parse(&input) {
            Ok(tree) => {
                let mut rendered = String::new();
                format_tree(&mut rendered, &tree, 0);
                print!("{rendered}");
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}
