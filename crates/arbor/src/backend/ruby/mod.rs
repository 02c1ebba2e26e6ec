//! Ruby backend
//!
//! Emits one self-contained Ruby file per grammar: the grammar's module
//! holding the syntax node classes, a `Grammar` mixin with one memoized
//! `_read_<rule>` method per rule, the `Parser` class and a module-level
//! `parse` function.

mod quote;

use compact_str::CompactString;

use crate::backend::{Backend, NodeClass, Output, Var, VarIndex, output_path};
use crate::error::CompileResult;
use crate::grammar::END_OF_INPUT_DESCRIPTION;

pub use quote::{quote, regex_literal};

const BASE_CLASS: &str = "TreeNode";

/// Configuration for the Ruby backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyConfig {
    /// One level of indentation
    pub indent: String,
    /// Extension of grammar files, replaced in the output path
    pub source_extension: String,
    /// Extension of generated files
    pub output_extension: String,
}

impl Default for RubyConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_owned(),
            source_extension: "peg".to_owned(),
            output_extension: "rb".to_owned(),
        }
    }
}

/// Writes Ruby source into a single buffer.
///
/// Nested blocks share the buffer and only change the indentation depth.
#[derive(Debug)]
pub struct RubyBuilder {
    destination: String,
    config: RubyConfig,
    buffer: String,
    depth: usize,
    vars: VarIndex,
    separate_methods: bool,
}

impl RubyBuilder {
    /// Builder for the parser generated from the grammar at `destination`.
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self::with_config(destination, RubyConfig::default())
    }

    #[must_use]
    pub fn with_config(destination: impl Into<String>, config: RubyConfig) -> Self {
        Self {
            destination: destination.into(),
            config,
            buffer: String::new(),
            depth: 0,
            vars: VarIndex::new(),
            separate_methods: false,
        }
    }

    fn line(&mut self, source: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.buffer.push_str(&self.config.indent);
        }
        self.buffer.push_str(source.as_ref());
        self.buffer.push('\n');
    }

    fn newline(&mut self) {
        self.buffer.push('\n');
    }

    fn indented<F>(&mut self, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    /// `opening`, the indented body, then `end`.
    fn block<F>(&mut self, opening: impl AsRef<str>, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.line(opening);
        let result = self.indented(body);
        self.line("end");
        result
    }

    /// A class or module body; methods inside start without a separator.
    fn container<F>(&mut self, opening: impl AsRef<str>, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let outer = std::mem::replace(&mut self.separate_methods, false);
        let result = self.block(opening, body);
        self.separate_methods = outer;
        result
    }

    fn method<F>(&mut self, name: &str, args: &[&str], body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        if self.separate_methods {
            self.newline();
        }
        self.separate_methods = true;

        let signature = if args.is_empty() {
            format!("def {name}")
        } else {
            format!("def {name}({})", args.join(", "))
        };
        let outer = std::mem::take(&mut self.vars);
        let result = self.block(signature, body);
        self.vars = outer;
        result
    }

    fn attributes(&mut self, names: &[&str]) {
        let mut line = String::from("attr_reader ");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            line.push(':');
            line.push_str(name);
        }
        self.line(line);
        self.separate_methods = true;
    }

    fn attribute(&mut self, name: &str, value: &str) {
        self.line(format!("@{name} = {value}"));
    }

    fn assign_raw(&mut self, target: &str, value: &str) {
        self.line(format!("{target} = {value}"));
    }

    /// Render the parse-error routine.
    fn format_error_method(&mut self) -> CompileResult<()> {
        self.method("self.format_error", &["input", "offset", "expected"], |b| {
            b.line(r"lines, line_no, position = input.split(/\n/, -1), 0, 0");
            b.line(r#"lines = [""] if lines.empty?"#);
            b.block("while position <= offset", |b| {
                b.line("position += lines[line_no].size + 1");
                b.line("line_no += 1");
                Ok(())
            })?;
            b.line(
                r#"message, line = "Line #{line_no}: expected #{expected * ", "}\n", lines[line_no - 1]"#,
            );
            b.line(r##"message += "#{line}\n""##);
            b.line("position -= line.size + 1");
            b.line(r#"message += " " * (offset - position)"#);
            b.line(r#"return message + "^""#);
            Ok(())
        })
    }
}

fn ruby_constant(dotted: &str) -> String {
    dotted.replace('.', "::")
}

impl Backend for RubyBuilder {
    type Expr = String;

    const NAME: &'static str = "ruby";

    fn offset(&self) -> String {
        "@offset".to_owned()
    }

    fn offset_plus(&self, length: usize) -> String {
        format!("@offset + {length}")
    }

    fn int(&self, value: i64) -> String {
        value.to_string()
    }

    fn null(&self) -> String {
        "nil".to_owned()
    }

    fn failure_node(&self) -> String {
        "FAILURE".to_owned()
    }

    fn empty_list(&self) -> String {
        "[]".to_owned()
    }

    fn load(&self, var: &Var) -> String {
        var.to_string()
    }

    fn is_zero(&self, var: &Var) -> String {
        format!("{var} <= 0")
    }

    fn has_chars(&self) -> String {
        "@offset < @input_size".to_owned()
    }

    fn is_failure(&self, var: &Var) -> String {
        format!("{var} == FAILURE")
    }

    fn not_failure(&self, var: &Var) -> String {
        format!("{var} != FAILURE")
    }

    fn is_null(&self, var: &Var) -> String {
        format!("{var}.nil?")
    }

    fn string_match(&self, chunk: &Var, text: &str, case_sensitive: bool) -> String {
        let text = quote(text);
        if case_sensitive {
            format!("{chunk} == {text}")
        } else {
            format!("!{chunk}.nil? && {chunk}.downcase == {text}.downcase")
        }
    }

    fn regex_match(&self, chunk: &Var, pattern: &str) -> String {
        format!("!{chunk}.nil? && {chunk} =~ {}", regex_literal(pattern))
    }

    fn quote(&self, text: &str) -> String {
        quote(text)
    }

    fn local_var(&mut self, base: &str, value: String) -> Var {
        let var = self.vars.fresh(base);
        self.assign_raw(var.as_str(), &value);
        var
    }

    fn local_vars<const N: usize>(&mut self, vars: [(&str, String); N]) -> [Var; N] {
        let mut names = Vec::with_capacity(N);
        let mut values = Vec::with_capacity(N);
        let declared = vars.map(|(base, value)| {
            let var = self.vars.fresh(base);
            names.push(var.to_string());
            values.push(value);
            var
        });
        self.assign_raw(&names.join(", "), &values.join(", "));
        declared
    }

    fn assign(&mut self, target: &Var, value: String) {
        self.assign_raw(target.as_str(), &value);
    }

    fn set_offset(&mut self, value: String) {
        self.assign_raw("@offset", &value);
    }

    fn chunk(&mut self, length: usize) -> Var {
        let [chunk, max] = self.local_vars([("chunk", self.null()), ("max", self.offset_plus(length))]);
        self.line(format!("if {max} <= @input_size"));
        self.depth += 1;
        self.line(format!("{chunk} = @input[@offset...{max}]"));
        self.depth -= 1;
        self.line("end");
        chunk
    }

    fn append(&mut self, list: &Var, value: &Var) {
        self.line(format!("{list} << {value}"));
    }

    fn decrement(&mut self, var: &Var) {
        self.line(format!("{var} -= 1"));
    }

    fn syntax_node(
        &mut self,
        target: &Var,
        start: String,
        end: String,
        elements: Option<&Var>,
        action: Option<&str>,
        class: Option<&str>,
    ) {
        let elements = elements.map_or_else(|| self.empty_list(), ToString::to_string);
        let value = match action {
            Some(action) => format!("@actions.{action}(@input, {start}, {end}, {elements})"),
            None => format!(
                "{}.new(@input[{start}...{end}], {start}, {elements})",
                class.unwrap_or(BASE_CLASS)
            ),
        };
        self.assign_raw(target.as_str(), &value);
        self.set_offset(end);
    }

    fn failure(&mut self, target: &Var, expected: &str) {
        let expected = quote(expected);
        self.assign_raw(target.as_str(), "FAILURE");
        self.line("if @offset > @failure");
        self.depth += 1;
        self.line("@failure = @offset");
        self.line("@expected = []");
        self.depth -= 1;
        self.line("end");
        self.line("if @offset == @failure");
        self.depth += 1;
        self.line(format!("@expected << {expected}"));
        self.depth -= 1;
        self.line("end");
    }

    fn jump(&mut self, target: &Var, rule: &str) {
        self.line(format!("{target} = _read_{rule}"));
    }

    fn extend_node(&mut self, target: &Var, type_name: &str) {
        self.line(format!("{target}.extend(@types::{})", ruby_constant(type_name)));
    }

    fn save_failures(&mut self) -> Var {
        self.local_var("failure", "[@failure, @expected.dup]".to_owned())
    }

    fn restore_failures(&mut self, saved: &Var) {
        self.line(format!("@failure, @expected = {saved}"));
    }

    fn if_<F>(&mut self, condition: String, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.block(format!("if {condition}"), then)
    }

    fn if_else<F, G>(&mut self, condition: String, then: F, otherwise: G) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
        G: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.line(format!("if {condition}"));
        let result = self.indented(then).and_then(|()| {
            self.line("else");
            self.indented(otherwise)
        });
        self.line("end");
        result
    }

    fn while_not_failure<F>(&mut self, var: &Var, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.block(format!("until {var} == FAILURE"), body)
    }

    fn package<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.container(format!("module {}", ruby_constant(name)), body)
    }

    fn syntax_node_class(&mut self) -> CompileResult<CompactString> {
        self.container(format!("class {BASE_CLASS}"), |b| {
            b.line("include Enumerable");
            b.attributes(&["text", "offset", "elements"]);
            b.method("initialize", &["text", "offset", "elements"], |b| {
                b.attribute("text", "text");
                b.attribute("offset", "offset");
                b.attribute("elements", "elements");
                Ok(())
            })?;
            b.method("each", &["&block"], |b| {
                b.line("@elements.each(&block)");
                Ok(())
            })
        })?;
        self.newline();
        Ok(CompactString::const_new(BASE_CLASS))
    }

    fn node_class(&mut self, class: &NodeClass, parent: &str) -> CompileResult<()> {
        let labels: Vec<&str> = class.labels.iter().map(|(name, _)| name.as_str()).collect();
        self.container(format!("class {} < {parent}", class.name), |b| {
            b.attributes(&labels);
            b.method("initialize", &["text", "offset", "elements"], |b| {
                b.line("super");
                for (name, index) in &class.labels {
                    b.attribute(name, &format!("elements[{index}]"));
                }
                Ok(())
            })
        })?;
        self.newline();
        Ok(())
    }

    fn grammar_module<F>(&mut self, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.assign_raw("ParseError", "Class.new(StandardError)");
        self.newline();
        self.assign_raw("FAILURE", "Object.new");
        self.newline();
        let result = self.container("module Grammar", body);
        self.newline();
        result
    }

    fn rule<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self, &Var) -> CompileResult<()>,
    {
        log::debug!("ruby: emitting rule `{name}`");
        self.method(&format!("_read_{name}"), &[], |b| {
            let [address, index] = b.local_vars([("address", b.failure_node()), ("index", b.offset())]);
            let slot = format!("@cache[:{name}][{index}]");
            b.assign_raw("cached", &slot);
            b.block("if cached", |b| {
                b.line("@offset = cached[1]");
                b.line("return cached[0]");
                Ok(())
            })?;
            body(b, &address)?;
            b.assign_raw(&slot, &format!("[{address}, @offset]"));
            b.line(format!("return {address}"));
            Ok(())
        })
    }

    fn parser_class(&mut self, root: &str) -> CompileResult<()> {
        self.container("class Parser", |b| {
            b.line("include Grammar");
            b.separate_methods = true;

            b.method("initialize", &["input", "actions", "types"], |b| {
                b.attribute("input", "input");
                b.attribute("input_size", "input.size");
                b.attribute("actions", "actions");
                b.attribute("types", "types");
                b.attribute("offset", "0");
                b.attribute("cache", "Hash.new { |h, k| h[k] = {} }");
                b.attribute("failure", "0");
                b.attribute("expected", "[]");
                Ok(())
            })?;

            b.method("parse", &[], |b| {
                b.line(format!("tree = _read_{root}"));
                b.block("if tree != FAILURE and @offset == @input_size", |b| {
                    b.line("return tree");
                    Ok(())
                })?;
                b.block("if @expected.empty?", |b| {
                    b.line("@failure = @offset");
                    b.line(format!("@expected << {}", quote(END_OF_INPUT_DESCRIPTION)));
                    Ok(())
                })?;
                b.line("raise ParseError, Parser.format_error(@input, @failure, @expected)");
                Ok(())
            })?;

            b.format_error_method()
        })?;
        self.newline();
        Ok(())
    }

    fn exports(&mut self) -> CompileResult<()> {
        self.method("self.parse", &["input", "options = {}"], |b| {
            b.line("parser = Parser.new(input, options[:actions], options[:types])");
            b.line("parser.parse");
            Ok(())
        })
    }

    fn finish(self) -> CompileResult<Output> {
        let path = output_path(
            &self.destination,
            &self.config.source_extension,
            &self.config.output_extension,
        );
        let mut output = Output::new();
        output.insert(path, self.buffer);
        Ok(output)
    }
}
