//! Program backend
//!
//! Instead of source text this backend records the emitted operations as a
//! [`Program`]: one statement tree per rule routine. The program serializes
//! to JSON and runs directly on [`crate::testing::Machine`], which makes the
//! runtime behaviour of compiled grammars testable without a target-language
//! toolchain.

mod ir;

use compact_str::CompactString;

pub use ir::{Expr, Program, RuleDef, Stmt};

use crate::backend::{Backend, NodeClass, Output, Var, VarIndex, output_path};
use crate::error::{CompileError, CompileResult};

const BASE_CLASS: &str = "SyntaxNode";

/// Records emission calls as a [`Program`].
#[derive(Debug)]
pub struct ProgramBuilder {
    destination: String,
    program: Program,
    /// Open blocks, innermost last. The first frame collects statements
    /// emitted outside any rule, which have nowhere to run and are dropped.
    frames: Vec<Vec<Stmt>>,
    vars: VarIndex,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            program: Program {
                name: CompactString::default(),
                base_class: CompactString::const_new(BASE_CLASS),
                classes: Vec::new(),
                rules: Vec::new(),
                root: None,
            },
            frames: vec![Vec::new()],
            vars: VarIndex::new(),
        }
    }

    /// The program built so far.
    #[must_use]
    pub fn into_program(self) -> Program {
        if self.frames.first().is_some_and(|frame| !frame.is_empty()) {
            log::warn!("program: dropping statements emitted outside a rule");
        }
        self.program
    }

    fn emit(&mut self, stmt: Stmt) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(stmt);
        }
    }

    /// Collect everything `body` emits into a fresh block.
    fn nested<F>(&mut self, body: F) -> CompileResult<Vec<Stmt>>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.frames.push(Vec::new());
        let result = body(self);
        let block = self.frames.pop().unwrap_or_default();
        result.map(|()| block)
    }
}

impl Backend for ProgramBuilder {
    type Expr = Expr;

    const NAME: &'static str = "program";

    fn offset(&self) -> Expr {
        Expr::Offset
    }

    fn offset_plus(&self, length: usize) -> Expr {
        Expr::OffsetPlus(length)
    }

    fn int(&self, value: i64) -> Expr {
        Expr::Int(value)
    }

    fn null(&self) -> Expr {
        Expr::Null
    }

    fn failure_node(&self) -> Expr {
        Expr::Failure
    }

    fn empty_list(&self) -> Expr {
        Expr::EmptyList
    }

    fn load(&self, var: &Var) -> Expr {
        Expr::Var(var.clone())
    }

    fn is_zero(&self, var: &Var) -> Expr {
        Expr::IsZero(var.clone())
    }

    fn has_chars(&self) -> Expr {
        Expr::HasChars
    }

    fn is_failure(&self, var: &Var) -> Expr {
        Expr::IsFailure(var.clone())
    }

    fn not_failure(&self, var: &Var) -> Expr {
        Expr::NotFailure(var.clone())
    }

    fn is_null(&self, var: &Var) -> Expr {
        Expr::IsNull(var.clone())
    }

    fn string_match(&self, chunk: &Var, text: &str, case_sensitive: bool) -> Expr {
        Expr::StringMatch {
            chunk: chunk.clone(),
            text: text.to_owned(),
            case_sensitive,
        }
    }

    fn regex_match(&self, chunk: &Var, pattern: &str) -> Expr {
        Expr::RegexMatch {
            chunk: chunk.clone(),
            pattern: pattern.to_owned(),
        }
    }

    fn quote(&self, text: &str) -> String {
        serde_json::Value::from(text).to_string()
    }

    fn local_var(&mut self, base: &str, value: Expr) -> Var {
        let target = self.vars.fresh(base);
        self.assign(&target, value);
        target
    }

    fn local_vars<const N: usize>(&mut self, vars: [(&str, Expr); N]) -> [Var; N] {
        vars.map(|(base, value)| self.local_var(base, value))
    }

    fn assign(&mut self, target: &Var, value: Expr) {
        self.emit(Stmt::Assign {
            target: target.clone(),
            value,
        });
    }

    fn set_offset(&mut self, value: Expr) {
        self.emit(Stmt::SetOffset(value));
    }

    fn chunk(&mut self, length: usize) -> Var {
        let target = self.vars.fresh("chunk");
        self.emit(Stmt::Chunk {
            target: target.clone(),
            length,
        });
        target
    }

    fn append(&mut self, list: &Var, value: &Var) {
        self.emit(Stmt::Append {
            list: list.clone(),
            value: value.clone(),
        });
    }

    fn decrement(&mut self, var: &Var) {
        self.emit(Stmt::Decrement(var.clone()));
    }

    fn syntax_node(
        &mut self,
        target: &Var,
        start: Expr,
        end: Expr,
        elements: Option<&Var>,
        action: Option<&str>,
        class: Option<&str>,
    ) {
        self.emit(Stmt::SyntaxNode {
            target: target.clone(),
            start,
            end,
            elements: elements.cloned(),
            action: action.map(CompactString::from),
            class: class.map(CompactString::from),
        });
    }

    fn failure(&mut self, target: &Var, expected: &str) {
        self.emit(Stmt::Failure {
            target: target.clone(),
            expected: expected.to_owned(),
        });
    }

    fn jump(&mut self, target: &Var, rule: &str) {
        self.emit(Stmt::Call {
            target: target.clone(),
            rule: rule.into(),
        });
    }

    fn extend_node(&mut self, target: &Var, type_name: &str) {
        self.emit(Stmt::Extend {
            target: target.clone(),
            type_name: type_name.into(),
        });
    }

    fn save_failures(&mut self) -> Var {
        let saved = self.vars.fresh("failure");
        self.emit(Stmt::SaveFailures(saved.clone()));
        saved
    }

    fn restore_failures(&mut self, saved: &Var) {
        self.emit(Stmt::RestoreFailures(saved.clone()));
    }

    fn if_<F>(&mut self, condition: Expr, then: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let then = self.nested(then)?;
        self.emit(Stmt::If {
            condition,
            then,
            otherwise: Vec::new(),
        });
        Ok(())
    }

    fn if_else<F, G>(&mut self, condition: Expr, then: F, otherwise: G) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
        G: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let then = self.nested(then)?;
        let otherwise = self.nested(otherwise)?;
        self.emit(Stmt::If {
            condition,
            then,
            otherwise,
        });
        Ok(())
    }

    fn while_not_failure<F>(&mut self, var: &Var, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        let body = self.nested(body)?;
        self.emit(Stmt::WhileNotFailure {
            var: var.clone(),
            body,
        });
        Ok(())
    }

    fn package<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        self.program.name = name.into();
        body(self)
    }

    fn syntax_node_class(&mut self) -> CompileResult<CompactString> {
        Ok(self.program.base_class.clone())
    }

    fn node_class(&mut self, class: &NodeClass, _parent: &str) -> CompileResult<()> {
        self.program.classes.push(class.clone());
        Ok(())
    }

    fn grammar_module<F>(&mut self, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self) -> CompileResult<()>,
    {
        body(self)
    }

    fn rule<F>(&mut self, name: &str, body: F) -> CompileResult<()>
    where
        F: FnOnce(&mut Self, &Var) -> CompileResult<()>,
    {
        let outer = std::mem::take(&mut self.vars);
        let address = self.vars.fresh("address");
        let result = self.nested(|b| {
            b.assign(&address, Expr::Failure);
            body(b, &address)
        });
        self.vars = outer;
        self.program.rules.push(RuleDef {
            name: name.into(),
            address,
            body: result?,
        });
        Ok(())
    }

    fn parser_class(&mut self, root: &str) -> CompileResult<()> {
        self.program.root = Some(root.into());
        Ok(())
    }

    fn exports(&mut self) -> CompileResult<()> {
        Ok(())
    }

    fn finish(self) -> CompileResult<Output> {
        let path = output_path(&self.destination, "peg", "json");
        let program = self.into_program();
        let source = serde_json::to_string_pretty(&program).map_err(|err| CompileError::Emit {
            backend: Self::NAME,
            reason: err.to_string(),
        })?;
        let mut output = Output::new();
        output.insert(path, source);
        Ok(output)
    }
}
