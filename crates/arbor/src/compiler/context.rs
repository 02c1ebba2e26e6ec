use compact_str::CompactString;

use crate::grammar::analysis::node_class_name;

/// State threaded through one compilation, outside the backend.
#[derive(Debug, Default)]
pub(crate) struct CompileContext {
    rule: CompactString,
    classes: usize,
}

impl CompileContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enter_rule(&mut self, name: &str) {
        self.rule = name.into();
    }

    /// Rule currently being compiled, for error messages.
    pub(crate) fn rule(&self) -> &str {
        &self.rule
    }

    /// Name of the next labelled-sequence class, in the same order
    /// [`collect_node_classes`](crate::grammar::collect_node_classes) assigns them.
    pub(crate) fn next_class(&mut self) -> CompactString {
        self.classes += 1;
        node_class_name(self.classes)
    }
}
