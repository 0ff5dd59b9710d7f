use indexmap::{IndexMap, IndexSet};

use crate::graph_catalog::ident::IdentKey;
use crate::gsql_parser::ast::ObjectName;

/// Table aliases and declared variables of one enclosing scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFrame {
    aliases: IndexMap<IdentKey, ObjectName>,
    variables: IndexSet<IdentKey>,
}

impl ScopeFrame {
    pub fn new() -> Self {
        ScopeFrame::default()
    }

    pub fn with_alias(mut self, alias: &str, object: ObjectName) -> Self {
        self.aliases.insert(IdentKey::new(alias), object);
        self
    }

    pub fn with_variable(mut self, name: &str) -> Self {
        self.variables.insert(IdentKey::new(name));
        self
    }
}

/// Lexical chain of enclosing procedural scopes. A frame is pushed when a
/// procedural or declare statement is entered and popped on exit; lookups
/// walk innermost-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeChain {
    frames: Vec<ScopeFrame>,
}

impl ScopeChain {
    pub fn new() -> Self {
        ScopeChain::default()
    }

    pub fn push_frame(&mut self, frame: ScopeFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<&ObjectName> {
        let key = IdentKey::new(alias);
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.aliases.get(&key))
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.resolve_alias(alias).is_some()
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        let key = IdentKey::new(name);
        self.frames.iter().rev().any(|frame| frame.variables.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_frame_shadows_outer() {
        let mut scopes = ScopeChain::new();
        scopes.push_frame(ScopeFrame::new().with_alias("x", ObjectName::bare("Employee")));
        scopes.push_frame(ScopeFrame::new().with_alias("x", ObjectName::bare("Client")));
        assert_eq!(scopes.resolve_alias("x"), Some(&ObjectName::bare("Client")));
        scopes.pop_frame();
        assert_eq!(scopes.resolve_alias("X"), Some(&ObjectName::bare("Employee")));
    }

    #[test]
    fn test_variables_are_scope_wide() {
        let mut scopes = ScopeChain::new();
        scopes.push_frame(ScopeFrame::new().with_variable("minAge"));
        assert!(scopes.contains_variable("MINAGE"));
        scopes.pop_frame();
        assert!(!scopes.contains_variable("minAge"));
    }
}
