use std::fmt;

use crate::gsql_parser::ast::ObjectName;

/// Case-insensitive identifier key. Schema, table, column and alias maps
/// all key on this so the folding rule cannot drift between subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentKey(String);

impl IdentKey {
    pub fn new(name: &str) -> Self {
        IdentKey(name.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentKey {
    fn from(name: &str) -> Self {
        IdentKey::new(name)
    }
}

impl From<&String> for IdentKey {
    fn from(name: &String) -> Self {
        IdentKey::new(name)
    }
}

impl fmt::Display for IdentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive (schema, table) key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub schema: IdentKey,
    pub table: IdentKey,
}

impl TableKey {
    pub fn new(schema: &str, table: &str) -> Self {
        TableKey {
            schema: IdentKey::new(schema),
            table: IdentKey::new(table),
        }
    }

    pub fn from_object(object: &ObjectName) -> Self {
        TableKey::new(object.schema_or_default(), &object.base)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
