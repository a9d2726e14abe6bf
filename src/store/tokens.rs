use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::types::{KernelError, Result, TokenKind};

#[derive(Default)]
struct TokenTable {
    by_name: FxHashMap<String, u32>,
    names: Vec<String>,
}

/// Name-to-id interning for one token kind. Ids are dense and start at zero.
pub struct TokenHolder {
    kind: TokenKind,
    table: RwLock<TokenTable>,
}

impl TokenHolder {
    /// Empty holder for `kind`.
    pub fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            table: RwLock::new(TokenTable::default()),
        }
    }

    /// Id of `name`, if interned.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.table.read().by_name.get(name).copied()
    }

    /// Name of `id`.
    pub fn name_of(&self, id: u32) -> Result<String> {
        self.table
            .read()
            .names
            .get(id as usize)
            .cloned()
            .ok_or(KernelError::TokenNotFound {
                kind: self.kind,
                id,
            })
    }

    /// Returns the id of `name`, interning it if needed. The flag tells whether it was new.
    pub fn get_or_create(&self, name: &str) -> (u32, bool) {
        if let Some(id) = self.id_of(name) {
            return (id, false);
        }
        let mut table = self.table.write();
        if let Some(id) = table.by_name.get(name) {
            return (*id, false);
        }
        let id = table.names.len() as u32;
        table.names.push(name.to_owned());
        table.by_name.insert(name.to_owned(), id);
        (id, true)
    }

    /// Interns `name` under a fixed `id`, as recorded in a command log.
    pub fn restore(&self, id: u32, name: &str) -> Result<()> {
        let mut table = self.table.write();
        if id as usize != table.names.len() {
            return Err(KernelError::Invariant(format!(
                "{} token {id} ({name:?}) restored out of order",
                self.kind
            )));
        }
        table.names.push(name.to_owned());
        table.by_name.insert(name.to_owned(), id);
        Ok(())
    }

    /// Number of interned names; also the id the next new name gets.
    pub fn len(&self) -> u32 {
        self.table.read().names.len() as u32
    }

    /// Whether no name has been interned.
    pub fn is_empty(&self) -> bool {
        self.table.read().names.is_empty()
    }

    /// Every `(id, name)` pair in id order.
    pub fn all(&self) -> Vec<(u32, String)> {
        self.table
            .read()
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.clone()))
            .collect()
    }
}

/// The three token holders of a database.
pub struct TokenHolders {
    labels: TokenHolder,
    property_keys: TokenHolder,
    relationship_types: TokenHolder,
}

impl Default for TokenHolders {
    fn default() -> Self {
        Self {
            labels: TokenHolder::new(TokenKind::Label),
            property_keys: TokenHolder::new(TokenKind::PropertyKey),
            relationship_types: TokenHolder::new(TokenKind::RelationshipType),
        }
    }
}

impl TokenHolders {
    /// Holder for `kind`.
    pub fn holder(&self, kind: TokenKind) -> &TokenHolder {
        match kind {
            TokenKind::Label => &self.labels,
            TokenKind::PropertyKey => &self.property_keys,
            TokenKind::RelationshipType => &self.relationship_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let holder = TokenHolder::new(TokenKind::Label);
        assert_eq!(holder.get_or_create("Person"), (0, true));
        assert_eq!(holder.get_or_create("City"), (1, true));
        assert_eq!(holder.get_or_create("Person"), (0, false));
        assert_eq!(holder.name_of(1).expect("exists"), "City");
        assert!(matches!(
            holder.name_of(5),
            Err(KernelError::TokenNotFound { id: 5, .. })
        ));
    }

    #[test]
    fn restore_requires_dense_order() {
        let holder = TokenHolder::new(TokenKind::PropertyKey);
        holder.restore(0, "name").expect("first");
        assert!(holder.restore(2, "age").is_err());
        assert_eq!(holder.id_of("name"), Some(0));
    }
}
