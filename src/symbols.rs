use std::collections::HashMap;

pub type SymbolId = usize;

/// Bidirectional string <-> dense id table.
///
/// Strings live in an arena indexed by their id, so `id -> string` is a
/// vector lookup and `string -> id` a single hash lookup. Ids are handed out
/// from 0 in first-seen order and never reused during a run.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    names: Vec<Box<str>>,
    ids: HashMap<Box<str>, SymbolId>,
}

impl SymbolTable {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len();
        let owned: Box<str> = name.into();
        self.names.push(owned.clone());
        self.ids.insert(owned, id);
        id
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: SymbolId) -> Option<&str> {
        self.names.get(id).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
