use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldoutKind {
    /// Keyed by shader name.
    ShaderGroup,
    /// Keyed by material id.
    Properties,
    /// Keyed by material id.
    Textures,
}

/// Per-session expand/collapse state. Unknown keys read as collapsed.
#[derive(Debug, Clone, Default)]
pub struct FoldoutTable {
    open: HashMap<(FoldoutKind, String), bool>,
}

impl FoldoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, kind: FoldoutKind, key: &str) -> bool {
        self.open.get(&(kind, key.to_string())).copied().unwrap_or(false)
    }

    pub fn set(&mut self, kind: FoldoutKind, key: &str, open: bool) {
        self.open.insert((kind, key.to_string()), open);
    }

    pub fn toggle(&mut self, kind: FoldoutKind, key: &str) -> bool {
        let entry = self.open.entry((kind, key.to_string())).or_insert(false);
        *entry = !*entry;
        *entry
    }

    /// Keeps only entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(FoldoutKind, &str) -> bool,
    {
        self.open.retain(|(kind, key), _| keep(*kind, key));
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
