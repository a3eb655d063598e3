//! The declaration side-table: every scanned type, indexed by identity.
use super::types::*;
use crate::analysis::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

/// One immutable snapshot of declared types, as produced by a single declaration scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl Snapshot {
    pub fn new(types: Vec<TypeDecl>) -> Self { Self { types } }

    pub fn from_json_str(s: &str) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| AnalysisError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }
}

/// A second declaration of a type that could not be merged as a partial declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateDecl {
    pub name: TypeName,
    pub location: Location,
    pub first: Location,
}

#[derive(Debug, Clone, Default)]
pub struct DeclarationTable {
    types: BTreeMap<TypeName, TypeDecl>,
    pub duplicates: Vec<DuplicateDecl>,
}

impl DeclarationTable {
    pub fn new() -> Self { Self::default() }

    /// Indexes a snapshot. Extensible declarations of the same name are merged;
    /// any other repeated name is recorded as a duplicate and the first wins.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut table = Self::new();
        for decl in &snapshot.types {
            table.insert(decl.clone());
        }
        table
    }

    pub fn insert(&mut self, decl: TypeDecl) {
        match self.types.get_mut(&decl.name) {
            None => {
                self.types.insert(decl.name.clone(), decl);
            }
            Some(existing) if existing.extensible && decl.extensible => merge_partial(existing, decl),
            Some(existing) => self.duplicates.push(DuplicateDecl {
                name: decl.name,
                location: decl.location,
                first: existing.location.clone(),
            }),
        }
    }

    pub fn get(&self, name: &TypeName) -> Option<&TypeDecl> { self.types.get(name) }

    pub fn contains(&self, name: &TypeName) -> bool { self.types.contains_key(name) }

    pub fn count(&self) -> usize { self.types.len() }

    /// Iterates declarations in name order, which keeps every pass deterministic.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> { self.types.values() }

    /// Whether `ty` is, inherits from, or implements `target`.
    /// Bases that are not part of the snapshot are still followed by name.
    pub fn implements(&self, ty: &TypeName, target: &TypeName) -> bool {
        if ty == target {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([ty]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(decl) = self.types.get(current) {
                for base in &decl.bases {
                    if base == target {
                        return true;
                    }
                    queue.push_back(base);
                }
            }
        }
        false
    }
}

fn merge_partial(existing: &mut TypeDecl, part: TypeDecl) {
    existing.open_generic |= part.open_generic;
    existing.host |= part.host;
    existing.user |= part.user;
    existing.auto_scan |= part.auto_scan;
    existing.capabilities = existing.capabilities.union(part.capabilities);
    if existing.modules.is_none() {
        existing.modules = part.modules;
    }
    for base in part.bases {
        if !existing.bases.contains(&base) {
            existing.bases.push(base);
        }
    }
    existing.service.extend(part.service);
    existing.constructors.extend(part.constructors);
    existing.members.extend(part.members);
}
