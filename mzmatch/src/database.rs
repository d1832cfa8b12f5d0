//! Reference collections sorted by precursor mass
use std::collections::HashMap;
use std::io;
use std::ops::Index;

use identity_hash::BuildIdentityHasher;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parameters::SourceType;
use crate::reference::MoleculeReference;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
    #[error("Failed to (de)serialize the database: {0}")]
    SerializationError(
        #[from]
        #[source]
        serde_json::Error,
    ),
    #[error("References are not sorted by precursor m/z at position {index}")]
    UnsortedReferences { index: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDatabase {
    id: String,
    source: SourceType,
    references: Vec<MoleculeReference>,
}

/// An immutable reference library held in ascending precursor mass order, with a
/// lookup from library ID to entry.
#[derive(Debug, Default)]
pub struct ReferenceDatabase {
    id: String,
    source: SourceType,
    references: Vec<MoleculeReference>,
    id_index: HashMap<u32, usize, BuildIdentityHasher<u32>>,
}

impl ReferenceDatabase {
    /// Build a database, sorting `references` by precursor mass
    pub fn new(id: impl Into<String>, source: SourceType, mut references: Vec<MoleculeReference>) -> Self {
        references.sort_by(|a, b| a.precursor_mz.total_cmp(&b.precursor_mz));
        Self::from_sorted_unchecked(id, source, references)
    }

    /// Build a database from references the caller guarantees to be sorted by
    /// precursor mass. Searches over an unsorted collection silently miss entries.
    pub fn from_sorted_unchecked(
        id: impl Into<String>,
        source: SourceType,
        references: Vec<MoleculeReference>,
    ) -> Self {
        let mut id_index: HashMap<u32, usize, BuildIdentityHasher<u32>> =
            HashMap::with_capacity_and_hasher(references.len(), BuildIdentityHasher::default());
        for (i, r) in references.iter().enumerate() {
            id_index.entry(r.scan_id).or_insert(i);
        }
        Self {
            id: id.into(),
            source,
            references,
            id_index,
        }
    }

    /// Build a database from references expected to be sorted already, verifying it
    pub fn try_from_sorted(
        id: impl Into<String>,
        source: SourceType,
        references: Vec<MoleculeReference>,
    ) -> Result<Self, DatabaseError> {
        if let Some((index, _)) = references
            .iter()
            .tuple_windows()
            .find_position(|(a, b)| a.precursor_mz > b.precursor_mz)
        {
            return Err(DatabaseError::UnsortedReferences { index: index + 1 });
        }
        Ok(Self::from_sorted_unchecked(id, source, references))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    pub fn references(&self) -> &[MoleculeReference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MoleculeReference> {
        self.references.iter()
    }

    pub fn get_by_id(&self, library_id: u32) -> Option<&MoleculeReference> {
        self.id_index
            .get(&library_id)
            .and_then(|i| self.references.get(*i))
    }

    /// Write the database as JSON to `writer`
    pub fn save<W: io::Write>(&self, writer: W) -> Result<(), DatabaseError> {
        let stored = StoredDatabase {
            id: self.id.clone(),
            source: self.source,
            references: self.references.clone(),
        };
        serde_json::to_writer(writer, &stored)?;
        Ok(())
    }

    /// Read a database written by [`ReferenceDatabase::save`]
    pub fn load<R: io::Read>(reader: R) -> Result<Self, DatabaseError> {
        let stored: StoredDatabase = serde_json::from_reader(reader)?;
        Ok(Self::new(stored.id, stored.source, stored.references))
    }
}

impl Index<usize> for ReferenceDatabase {
    type Output = MoleculeReference;

    fn index(&self, index: usize) -> &Self::Output {
        &self.references[index]
    }
}

impl<'a> IntoIterator for &'a ReferenceDatabase {
    type Item = &'a MoleculeReference;
    type IntoIter = std::slice::Iter<'a, MoleculeReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.references.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn references() -> Vec<MoleculeReference> {
        vec![
            MoleculeReference::new(7, "c", 300.0),
            MoleculeReference::new(3, "a", 100.0),
            MoleculeReference::new(5, "b", 200.0),
        ]
    }

    #[test]
    fn test_sorted_and_indexed() {
        let db = ReferenceDatabase::new("db", SourceType::Msp, references());
        let masses: Vec<f64> = db.iter().map(|r| r.precursor_mz).collect();
        assert_eq!(masses, vec![100.0, 200.0, 300.0]);
        assert_eq!(db.get_by_id(7).unwrap().name, "c");
        assert!(db.get_by_id(8).is_none());
        assert_eq!(db[0].name, "a");
    }

    #[test]
    fn test_checked_constructor() {
        let err = ReferenceDatabase::try_from_sorted("db", SourceType::Msp, references()).unwrap_err();
        assert!(matches!(err, DatabaseError::UnsortedReferences { index: 1 }));
        let mut refs = references();
        refs.sort_by(|a, b| a.precursor_mz.total_cmp(&b.precursor_mz));
        assert!(ReferenceDatabase::try_from_sorted("db", SourceType::Msp, refs).is_ok());
    }

    #[test]
    fn test_save_load() -> Result<(), DatabaseError> {
        let db = ReferenceDatabase::new("db", SourceType::Lbm, references());
        let mut buffer = Vec::new();
        db.save(&mut buffer)?;
        let loaded = ReferenceDatabase::load(buffer.as_slice())?;
        assert_eq!(loaded.id(), "db");
        assert_eq!(loaded.source(), SourceType::Lbm);
        assert_eq!(loaded.references(), db.references());
        assert_eq!(loaded.get_by_id(5).unwrap().name, "b");
        Ok(())
    }
}
