//! Named, unit-tagged halo properties

use crate::core_types::units::{Dimension, Quantity, Unit, VectorQuantity};
use crate::error::{SoError, SoResult};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ResultValue {
    Scalar(Quantity),
    Vector(VectorQuantity),
}

impl ResultValue {
    #[must_use]
    pub fn unit(&self) -> Unit {
        match self {
            ResultValue::Scalar(q) => q.unit(),
            ResultValue::Vector(v) => v.unit(),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.unit().dimension()
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<Quantity> {
        match self {
            ResultValue::Scalar(q) => Some(*q),
            ResultValue::Vector(_) => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<VectorQuantity> {
        match self {
            ResultValue::Vector(v) => Some(*v),
            ResultValue::Scalar(_) => None,
        }
    }
}

impl From<Quantity> for ResultValue {
    fn from(q: Quantity) -> Self {
        ResultValue::Scalar(q)
    }
}

impl From<VectorQuantity> for ResultValue {
    fn from(v: VectorQuantity) -> Self {
        ResultValue::Vector(v)
    }
}

/// A value and the description stored alongside it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub value: ResultValue,
    pub description: String,
}

fn insert_unique(
    entries: &mut BTreeMap<String, ResultEntry>,
    name: String,
    entry: ResultEntry,
) -> SoResult<()> {
    if entries.contains_key(&name) {
        return Err(SoError::DuplicateProperty(name));
    }
    entries.insert(name, entry);
    Ok(())
}

/// Output of one calculator for one halo; immutable once built
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HaloResult {
    entries: BTreeMap<String, ResultEntry>,
}

impl HaloResult {
    /// # Errors
    /// Returns `SoError::DuplicateProperty` if a name appears twice.
    pub fn from_entries<I, S, V>(entries: I) -> SoResult<Self>
    where
        I: IntoIterator<Item = (S, V, String)>,
        S: Into<String>,
        V: Into<ResultValue>,
    {
        let mut map = BTreeMap::new();
        for (name, value, description) in entries {
            insert_unique(
                &mut map,
                name.into(),
                ResultEntry {
                    value: value.into(),
                    description,
                },
            )?;
        }
        Ok(HaloResult { entries: map })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResultEntry> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<Quantity> {
        self.get(name)?.value.as_scalar()
    }

    #[must_use]
    pub fn vector(&self, name: &str) -> Option<VectorQuantity> {
        self.get(name)?.value.as_vector()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every property computed so far for one halo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HaloRecord {
    index: usize,
    entries: BTreeMap<String, ResultEntry>,
}

impl HaloRecord {
    #[must_use]
    pub fn new(index: usize) -> Self {
        HaloRecord {
            index,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fold one calculator's output into the record
    ///
    /// # Errors
    /// Returns `SoError::DuplicateProperty` if any name is already present;
    /// the record is left unchanged in that case.
    pub fn merge(&mut self, result: HaloResult) -> SoResult<()> {
        if let Some(name) = result.names().find(|n| self.entries.contains_key(*n)) {
            return Err(SoError::DuplicateProperty(name.to_string()));
        }
        for (name, entry) in result.entries {
            insert_unique(&mut self.entries, name, entry)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResultEntry> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<Quantity> {
        self.get(name)?.value.as_scalar()
    }

    #[must_use]
    pub fn vector(&self, name: &str) -> Option<VectorQuantity> {
        self.get(name)?.value.as_vector()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
