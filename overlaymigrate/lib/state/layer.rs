use std::{collections::HashMap, path::PathBuf};

use getset::Getters;

use crate::{MigrateError, MigrateResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kind of side effect a [`Meta`] record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    /// The path exists in an ancestor and this layer deletes it.
    Whiteout,

    /// The directory at the path hides every entry its ancestors put in it.
    Opaque,
}

/// A per-path side effect recorded in a layer's own content delta.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Meta {
    /// What the record means.
    kind: MetaKind,

    /// The affected path relative to the layer's content root, marker prefix stripped.
    path: PathBuf,
}

/// A single union filesystem layer.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Layer {
    /// The layer ID.
    id: String,

    /// Ancestor IDs, nearest first. Empty for a base layer.
    parent_ids: Vec<String>,

    /// Marker records of this layer's delta, in walk order.
    meta: Vec<Meta>,
}

/// Every layer found under a legacy root, in enumeration order.
///
/// Parent references are resolved to indices once at construction, so every ID in a layer's
/// `parent_ids` is guaranteed to name another layer of the same state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct State {
    layers: Vec<Layer>,
    index: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Meta {
    /// Creates a new record.
    pub fn new(kind: MetaKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Creates a deletion record.
    pub fn whiteout(path: impl Into<PathBuf>) -> Self {
        Self::new(MetaKind::Whiteout, path)
    }

    /// Creates an opaque directory record.
    pub fn opaque(path: impl Into<PathBuf>) -> Self {
        Self::new(MetaKind::Opaque, path)
    }
}

impl Layer {
    /// Creates a new layer.
    pub fn new(id: impl Into<String>, parent_ids: Vec<String>, meta: Vec<Meta>) -> Self {
        Self {
            id: id.into(),
            parent_ids,
            meta,
        }
    }

    /// Returns true if the layer has no ancestors.
    pub fn is_base(&self) -> bool {
        self.parent_ids.is_empty()
    }
}

impl State {
    /// Builds a state from layers in enumeration order.
    ///
    /// # Errors
    /// Returns [`MigrateError::DanglingParent`] if a layer references a parent that is not among
    /// `layers`, or [`MigrateError::DuplicateLayer`] if two layers share an ID.
    pub fn new(layers: Vec<Layer>) -> MigrateResult<Self> {
        let mut index = HashMap::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            if index.insert(layer.id.clone(), i).is_some() {
                return Err(MigrateError::DuplicateLayer {
                    id: layer.id.clone(),
                });
            }
        }

        let parents = layers
            .iter()
            .map(|layer| {
                layer
                    .parent_ids
                    .iter()
                    .map(|parent| {
                        index
                            .get(parent)
                            .copied()
                            .ok_or_else(|| MigrateError::DanglingParent {
                                id: layer.id.clone(),
                                parent: parent.clone(),
                            })
                    })
                    .collect::<MigrateResult<Vec<_>>>()
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        Ok(Self {
            layers,
            index,
            parents,
        })
    }

    /// Returns the layers in enumeration order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Looks up a layer by ID.
    pub fn get(&self, id: &str) -> Option<&Layer> {
        self.index.get(id).map(|&i| &self.layers[i])
    }

    /// Returns the ancestors of the layer at `index`, nearest first.
    pub fn parents(&self, index: usize) -> impl Iterator<Item = &Layer> + '_ {
        self.parents
            .get(index)
            .into_iter()
            .flatten()
            .map(|&i| &self.layers[i])
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
