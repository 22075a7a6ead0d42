//! Ontology concept and relation types.
//!
//! Concepts carry a typed property bag instead of free-form JSON: values are
//! restricted to strings, numbers, booleans and lists of strings, and the
//! bag is validated when parsed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::stored::Stored;

// =============================================================================
// PREDICATES
// =============================================================================

/// Closed set of relation predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OntologyPredicate {
    IsA,
    PartOf,
    HasPart,
    RelatedTo,
    Causes,
    Treats,
    Prevents,
    SymptomOf,
    LocatedIn,
    SynonymOf,
}

impl OntologyPredicate {
    /// All accepted predicates.
    pub const ALL: [OntologyPredicate; 10] = [
        Self::IsA,
        Self::PartOf,
        Self::HasPart,
        Self::RelatedTo,
        Self::Causes,
        Self::Treats,
        Self::Prevents,
        Self::SymptomOf,
        Self::LocatedIn,
        Self::SynonymOf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsA => "is_a",
            Self::PartOf => "part_of",
            Self::HasPart => "has_part",
            Self::RelatedTo => "related_to",
            Self::Causes => "causes",
            Self::Treats => "treats",
            Self::Prevents => "prevents",
            Self::SymptomOf => "symptom_of",
            Self::LocatedIn => "located_in",
            Self::SynonymOf => "synonym_of",
        }
    }
}

impl std::fmt::Display for OntologyPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OntologyPredicate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("Invalid predicate '{}'", s))
    }
}

// =============================================================================
// PROPERTY BAG
// =============================================================================

/// A single concept property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Validated property bag attached to an ontology concept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptProperties(BTreeMap<String, PropertyValue>);

impl ConceptProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object from a cell.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(raw)?;
        Self::from_json(&value)
    }

    /// Validate a JSON value against the property bag schema: a flat object
    /// whose values are strings, numbers, booleans or arrays of strings.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::InvalidInput("properties must be a JSON object".to_string())
        })?;

        let mut properties = BTreeMap::new();
        for (key, value) in object {
            if key.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "property names cannot be empty".to_string(),
                ));
            }
            let parsed = match value {
                JsonValue::Bool(b) => PropertyValue::Bool(*b),
                JsonValue::Number(n) => PropertyValue::Number(n.as_f64().ok_or_else(|| {
                    Error::InvalidInput(format!("property '{}' is not a finite number", key))
                })?),
                JsonValue::String(s) => PropertyValue::Text(s.clone()),
                JsonValue::Array(items) => PropertyValue::List(
                    items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                Error::InvalidInput(format!(
                                    "property '{}' must be a list of strings",
                                    key
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                JsonValue::Null | JsonValue::Object(_) => {
                    return Err(Error::InvalidInput(format!(
                        "property '{}' must be a string, number, boolean or list of strings",
                        key
                    )))
                }
            };
            properties.insert(key.clone(), parsed);
        }
        Ok(Self(properties))
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

// =============================================================================
// CONCEPTS
// =============================================================================

/// A validated concept input row, before its taxonomy link is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyConceptRecord {
    pub name: String,
    pub taxonomy_code: Option<String>,
    pub properties: ConceptProperties,
}

/// Persist-ready concept, upserted by `name_normalized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertConcept {
    pub name: String,
    pub name_normalized: String,
    pub taxonomy_id: Option<Uuid>,
    pub properties: ConceptProperties,
}

/// A persisted ontology concept.
pub type OntologyConcept = Stored<UpsertConcept>;

// =============================================================================
// RELATIONS
// =============================================================================

/// A validated relation input row; subject and object are concept names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyRelationRecord {
    pub subject: String,
    pub predicate: OntologyPredicate,
    pub object: String,
    pub weight: Option<f64>,
}

/// Persist-ready directed edge, upserted by `(subject_id, predicate, object_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRelation {
    pub subject_id: Uuid,
    pub predicate: OntologyPredicate,
    pub object_id: Uuid,
    pub weight: Option<f64>,
}

impl UpsertRelation {
    /// Build an edge, rejecting self-relations.
    pub fn new(
        subject_id: Uuid,
        predicate: OntologyPredicate,
        object_id: Uuid,
        weight: Option<f64>,
    ) -> Result<Self> {
        if subject_id == object_id {
            return Err(Error::InvalidInput(format!(
                "self-relation on concept {} is not allowed",
                subject_id
            )));
        }
        Ok(Self {
            subject_id,
            predicate,
            object_id,
            weight,
        })
    }

    /// Natural key of the edge.
    pub fn triple_key(&self) -> String {
        format!("{}|{}|{}", self.subject_id, self.predicate, self.object_id)
    }
}

/// A persisted ontology relation.
pub type OntologyRelation = Stored<UpsertRelation>;
