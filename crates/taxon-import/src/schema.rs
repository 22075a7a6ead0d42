//! Column declarations for each importable entity kind.

use serde::{Deserialize, Serialize};

use taxon_core::Error;

/// An importable entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Taxonomy,
    Lexicon,
    Regional,
    Concepts,
    Relations,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Taxonomy,
        Self::Lexicon,
        Self::Regional,
        Self::Concepts,
        Self::Relations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Taxonomy => "taxonomy",
            Self::Lexicon => "lexicon",
            Self::Regional => "regional",
            Self::Concepts => "concepts",
            Self::Relations => "relations",
        }
    }

    /// Column set for this kind.
    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::Taxonomy => &TAXONOMY_SCHEMA,
            Self::Lexicon => &LEXICON_SCHEMA,
            Self::Regional => &REGIONAL_SCHEMA,
            Self::Concepts => &CONCEPTS_SCHEMA,
            Self::Relations => &RELATIONS_SCHEMA,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "taxonomy" => Ok(Self::Taxonomy),
            "lexicon" => Ok(Self::Lexicon),
            "regional" | "pronunciations" => Ok(Self::Regional),
            "concepts" => Ok(Self::Concepts),
            "relations" => Ok(Self::Relations),
            other => Err(Error::InvalidInput(format!(
                "unknown entity type '{}': expected one of taxonomy, lexicon, regional, concepts, relations",
                other
            ))),
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub required: bool,
    /// Whether the cell holds a `;`-separated list.
    pub multi_valued: bool,
}

const fn required(name: &'static str) -> Column {
    Column {
        name,
        required: true,
        multi_valued: false,
    }
}

const fn optional(name: &'static str) -> Column {
    Column {
        name,
        required: false,
        multi_valued: false,
    }
}

const fn list(name: &'static str) -> Column {
    Column {
        name,
        required: false,
        multi_valued: true,
    }
}

/// Ordered column set of an entity kind, plus example rows for templates.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub columns: &'static [Column],
    pub examples: &'static [&'static [&'static str]],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.required)
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

static TAXONOMY_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Taxonomy,
    columns: &[
        required("code"),
        required("name"),
        optional("description"),
        optional("parent_code"),
        required("level"),
        optional("icon"),
        optional("color"),
        optional("status"),
        list("synonyms"),
        list("keywords"),
    ],
    examples: &[
        &[
            "saude",
            "Saúde",
            "Health topics",
            "",
            "1",
            "heart",
            "#CC0000",
            "approved",
            "health;medicina",
            "saude;bem-estar",
        ],
        &[
            "saude.cardiologia",
            "Cardiologia",
            "Heart and circulation",
            "saude",
            "2",
            "",
            "#AA3344",
            "pending",
            "cardiology",
            "coracao;pressao",
        ],
    ],
};

static LEXICON_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Lexicon,
    columns: &[
        required("term"),
        required("definition"),
        optional("definition_simple"),
        optional("pronunciation_ipa"),
        optional("pronunciation_phonetic"),
        list("domain"),
        list("synonyms"),
    ],
    examples: &[&[
        "Hipertensão",
        "Elevação persistente da pressão arterial",
        "Pressão alta",
        "ipeʁtẽˈsɐ̃w",
        "i-per-ten-SÃO",
        "saude;cardiologia",
        "pressão alta;HAS",
    ]],
};

static REGIONAL_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Regional,
    columns: &[
        required("region_code"),
        required("term"),
        required("pronunciation"),
    ],
    examples: &[
        &["pt-BR-RJ", "mesmo", "mêj-mu"],
        &["pt-PT", "mesmo", "mêsh-mu"],
    ],
};

static CONCEPTS_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Concepts,
    columns: &[
        required("name"),
        optional("taxonomy_code"),
        optional("properties"),
    ],
    examples: &[&[
        "Hipertensão arterial",
        "saude.cardiologia",
        r#"{"icd10": "I10", "chronic": true}"#,
    ]],
};

static RELATIONS_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Relations,
    columns: &[
        required("subject"),
        required("predicate"),
        required("object"),
        optional("weight"),
    ],
    examples: &[&["Losartana", "treats", "Hipertensão arterial", "0.9"]],
};
