// Content rows as the camera sees them: ordered slugs, a type tag, gallery items.
// Loading and schema validation live in the host; only slug lookups happen here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Row type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowKind {
    Hero,
    About,
    Showreel,
    Services,
    PhotoGallery,
    FilmGallery,
    Contact,
}

impl RowKind {
    pub fn is_gallery(self) -> bool {
        matches!(self, RowKind::PhotoGallery | RowKind::FilmGallery)
    }
}

/// A gallery item. Only the slug matters for navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Item {
    pub fn new(slug: impl Into<String>) -> Self {
        Item {
            slug: slug.into(),
            title: None,
        }
    }
}

/// One content row of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: RowKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl Row {
    pub fn new(slug: impl Into<String>, kind: RowKind) -> Self {
        Row {
            slug: slug.into(),
            kind,
            items: Vec::new(),
        }
    }

    pub fn with_items<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = slugs.into_iter().map(Item::new).collect();
        self
    }

    /// Gallery items; other row types expose none.
    pub fn gallery_items(&self) -> &[Item] {
        if self.kind.is_gallery() {
            &self.items
        } else {
            &[]
        }
    }

    pub fn tile_index(&self, tile_slug: &str) -> Result<usize, EngineError> {
        self.gallery_items()
            .iter()
            .position(|item| item.slug == tile_slug)
            .ok_or_else(|| EngineError::UnknownTile {
                row: self.slug.clone(),
                tile: tile_slug.to_string(),
            })
    }
}

/// Columns and rows of the zoomed-out tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub columns: u32,
    pub rows: u32,
}

impl GridShape {
    pub const DEFAULT_COLUMNS: u32 = 4;

    pub fn new(columns: u32, rows: u32) -> Self {
        GridShape { columns, rows }
    }

    /// Wide enough to pan across media bands; tall enough for every row.
    pub fn for_rows(row_count: usize) -> Self {
        let columns = Self::DEFAULT_COLUMNS;
        let rows = row_count.div_ceil(columns as usize).max(1);
        GridShape {
            columns,
            rows: u32::try_from(rows).unwrap_or(u32::MAX),
        }
    }
}

pub fn row_index(rows: &[Row], slug: &str) -> Result<usize, EngineError> {
    rows.iter()
        .position(|row| row.slug == slug)
        .ok_or_else(|| EngineError::UnknownRow(slug.to_string()))
}

/// Rejects duplicate row slugs; duplicates would make focus ambiguous.
pub fn validate_rows(rows: &[Row]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for row in rows {
        if !seen.insert(row.slug.as_str()) {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate row slug '{}'",
                row.slug
            )));
        }
    }
    Ok(())
}
