//! Core data structures for the adventures application.
//!
//! This module contains the committed [`Adventure`] record and the
//! [`AdventureDraft`] the form edits before it becomes one.
use serde::{Deserialize, Serialize};

use crate::Coordinates;

/// A picked place: composed address plus its coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human readable address, e.g. "Av. Paulista, São Paulo, SP"
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(address: impl Into<String>, coordinates: Coordinates) -> Self {
        Location {
            address: address.into(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }

    /// The location's position, if it holds a valid coordinate pair
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude, self.longitude).ok()
    }
}

/// Represents a single recorded adventure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adventure {
    /// Unique identifier, assigned when the adventure is created
    pub id: String,
    /// Adventure name
    pub name: String,
    /// Free text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form textual date, never parsed on input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Opaque reference (URI) to a captured photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Where it happened, absent until picked on the map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Adventure {
    /// Creates an adventure with only an id and a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Adventure {
            id: id.into(),
            name: name.into(),
            description: None,
            date: None,
            image: None,
            location: None,
        }
    }
}

/// Text fields the user types into the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Date,
    Description,
}

/// The in-progress, uncommitted adventure edited by the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdventureDraft {
    pub name: String,
    pub date: String,
    pub description: String,
    pub image: Option<String>,
    pub location: Option<Location>,
}

impl AdventureDraft {
    /// Pre-fills a draft from an existing record
    pub fn from_adventure(adventure: &Adventure) -> Self {
        AdventureDraft {
            name: adventure.name.clone(),
            date: adventure.date.clone().unwrap_or_default(),
            description: adventure.description.clone().unwrap_or_default(),
            image: adventure.image.clone(),
            location: adventure.location.clone(),
        }
    }

    pub fn set(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::Name => self.name = value,
            DraftField::Date => self.date = value,
            DraftField::Description => self.description = value,
        }
    }

    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::Name => &self.name,
            DraftField::Date => &self.date,
            DraftField::Description => &self.description,
        }
    }

    /// Commits the draft into a record with the given id.
    ///
    /// Blank optional text fields become `None`.
    pub fn into_adventure(self, id: String) -> Adventure {
        Adventure {
            id,
            name: self.name,
            description: non_blank(self.description),
            date: non_blank(self.date),
            image: self.image.filter(|uri| !uri.trim().is_empty()),
            location: self.location,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
