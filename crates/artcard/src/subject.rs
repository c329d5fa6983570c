//! The artist a card displays

use crate::config::CountLabels;
use serde::{Deserialize, Serialize};

/// Immutable display data for one artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub albums_count: u32,
    #[serde(default)]
    pub tracks_count: u32,
    /// Reference handed to the image provider
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl Subject {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            albums_count: 0,
            tracks_count: 0,
            image_uri: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_counts(mut self, albums: u32, tracks: u32) -> Self {
        self.albums_count = albums;
        self.tracks_count = tracks;
        self
    }

    pub fn with_image(mut self, uri: impl Into<String>) -> Self {
        self.image_uri = Some(uri.into());
        self
    }

    /// Image reference, if there is a non-blank one.
    pub fn image_uri(&self) -> Option<&str> {
        self.image_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    pub fn title_text(&self) -> &str {
        &self.name
    }

    /// Description followed by a blank line and the count lines.
    ///
    /// Without a description only the counts remain; with counts disabled
    /// only the description does.
    pub fn description_text(&self, labels: &CountLabels) -> String {
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        if !labels.show_counts {
            return description.unwrap_or_default().to_string();
        }

        let counts = format!(
            "{}\n{}",
            labels.albums(self.albums_count),
            labels.tracks(self.tracks_count)
        );
        match description {
            Some(text) => format!("{}\n\n{}", text, counts),
            None => counts,
        }
    }
}
