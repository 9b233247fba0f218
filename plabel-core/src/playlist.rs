use std::{collections::HashSet, fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u64);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LabelId {
    type Err = ParseIntError;

    /// Accepts both a bare id and a URL fragment (`#42`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(LabelId)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitles: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub work: Work,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Work {
    #[serde(default)]
    pub is_context_indigenous: bool,
    #[serde(default)]
    pub title_annotation: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub duration_secs: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub label: Label,
    pub video: Video,
}

impl PlaylistItem {
    pub fn id(&self) -> LabelId {
        self.label.id
    }

    pub fn duration_secs(&self) -> f64 {
        self.video.duration_secs
    }
}

/// Playlist document as served by the playlist endpoint.  Entries may come
/// without a label, those are not displayable and get dropped in
/// `into_items`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlaylistDocument {
    #[serde(default)]
    pub playlist_labels: Vec<PlaylistEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub label: Option<Label>,
    #[serde(default)]
    pub video: Video,
}

impl PlaylistDocument {
    pub fn into_items(self) -> Vec<PlaylistItem> {
        let total = self.playlist_labels.len();
        let items: Vec<PlaylistItem> = self
            .playlist_labels
            .into_iter()
            .filter_map(|entry| {
                entry.label.map(|label| PlaylistItem {
                    label,
                    video: entry.video,
                })
            })
            .collect();
        if items.len() < total {
            log::info!(
                "dropped {} playlist entries without a label",
                total - items.len()
            );
        }
        items
    }
}

/// Outcome of a rotation request.  An unknown label is not an error, the view
/// falls back to the playlist order and the caller decides what to do.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Found,
    LabelNotFound(LabelId),
}

impl Rotation {
    pub fn is_found(self) -> bool {
        matches!(self, Self::Found)
    }
}

pub struct PlaylistStore {
    items: Vec<PlaylistItem>,
    start: usize,
}

impl PlaylistStore {
    pub fn load(items: Vec<PlaylistItem>) -> Result<Self, Error> {
        if items.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id()) {
                return Err(Error::DuplicateLabel(item.id()));
            }
        }
        Ok(Self { items, start: 0 })
    }

    pub fn rotate_to(&mut self, label_id: LabelId) -> Rotation {
        match self.index_of(label_id) {
            Some(index) => {
                self.start = index;
                Rotation::Found
            }
            None => {
                self.start = 0;
                Rotation::LabelNotFound(label_id)
            }
        }
    }

    pub fn contains(&self, label_id: LabelId) -> bool {
        self.index_of(label_id).is_some()
    }

    fn index_of(&self, label_id: LabelId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == label_id)
    }

    pub fn view(&self) -> RotationView<'_> {
        RotationView {
            items: &self.items,
            start: self.start,
        }
    }

    pub fn current(&self) -> &PlaylistItem {
        &self.items[self.start]
    }

    pub fn current_label_id(&self) -> LabelId {
        self.current().id()
    }

    /// `None` for a single-item playlist, there is nothing to advance to.
    pub fn next_label_id(&self) -> Option<LabelId> {
        if self.items.len() > 1 {
            self.view().get(1).map(PlaylistItem::id)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Playlist items in rotated order, index 0 being the current label.
#[derive(Clone, Copy)]
pub struct RotationView<'a> {
    items: &'a [PlaylistItem],
    start: usize,
}

impl<'a> RotationView<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a PlaylistItem> {
        if index < self.items.len() {
            self.items.get((self.start + index) % self.items.len())
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PlaylistItem> + 'a {
        let items: &'a [PlaylistItem] = self.items;
        let (head, tail) = items.split_at(self.start);
        tail.iter().chain(head.iter())
    }

    pub fn label_ids(&self) -> Vec<LabelId> {
        self.iter().map(PlaylistItem::id).collect()
    }
}
