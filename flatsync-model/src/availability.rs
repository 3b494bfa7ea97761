use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldPath;
use crate::media_type::MediaType;
use crate::server::ServerId;

/// Ranked server lists keyed by title and field path. The first server in
/// each list is the highest-priority supplier of that field.
pub type TitleRankings = BTreeMap<FieldPath, Vec<ServerId>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAvailability {
    #[serde(default)]
    pub movies: BTreeMap<String, TitleRankings>,
    #[serde(default)]
    pub tv: BTreeMap<String, TitleRankings>,
}

impl FieldAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    fn titles(&self, media_type: MediaType) -> &BTreeMap<String, TitleRankings> {
        match media_type {
            MediaType::Movie => &self.movies,
            MediaType::Tv => &self.tv,
        }
    }

    fn titles_mut(
        &mut self,
        media_type: MediaType,
    ) -> &mut BTreeMap<String, TitleRankings> {
        match media_type {
            MediaType::Movie => &mut self.movies,
            MediaType::Tv => &mut self.tv,
        }
    }

    pub fn ranking(
        &self,
        media_type: MediaType,
        title: &str,
        path: &FieldPath,
    ) -> Option<&[ServerId]> {
        self.titles(media_type)
            .get(title)
            .and_then(|fields| fields.get(path))
            .map(Vec::as_slice)
    }

    pub fn set_ranking(
        &mut self,
        media_type: MediaType,
        title: impl Into<String>,
        path: FieldPath,
        servers: Vec<ServerId>,
    ) {
        self.titles_mut(media_type)
            .entry(title.into())
            .or_default()
            .insert(path, servers);
    }
}
