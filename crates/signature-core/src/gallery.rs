use serde::Deserialize;

pub const ARTISTS: [&str; 2] = ["Tristan", "Magritte"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artwork {
    pub name: String,
    pub artist: String,
    pub image_url: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryState {
    Loading,
    Loaded {
        artworks: Vec<Artwork>,
        selected: usize,
        detail_open: bool,
    },
    Failed(String),
}

/// One artist's gallery. Fetched once; a failed fetch is final.
#[derive(Debug, Clone)]
pub struct Gallery {
    artist: &'static str,
    state: GalleryState,
    requested: bool,
}

impl Gallery {
    pub fn new(artist: &'static str) -> Self {
        Self {
            artist,
            state: GalleryState::Loading,
            requested: false,
        }
    }

    pub fn artist(&self) -> &'static str {
        self.artist
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    /// Returns true the first time it is called, when the caller should fetch.
    pub fn request_load(&mut self) -> bool {
        !std::mem::replace(&mut self.requested, true)
    }

    pub fn loaded(&mut self, result: anyhow::Result<Vec<Artwork>>) {
        self.state = match result {
            Ok(artworks) => {
                tracing::info!(artist = self.artist, count = artworks.len(), "artworks loaded");
                GalleryState::Loaded {
                    artworks,
                    selected: 0,
                    detail_open: false,
                }
            }
            Err(err) => {
                tracing::error!(artist = self.artist, error = %err, "failed to fetch artworks");
                GalleryState::Failed(err.to_string())
            }
        };
    }

    pub fn selected(&self) -> Option<&Artwork> {
        match &self.state {
            GalleryState::Loaded { artworks, selected, .. } => artworks.get(*selected),
            _ => None,
        }
    }

    pub fn detail_open(&self) -> bool {
        matches!(self.state, GalleryState::Loaded { detail_open: true, .. })
    }

    pub fn select_next(&mut self) {
        if let GalleryState::Loaded { artworks, selected, detail_open: false } = &mut self.state {
            if !artworks.is_empty() {
                *selected = (*selected + 1).min(artworks.len() - 1);
            }
        }
    }

    pub fn select_prev(&mut self) {
        if let GalleryState::Loaded { selected, detail_open: false, .. } = &mut self.state {
            *selected = selected.saturating_sub(1);
        }
    }

    pub fn open_detail(&mut self) {
        if let GalleryState::Loaded { artworks, detail_open, .. } = &mut self.state {
            if !artworks.is_empty() {
                *detail_open = true;
            }
        }
    }

    pub fn close_detail(&mut self) {
        if let GalleryState::Loaded { detail_open, .. } = &mut self.state {
            *detail_open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artwork(name: &str) -> Artwork {
        Artwork {
            name: name.to_string(),
            artist: "Tristan".to_string(),
            image_url: format!("https://img.example/{}.png", name),
            date: "2024".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_request_load_once() {
        let mut gallery = Gallery::new("Tristan");
        assert!(gallery.request_load());
        assert!(!gallery.request_load());
    }

    #[test]
    fn test_selection_clamps() {
        let mut gallery = Gallery::new("Tristan");
        gallery.loaded(Ok(vec![artwork("a"), artwork("b")]));

        gallery.select_prev();
        assert_eq!(gallery.selected().map(|a| a.name.as_str()), Some("a"));
        gallery.select_next();
        gallery.select_next();
        assert_eq!(gallery.selected().map(|a| a.name.as_str()), Some("b"));
    }

    #[test]
    fn test_detail_blocks_selection() {
        let mut gallery = Gallery::new("Magritte");
        gallery.loaded(Ok(vec![artwork("a"), artwork("b")]));

        gallery.open_detail();
        assert!(gallery.detail_open());
        gallery.select_next();
        assert_eq!(gallery.selected().map(|a| a.name.as_str()), Some("a"));

        gallery.close_detail();
        assert!(!gallery.detail_open());
    }

    #[test]
    fn test_empty_gallery_has_no_detail() {
        let mut gallery = Gallery::new("Magritte");
        gallery.loaded(Ok(Vec::new()));
        gallery.open_detail();
        assert!(!gallery.detail_open());
        assert!(gallery.selected().is_none());
    }

    #[test]
    fn test_failure_is_final_state() {
        let mut gallery = Gallery::new("Tristan");
        gallery.request_load();
        gallery.loaded(Err(anyhow::anyhow!("Failed to fetch artworks")));
        assert_eq!(
            gallery.state(),
            &GalleryState::Failed("Failed to fetch artworks".to_string())
        );
        assert!(!gallery.request_load());
    }

    #[test]
    fn test_artwork_payload_deserializes() {
        let artworks: Vec<Artwork> = serde_json::from_str(
            r#"[{"name": "Le Fils de l'homme", "artist": "René Magritte",
                 "image_url": "https://img.example/fils.jpg", "date": "1964",
                 "description": "Un homme au chapeau melon."}]"#,
        )
        .unwrap();
        assert_eq!(artworks[0].date, "1964");
    }
}
