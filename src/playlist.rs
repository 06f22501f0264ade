use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PlaylistError;

/// One entry of the fixed playlist.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Track {
    pub title: String,
    #[serde(default = "unknown_artist")]
    pub artist: String,
    /// Local path, `file://` URI or `http(s)://` URL.
    #[serde(alias = "src", alias = "source_uri")]
    pub source: String,
}

fn unknown_artist() -> String {
    "Unknown".into()
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            source: source.into(),
        }
    }

    /// Build a track from a bare audio path; the title is the file stem.
    pub fn from_path(path: &Path) -> Self {
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        Self::new(title, unknown_artist(), path.to_string_lossy())
    }
}

/// Ordered, non-empty list of tracks. Never mutated after construction.
#[derive(Clone, Debug)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Result<Self, PlaylistError> {
        if tracks.is_empty() {
            return Err(PlaylistError::Empty);
        }
        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Index after `index`, wrapping to the start.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.tracks.len()
    }

    /// Panics if `index` is out of range; the controller only hands out
    /// indices produced by `next_index`.
    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// Read a JSON playlist: an array of `{ "title", "artist", "source" }`.
pub fn load_json(path: &Path) -> Result<Vec<Track>, PlaylistError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlaylistError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PlaylistError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Assemble the playlist from every input, highest precedence first:
/// positional audio paths, then the JSON playlist file, then config tracks.
pub fn resolve(
    paths: &[PathBuf],
    playlist_file: Option<&Path>,
    config_tracks: Vec<Track>,
) -> Result<Playlist, PlaylistError> {
    if !paths.is_empty() {
        return Playlist::new(paths.iter().map(|p| Track::from_path(p)).collect());
    }
    if let Some(file) = playlist_file {
        return Playlist::new(load_json(file)?);
    }
    Playlist::new(config_tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn two_tracks() -> Playlist {
        Playlist::new(vec![
            Track::new("A", "x", "a.mp3"),
            Track::new("B", "y", "b.mp3"),
        ])
        .unwrap()
    }

    #[test]
    fn empty_playlist_rejected() {
        assert!(matches!(Playlist::new(vec![]), Err(PlaylistError::Empty)));
    }

    #[test]
    fn next_index_wraps() {
        let list = two_tracks();
        assert_eq!(list.next_index(0), 1);
        assert_eq!(list.next_index(1), 0);
    }

    #[test]
    fn track_from_path_uses_stem() {
        let track = Track::from_path(Path::new("/music/bgm1.mp3"));
        assert_eq!(track.title, "bgm1");
        assert_eq!(track.artist, "Unknown");
        assert_eq!(track.source, "/music/bgm1.mp3");
    }

    #[test]
    fn loads_json_playlist_with_aliases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"title": "비행기", "artist": "거북이", "src": "/bgm2.mp3"}},
               {{"title": "solo", "source": "https://example.com/a.ogg"}}]"#
        )
        .unwrap();

        let tracks = load_json(file.path()).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].source, "/bgm2.mp3");
        assert_eq!(tracks[1].artist, "Unknown");
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_json(file.path()), Err(PlaylistError::Parse { .. })));
    }

    #[test]
    fn positional_paths_take_precedence() {
        let config = vec![Track::new("cfg", "c", "cfg.mp3")];
        let list = resolve(&[PathBuf::from("song.wav")], None, config).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.track(0).title, "song");
    }

    #[test]
    fn falls_back_to_config_tracks() {
        let config = vec![Track::new("cfg", "c", "cfg.mp3")];
        let list = resolve(&[], None, config).unwrap();
        assert_eq!(list.track(0).title, "cfg");
        assert!(matches!(resolve(&[], None, vec![]), Err(PlaylistError::Empty)));
    }
}
