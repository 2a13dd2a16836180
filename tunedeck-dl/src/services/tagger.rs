//! ID3 tag writing for downloaded files

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag, TagExt, TagType};
use std::path::Path;
use thiserror::Error;

use crate::models::ExtractedFields;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to read file: {0}")]
    ReadError(String),

    #[error("Failed to write tags: {0}")]
    WriteError(String),
}

/// Write title, artist, genre, and year onto a finished download.
/// Callers treat failures as non-fatal; a missing tag never loses a
/// downloaded file.
pub fn write_tags(path: &Path, fields: &ExtractedFields, genre: Option<&str>) -> Result<(), TagError> {
    let mut tagged_file = Probe::open(path)
        .map_err(|e| TagError::ReadError(e.to_string()))?
        .read()
        .map_err(|e| TagError::ReadError(e.to_string()))?;

    if tagged_file.primary_tag_mut().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = match tagged_file.primary_tag_mut() {
        Some(tag) => tag,
        None => {
            let mut fallback = Tag::new(TagType::Id3v2);
            apply_fields(&mut fallback, fields, genre);
            return fallback
                .save_to_path(path, WriteOptions::default())
                .map_err(|e| TagError::WriteError(e.to_string()));
        }
    };
    apply_fields(tag, fields, genre);

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| TagError::WriteError(e.to_string()))
}

/// Measured stream properties of an audio file.
#[derive(Debug, Clone, Copy)]
pub struct AudioProperties {
    pub duration_seconds: f64,
    pub bitrate_kbps: Option<i64>,
}

/// Probe an existing file for duration and bitrate.
pub fn read_properties(path: &Path) -> Result<AudioProperties, TagError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| TagError::ReadError(e.to_string()))?
        .read()
        .map_err(|e| TagError::ReadError(e.to_string()))?;
    let props = tagged_file.properties();
    Ok(AudioProperties {
        duration_seconds: props.duration().as_secs_f64(),
        bitrate_kbps: props.audio_bitrate().map(|b| b as i64),
    })
}

fn apply_fields(tag: &mut Tag, fields: &ExtractedFields, genre: Option<&str>) {
    tag.set_title(fields.title.clone());
    if let Some(artist) = &fields.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(year) = fields.year {
        if year > 0 {
            tag.set_year(year as u32);
        }
    }
    if let Some(genre) = genre {
        tag.set_genre(genre.to_string());
    }
}
