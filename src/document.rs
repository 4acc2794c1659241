// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use serde::Deserialize;

/// The file type sentinel a playable file must carry.
pub const FILE_TYPE: &str = "Json Midi Player";

/// The project URL sentinel a playable file must carry.
pub const FILE_URL: &str = "https://github.com/ruiseixasm/JsonMidiPlayer";

/// One file object of the input document. Files whose sentinels don't match
/// are skipped wholesale; unknown fields are ignored everywhere.
#[derive(Debug, Deserialize)]
pub struct ScoreFile {
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Vec<Element>,
}

impl ScoreFile {
    /// Whether this file carries the expected sentinels and may be played.
    pub fn is_playable(&self) -> bool {
        self.filetype.as_deref() == Some(FILE_TYPE) && self.url.as_deref() == Some(FILE_URL)
    }
}

/// One element of a file's content sequence. Anything that is neither a
/// devices directive nor a message entry falls through to `Unrecognized`
/// and is excluded by the ingestor rather than failing the whole document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Devices {
        devices: Vec<String>,
    },
    Message {
        time_ms: f64,
        midi_message: MidiMessage,
    },
    Unrecognized(serde_json::Value),
}

/// The wire fields of one message entry. Data bytes stay wide here so that
/// out-of-range values degrade to a per-message exclusion during ingestion
/// instead of a document parse error.
#[derive(Debug, Deserialize)]
pub struct MidiMessage {
    pub status_byte: i64,
    #[serde(default)]
    pub data_byte_1: Option<i64>,
    #[serde(default)]
    pub data_byte_2: Option<i64>,
    #[serde(default)]
    pub data_byte: Option<i64>,
    #[serde(default)]
    pub data_bytes: Option<Vec<i64>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ScoreFile>),
    One(Box<ScoreFile>),
}

/// Parses an on-disk document, which holds either a single file object or an
/// array of them.
pub fn parse(json: &str) -> Result<Vec<ScoreFile>, serde_json::Error> {
    Ok(match serde_json::from_str(json)? {
        OneOrMany::Many(files) => files,
        OneOrMany::One(file) => vec![*file],
    })
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_parse_single_file() -> Result<(), Box<dyn Error>> {
        let files = parse(
            r#"{
                "filetype": "Json Midi Player",
                "url": "https://github.com/ruiseixasm/JsonMidiPlayer",
                "content": [
                    {"devices": ["loopMIDI", "Synth"]},
                    {"time_ms": 0, "midi_message": {"status_byte": 144, "data_byte_1": 60, "data_byte_2": 100}}
                ]
            }"#,
        )?;

        assert_eq!(1, files.len());
        assert!(files[0].is_playable());
        assert_eq!(2, files[0].content.len());
        assert!(matches!(&files[0].content[0], Element::Devices { devices } if devices.len() == 2));
        match &files[0].content[1] {
            Element::Message {
                time_ms,
                midi_message,
            } => {
                assert_eq!(0.0, *time_ms);
                assert_eq!(0x90, midi_message.status_byte);
                assert_eq!(Some(60), midi_message.data_byte_1);
            }
            other => panic!("expected a message element, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_parse_array_of_files() -> Result<(), Box<dyn Error>> {
        let files = parse(
            r#"[
                {"filetype": "Json Midi Player", "url": "https://github.com/ruiseixasm/JsonMidiPlayer", "content": []},
                {"filetype": "Something Else", "content": []}
            ]"#,
        )?;

        assert_eq!(2, files.len());
        assert!(files[0].is_playable());
        assert!(!files[1].is_playable());

        Ok(())
    }

    #[test]
    fn test_unknown_fields_are_ignored() -> Result<(), Box<dyn Error>> {
        let files = parse(
            r#"{
                "filetype": "Json Midi Player",
                "url": "https://github.com/ruiseixasm/JsonMidiPlayer",
                "made_with": "some creator",
                "content": [
                    {"time_ms": 5, "midi_message": {"status_byte": 248}, "annotation": "tick"}
                ]
            }"#,
        )?;

        assert!(matches!(files[0].content[0], Element::Message { .. }));

        Ok(())
    }

    #[test]
    fn test_malformed_element_degrades_to_unrecognized() -> Result<(), Box<dyn Error>> {
        // time_ms as a string is not a message entry, but must not fail the file.
        let files = parse(
            r#"{
                "filetype": "Json Midi Player",
                "url": "https://github.com/ruiseixasm/JsonMidiPlayer",
                "content": [
                    {"time_ms": "zero", "midi_message": {"status_byte": 144}},
                    {"note": 60}
                ]
            }"#,
        )?;

        assert!(matches!(files[0].content[0], Element::Unrecognized(_)));
        assert!(matches!(files[0].content[1], Element::Unrecognized(_)));

        Ok(())
    }
}
