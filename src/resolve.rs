//! Joins a document with its metadata and transcript by document id.

use crate::importer::{Document, Metadata, ParsedCache, TranscriptEntry};

/// Source tag of utterances captured from the local microphone.
pub const MICROPHONE_SOURCE: &str = "microphone";

/// A document with its attendees and transcript resolved, ready to render.
#[derive(Debug, Clone)]
pub struct JoinedMeeting<'a> {
    pub document: &'a Document,
    pub attendees: Vec<String>,
    pub transcript: String,
}

impl<'a> JoinedMeeting<'a> {
    pub fn join(document: &'a Document, cache: &ParsedCache) -> Self {
        let attendees = resolve_attendees(document, cache.metadata.get(&document.id));
        let transcript = cache
            .transcripts
            .get(&document.id)
            .map(Vec::as_slice)
            .map(resolve_transcript)
            .unwrap_or_default();
        Self {
            document,
            attendees,
            transcript,
        }
    }
}

/// `name <email>`, `name`, `<email>` or empty, depending on which parts are present.
pub fn format_person(name: Option<&str>, email: Option<&str>) -> String {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let email = email.map(str::trim).filter(|e| !e.is_empty());
    match (name, email) {
        (Some(n), Some(e)) => format!("{n} <{e}>"),
        (Some(n), None) => n.to_string(),
        (None, Some(e)) => format!("<{e}>"),
        (None, None) => String::new(),
    }
}

/// Metadata attendees replace calendar attendees outright; the two are never merged.
/// The creator, when known, is placed first unless already listed.
pub fn resolve_attendees(document: &Document, metadata: Option<&Metadata>) -> Vec<String> {
    let from_metadata: Vec<String> = metadata
        .map(|m| {
            m.attendees
                .iter()
                .map(|p| format_person(p.name.as_deref(), p.email.as_deref()))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut attendees = if !from_metadata.is_empty() {
        from_metadata
    } else {
        document
            .google_calendar_event
            .iter()
            .flat_map(|event| &event.attendees)
            .map(|a| format_person(a.display_name.as_deref(), a.email.as_deref()))
            .filter(|s| !s.is_empty())
            .collect()
    };

    if let Some(creator) = metadata.and_then(|m| m.creator.as_ref()) {
        let creator = format_person(creator.name.as_deref(), creator.email.as_deref());
        if !creator.is_empty() && !attendees.contains(&creator) {
            attendees.insert(0, creator);
        }
    }

    attendees
}

/// One `speaker: text` line per entry, ordered by sequence number.
pub fn resolve_transcript(entries: &[TranscriptEntry]) -> String {
    let mut ordered: Vec<&TranscriptEntry> = entries.iter().collect();
    // stable: equal sequence numbers keep their stored order
    ordered.sort_by_key(|e| e.sequence_number);

    ordered
        .into_iter()
        .map(|e| format!("{}: {}", speaker_label(e), e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn speaker_label(entry: &TranscriptEntry) -> &str {
    if entry.source.as_deref() == Some(MICROPHONE_SOURCE) {
        return "me";
    }
    match entry.speaker.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => "them",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::{CalendarAttendee, CalendarEvent, Person};

    fn person(name: Option<&str>, email: Option<&str>) -> Person {
        Person {
            name: name.map(Into::into),
            email: email.map(Into::into),
        }
    }

    fn entry(text: &str, source: Option<&str>, speaker: Option<&str>, seq: i64) -> TranscriptEntry {
        TranscriptEntry {
            text: text.into(),
            source: source.map(Into::into),
            speaker: speaker.map(Into::into),
            sequence_number: seq,
        }
    }

    fn calendar_document() -> Document {
        Document {
            id: "d1".into(),
            google_calendar_event: Some(CalendarEvent {
                attendees: vec![
                    CalendarAttendee {
                        display_name: Some("Carol".into()),
                        email: Some("c@x.com".into()),
                    },
                    CalendarAttendee {
                        display_name: None,
                        email: Some("dave@x.com".into()),
                    },
                    CalendarAttendee::default(),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn formats_person_variants() {
        assert_eq!(format_person(Some(" Ann "), Some("a@x.com ")), "Ann <a@x.com>");
        assert_eq!(format_person(Some("Ann"), None), "Ann");
        assert_eq!(format_person(None, Some("a@x.com")), "<a@x.com>");
        assert_eq!(format_person(Some("  "), Some("")), "");
    }

    #[test]
    fn falls_back_to_calendar_attendees() {
        let doc = calendar_document();
        assert_eq!(
            resolve_attendees(&doc, None),
            vec!["Carol <c@x.com>", "<dave@x.com>"]
        );
    }

    #[test]
    fn metadata_attendees_replace_calendar() {
        let doc = calendar_document();
        let meta = Metadata {
            creator: None,
            attendees: vec![person(Some("Eve"), None), person(None, None)],
        };
        assert_eq!(resolve_attendees(&doc, Some(&meta)), vec!["Eve"]);
    }

    #[test]
    fn empty_metadata_attendees_use_calendar_and_prepend_creator() {
        let doc = calendar_document();
        let meta = Metadata {
            creator: Some(person(Some("Alice"), Some("a@x.com"))),
            attendees: vec![],
        };
        assert_eq!(
            resolve_attendees(&doc, Some(&meta)),
            vec!["Alice <a@x.com>", "Carol <c@x.com>", "<dave@x.com>"]
        );
    }

    #[test]
    fn creator_already_listed_is_not_duplicated() {
        let doc = Document::default();
        let meta = Metadata {
            creator: Some(person(Some("Bob"), Some("b@x.com"))),
            attendees: vec![person(Some("Ann"), None), person(Some("Bob"), Some("b@x.com"))],
        };
        assert_eq!(
            resolve_attendees(&doc, Some(&meta)),
            vec!["Ann", "Bob <b@x.com>"]
        );
    }

    #[test]
    fn no_sources_yields_empty_list() {
        let meta = Metadata {
            creator: Some(person(None, None)),
            attendees: vec![],
        };
        assert!(resolve_attendees(&Document::default(), Some(&meta)).is_empty());
        assert!(resolve_attendees(&Document::default(), None).is_empty());
    }

    #[test]
    fn transcript_sorted_by_sequence_number() {
        let entries = vec![
            entry("hi", Some("microphone"), Some("ignored"), 2),
            entry("hello", Some("system"), Some("Bob"), 1),
            entry("bye", None, None, 10),
        ];
        assert_eq!(resolve_transcript(&entries), "Bob: hello\nme: hi\nthem: bye");
    }

    #[test]
    fn transcript_sort_is_stable() {
        let entries = vec![
            entry("first", None, Some("A"), 5),
            entry("zero", None, Some("C"), 0),
            entry("second", None, Some("B"), 5),
        ];
        assert_eq!(resolve_transcript(&entries), "C: zero\nA: first\nB: second");
    }

    #[test]
    fn empty_speaker_is_them() {
        assert_eq!(resolve_transcript(&[entry("x", None, Some(""), 0)]), "them: x");
        assert_eq!(resolve_transcript(&[]), "");
    }

    #[test]
    fn join_looks_up_by_document_id() {
        let doc = Document {
            id: "d1".into(),
            ..Default::default()
        };
        let mut cache = ParsedCache::default();
        cache
            .transcripts
            .insert("d1".into(), vec![entry("hey", None, Some("Kim"), 0)]);
        cache
            .transcripts
            .insert("d2".into(), vec![entry("other", None, Some("Lee"), 0)]);
        cache.metadata.insert(
            "d1".into(),
            Metadata {
                creator: Some(person(Some("Alice"), None)),
                attendees: vec![],
            },
        );

        let joined = JoinedMeeting::join(&doc, &cache);
        assert_eq!(joined.attendees, vec!["Alice"]);
        assert_eq!(joined.transcript, "Kim: hey");

        let lonely = Document {
            id: "d3".into(),
            ..Default::default()
        };
        let joined = JoinedMeeting::join(&lonely, &cache);
        assert!(joined.attendees.is_empty());
        assert!(joined.transcript.is_empty());
    }
}
