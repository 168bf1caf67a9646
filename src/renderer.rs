use crate::importer::Document;
use crate::resolve::JoinedMeeting;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use std::fmt::{self, Write};
use tracing::warn;

pub const NO_ATTENDEES: &str = "_No attendees recorded._";
pub const NO_NOTES: &str = "_No notes._";
pub const NO_TRANSCRIPT: &str = "_No transcript available._";

const TIMESTAMP_FORMAT: &str = "%A, %B %-d, %Y at %-I:%M %p";

#[derive(Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub frontmatter: bool,
    pub tags: Option<&'a [String]>,
}

#[derive(Serialize)]
struct Frontmatter<'a> {
    id: &'a str,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calendar_event_id: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    attendees: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
}

fn is_empty(list: &&[String]) -> bool {
    list.is_empty()
}

/// Full file content for one meeting, with YAML frontmatter when requested.
pub fn render_meeting<Tz>(meeting: &JoinedMeeting<'_>, tz: &Tz, options: RenderOptions<'_>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let body = render(meeting.document, &meeting.attendees, &meeting.transcript, tz);
    if !options.frontmatter && options.tags.is_none() {
        return body;
    }

    let doc = meeting.document;
    let fm = Frontmatter {
        id: &doc.id,
        title: doc.display_title(),
        created_at: doc.created_at.as_deref(),
        calendar_event_id: doc
            .google_calendar_event
            .as_ref()
            .and_then(|e| e.id.as_deref()),
        attendees: &meeting.attendees,
        tags: options.tags,
    };
    match serde_yaml::to_string(&fm) {
        Ok(yaml) => format!("---\n{yaml}---\n\n{body}"),
        Err(e) => {
            warn!(id = %doc.id, error = %e, "could not serialise frontmatter, writing body only");
            body
        }
    }
}

/// Markdown body: title, time block, attendees, notes, transcript.
/// Missing pieces render as placeholder text.
pub fn render<Tz>(doc: &Document, attendees: &[String], transcript: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_body(&mut out, doc, attendees, transcript, tz);
    out
}

fn write_body<W, Tz>(
    w: &mut W,
    doc: &Document,
    attendees: &[String],
    transcript: &str,
    tz: &Tz,
) -> fmt::Result
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    writeln!(w, "# {}", doc.display_title())?;
    writeln!(w)?;
    write_time_block(w, doc, tz)?;
    writeln!(w)?;
    writeln!(w, "---")?;
    writeln!(w)?;

    writeln!(w, "## Attendees")?;
    writeln!(w)?;
    if attendees.is_empty() {
        writeln!(w, "{NO_ATTENDEES}")?;
    } else {
        for a in attendees {
            writeln!(w, "- {a}")?;
        }
    }
    writeln!(w)?;
    writeln!(w, "---")?;
    writeln!(w)?;

    writeln!(w, "## Notes")?;
    writeln!(w)?;
    writeln!(w, "{}", doc.notes().map(str::trim_end).unwrap_or(NO_NOTES))?;
    writeln!(w)?;
    writeln!(w, "---")?;
    writeln!(w)?;

    writeln!(w, "## Transcript")?;
    writeln!(w)?;
    if transcript.is_empty() {
        writeln!(w, "{NO_TRANSCRIPT}")?;
    } else {
        writeln!(w, "{transcript}")?;
    }
    Ok(())
}

fn write_time_block<W, Tz>(w: &mut W, doc: &Document, tz: &Tz) -> fmt::Result
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let event = doc.google_calendar_event.as_ref();
    let start = event.and_then(|e| e.start.as_ref()).and_then(|t| t.instant());
    let end = event.and_then(|e| e.end.as_ref()).and_then(|t| t.instant());

    match (start, end) {
        (Some(start), Some(end)) => {
            writeln!(w, "**Start:** {}", format_timestamp(start, tz))?;
            writeln!(w)?;
            writeln!(w, "**End:** {}", format_timestamp(end, tz))?;
            writeln!(w)?;
            writeln!(w, "**Duration:** {}", format_duration(end - start))
        }
        (Some(start), None) => writeln!(w, "**Start:** {}", format_timestamp(start, tz)),
        _ => match doc.created() {
            Some(created) => writeln!(w, "**Date:** {}", format_timestamp(created, tz)),
            None => writeln!(
                w,
                "**Date:** {}",
                doc.created_at.as_deref().unwrap_or("Unknown")
            ),
        },
    }
}

/// e.g. `Friday, March 1, 2024 at 10:00 AM`, in the given zone.
pub fn format_timestamp<Tz>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    ts.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string()
}

/// Whole minutes only; seconds are dropped, never rounded up.
pub fn format_duration(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    match (hours, minutes) {
        (0, m) => plural(m, "minute"),
        (h, 0) => plural(h, "hour"),
        (h, m) => format!("{} {}", plural(h, "hour"), plural(m, "minute")),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
