//! Timestamped transcript text processing.
//!
//! Transcripts are plain text whose lines start with `[MM:SS]`, optionally
//! preceded by a `**Speaker**` header when more than one speaker was detected:
//!
//! ```text
//! **Host** [00:00]
//! Welcome back to the show.
//!
//! **Guest** [00:42]
//! Thanks for having me.
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use vessay_models::{format_mmss, is_sponsored, mmss_to_secs, CaptionEvent, SponsorRange, TranscriptEntry, Utterance};

/// Caption paragraphs close once they span this many milliseconds.
pub const CAPTION_PARAGRAPH_MS: u64 = 30_000;

static ENTRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*[^*]+\*\*\s*)?\[(\d+):(\d{2})\]\s*(.*)$").expect("valid entry regex")
});

static SPEAKER_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*([^*]+)\*\*\s*\[").expect("valid speaker regex"));

/// Seconds of a matched `[MM:SS]` prefix; `None` when out of range.
fn entry_seconds(caps: &regex::Captures) -> Option<u32> {
    mmss_to_secs(caps[1].parse().ok()?, caps[2].parse().ok()?)
}

/// Parse transcript text into timestamped entries.
///
/// Lines without a timestamp are continuation text of the previous entry;
/// anything before the first timestamp is ignored.
pub fn parse_transcript(text: &str) -> Vec<TranscriptEntry> {
    let mut entries: Vec<TranscriptEntry> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry = ENTRY_LINE
            .captures(line)
            .and_then(|caps| Some((entry_seconds(&caps)?, caps[3].trim().to_string())));

        if let Some((seconds, text)) = entry {
            entries.push(TranscriptEntry { seconds, text });
        } else if let Some(last) = entries.last_mut() {
            if !last.text.is_empty() {
                last.text.push(' ');
            }
            last.text.push_str(line);
        }
    }

    entries
}

/// Text spoken within `window_secs` on either side of `timestamp_secs`.
pub fn context_window(entries: &[TranscriptEntry], timestamp_secs: u32, window_secs: u32) -> String {
    let start = timestamp_secs.saturating_sub(window_secs);
    let end = timestamp_secs.saturating_add(window_secs);

    entries
        .iter()
        .filter(|e| e.seconds >= start && e.seconds <= end)
        .map(|e| e.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the transcript carries `**Speaker** [MM:SS]` block headers.
pub fn is_multi_speaker(transcript: &str) -> bool {
    SPEAKER_HEADER.is_match(transcript)
}

/// Distinct speaker names in order of first appearance.
pub fn extract_speakers(transcript: &str) -> Vec<String> {
    let mut speakers: Vec<String> = Vec::new();
    for caps in SPEAKER_HEADER.captures_iter(transcript) {
        let name = caps[1].trim();
        if !speakers.iter().any(|s| s == name) {
            speakers.push(name.to_string());
        }
    }
    speakers
}

fn secs(offset: f64) -> u32 {
    offset.max(0.0) as u32
}

fn render_block(speaker: u32, start: u32, parts: &[&str], names: Option<&HashMap<u32, String>>) -> String {
    let text = parts.join(" ");
    match names {
        Some(names) => {
            let name = names
                .get(&speaker)
                .cloned()
                .unwrap_or_else(|| format!("Speaker {}", speaker));
            format!("**{}** [{}]\n{}", name, format_mmss(start), text)
        }
        None => format!("[{}] {}", format_mmss(start), text),
    }
}

/// Render diarized utterances as transcript text.
///
/// Consecutive utterances from the same speaker form one block. With a
/// speaker map the blocks carry `**Name** [MM:SS]` headers; without one the
/// transcript is treated as a monologue and each block is `[MM:SS] text`.
pub fn format_utterances(utterances: &[Utterance], speaker_names: Option<&HashMap<u32, String>>) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<(u32, u32, Vec<&str>)> = None;

    for u in utterances {
        let text = u.text.trim();
        if text.is_empty() {
            continue;
        }
        match current.as_mut() {
            Some((speaker, _, parts)) if *speaker == u.speaker => parts.push(text),
            _ => {
                if let Some((speaker, start, parts)) = current.take() {
                    blocks.push(render_block(speaker, start, &parts, speaker_names));
                }
                current = Some((u.speaker, secs(u.start), vec![text]));
            }
        }
    }
    if let Some((speaker, start, parts)) = current {
        blocks.push(render_block(speaker, start, &parts, speaker_names));
    }

    blocks.join("\n\n")
}

/// Number of distinct speakers in a diarization.
pub fn speaker_count(utterances: &[Utterance]) -> usize {
    let mut ids: Vec<u32> = utterances.iter().map(|u| u.speaker).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

/// Group caption events into `[MM:SS] text` paragraphs of roughly
/// [`CAPTION_PARAGRAPH_MS`] each.
///
/// A fragment identical to the one before it is a rolling-window repeat and
/// is dropped.
pub fn group_captions(events: &[CaptionEvent]) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut para_start = 0u64;
    let mut previous: Option<&str> = None;

    for event in events {
        let text = event.text.trim();
        if text.is_empty() || previous == Some(text) {
            continue;
        }
        previous = Some(text);

        if current.is_empty() {
            para_start = event.start_ms;
        }
        current.push(text);

        if event.start_ms.saturating_sub(para_start) >= CAPTION_PARAGRAPH_MS {
            paragraphs.push(caption_paragraph(para_start, &current));
            current.clear();
        }
    }
    if !current.is_empty() {
        paragraphs.push(caption_paragraph(para_start, &current));
    }

    paragraphs.join("\n\n")
}

fn caption_paragraph(start_ms: u64, parts: &[&str]) -> String {
    format!("[{}] {}", format_mmss((start_ms / 1000) as u32), parts.join(" "))
}

/// Leading timestamp of a paragraph, looking past a speaker header.
fn paragraph_timestamp(paragraph: &str) -> Option<u32> {
    let first = paragraph.trim_start().lines().next()?;
    let caps = ENTRY_LINE.captures(first.trim())?;
    entry_seconds(&caps)
}

/// Remove blank-line separated paragraphs whose leading timestamp falls
/// inside a sponsor range. Paragraphs without a timestamp are kept.
pub fn strip_sponsored_paragraphs(transcript: &str, ranges: &[SponsorRange]) -> String {
    if ranges.is_empty() {
        return transcript.to_string();
    }

    transcript
        .split("\n\n")
        .filter(|p| match paragraph_timestamp(p) {
            Some(t) => !is_sponsored(ranges, t, 0),
            None => true,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIALOGUE: &str = "**Host** [00:00]\nWelcome back.\nToday we talk GPUs.\n\n**Guest** [00:42]\nThanks for having me.\n\n**Host** [01:10]\nLet's start.";

    #[test]
    fn test_parse_plain_and_speaker_lines() {
        let entries = parse_transcript("[00:05] hello there\n[01:30] second\ncontinued here");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], TranscriptEntry { seconds: 5, text: "hello there".into() });
        assert_eq!(entries[1].seconds, 90);
        assert_eq!(entries[1].text, "second continued here");

        let entries = parse_transcript(DIALOGUE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "Welcome back. Today we talk GPUs.");
        assert_eq!(entries[1].seconds, 42);
    }

    #[test]
    fn test_parse_long_minutes() {
        let entries = parse_transcript("[119:59] almost done");
        assert_eq!(entries[0].seconds, 119 * 60 + 59);
    }

    #[test]
    fn test_out_of_range_timestamps_are_not_entries() {
        let entries = parse_transcript("[00:05] intro\n[80000000:00] bogus\n[00:10] next");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "intro [80000000:00] bogus");
        assert_eq!(entries[1].seconds, 10);

        let ranges = [SponsorRange::new(0, 20)];
        let text = "[80000000:00] kept\n\n[00:05] sponsored";
        assert_eq!(strip_sponsored_paragraphs(text, &ranges), "[80000000:00] kept");
    }

    #[test]
    fn test_context_window_is_symmetric() {
        let entries = parse_transcript("[00:00] a\n[00:10] b\n[00:20] c\n[00:35] d\n[00:36] e");
        assert_eq!(context_window(&entries, 20, 15), "b c d");
        assert_eq!(context_window(&entries, 5, 5), "a b");
        assert_eq!(context_window(&entries, 300, 15), "");
    }

    #[test]
    fn test_speaker_detection() {
        assert!(is_multi_speaker(DIALOGUE));
        assert!(!is_multi_speaker("[00:00] just me talking"));
        assert_eq!(extract_speakers(DIALOGUE), vec!["Host", "Guest"]);
    }

    fn utt(start: f64, speaker: u32, text: &str) -> Utterance {
        Utterance {
            start,
            end: start + 1.0,
            speaker,
            text: text.into(),
        }
    }

    #[test]
    fn test_format_utterances_groups_by_speaker() {
        let utterances = vec![
            utt(0.4, 0, "Hi."),
            utt(2.0, 0, "Welcome."),
            utt(65.2, 1, "Thanks."),
            utt(70.0, 0, "Sure."),
        ];
        let names: HashMap<u32, String> = [(0, "Ada".to_string())].into_iter().collect();

        assert_eq!(
            format_utterances(&utterances, Some(&names)),
            "**Ada** [00:00]\nHi. Welcome.\n\n**Speaker 1** [01:05]\nThanks.\n\n**Ada** [01:10]\nSure."
        );
        assert_eq!(
            format_utterances(&utterances[..2], None),
            "[00:00] Hi. Welcome."
        );
        assert_eq!(speaker_count(&utterances), 2);
    }

    fn cap(start_ms: u64, text: &str) -> CaptionEvent {
        CaptionEvent {
            start_ms,
            text: text.into(),
        }
    }

    #[test]
    fn test_group_captions_into_paragraphs() {
        let events = vec![
            cap(0, "one"),
            cap(1_000, "one"),
            cap(12_000, "two"),
            cap(31_000, "three"),
            cap(40_000, "four"),
            cap(95_500, "five"),
        ];
        assert_eq!(
            group_captions(&events),
            "[00:00] one two three\n\n[00:40] four five"
        );
        assert_eq!(group_captions(&[]), "");
    }

    #[test]
    fn test_strip_sponsored_paragraphs() {
        let transcript = "[00:00] intro\n\n[01:05] this video is sponsored by\n\n**Host** [01:20]\nuse code ESSAY\n\n[02:00] back to it";
        let ranges = [SponsorRange::new(60, 85)];
        assert_eq!(
            strip_sponsored_paragraphs(transcript, &ranges),
            "[00:00] intro\n\n[02:00] back to it"
        );
        assert_eq!(strip_sponsored_paragraphs(transcript, &[]), transcript);
    }
}
