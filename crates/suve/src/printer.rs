//! Status rendering of the staged set.
//!
//! Two modes: a short one-line-per-name listing with single-letter
//! status markers, and a verbose expansion with timestamps, values, and
//! tag diffs. No business logic lives here — the renderer only reads
//! what the stores returned. Colorizing is the caller's concern.

use std::fmt::Write;

use chrono::SecondsFormat;
use suve_types::{Entry, Operation, Service, State, TagEntry};

/// Values longer than this render truncated with a `...` suffix.
const VALUE_PREVIEW_BYTES: usize = 100;

/// One line per name: `A` added, `M` modified, `D` deleted, `T` tag-only.
pub fn render_short(state: &State) -> String {
    render(state, false)
}

/// The short listing expanded with timestamps, values, delete options,
/// and `+k=v` / `-k` tag diff lines.
pub fn render_verbose(state: &State) -> String {
    render(state, true)
}

fn render(state: &State, verbose: bool) -> String {
    let mut out = String::new();
    for service in Service::ALL {
        let entries = state.list_entries(service);
        let tags = state.list_tags(service);

        let names: std::collections::BTreeSet<&String> =
            entries.keys().chain(tags.keys()).collect();
        if names.is_empty() {
            continue;
        }

        let count = names.len();
        let plural = if count == 1 { "change" } else { "changes" };
        let _ = writeln!(out, "{service}: {count} {plural}");

        for name in names {
            let entry = entries.get(name);
            let marker = match entry.map(|e| e.operation) {
                Some(Operation::Create) => 'A',
                Some(Operation::Update) => 'M',
                Some(Operation::Delete) => 'D',
                None => 'T',
            };
            let _ = writeln!(out, "  {marker} {name}");

            if verbose {
                if let Some(entry) = entry {
                    render_entry(&mut out, entry);
                }
                if let Some(tag) = tags.get(name) {
                    render_tag_diff(&mut out, tag);
                }
            }
        }
    }
    out
}

fn render_entry(out: &mut String, entry: &Entry) {
    let staged = entry
        .staged_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let _ = writeln!(out, "      staged: {staged}");

    if let Some(value) = &entry.value {
        let _ = writeln!(out, "      value: {}", preview(value));
    }
    if let Some(options) = &entry.delete_options {
        if options.force {
            let _ = writeln!(out, "      delete: forced, no recovery");
        } else if let Some(days) = options.recovery_window {
            let _ = writeln!(out, "      delete: recovery window {days} days");
        }
    }
    if let Some(tags) = &entry.tags_snapshot {
        for (key, value) in tags {
            let _ = writeln!(out, "      +{key}={value}");
        }
    }
    if let Some(keys) = &entry.untag_keys_snapshot {
        for key in keys {
            let _ = writeln!(out, "      -{key}");
        }
    }
}

fn render_tag_diff(out: &mut String, tag: &TagEntry) {
    for (key, value) in &tag.add {
        let _ = writeln!(out, "      +{key}={value}");
    }
    for key in &tag.remove {
        let _ = writeln!(out, "      -{key}");
    }
}

/// First 100 bytes of the value, cut back to a char boundary.
fn preview(value: &str) -> String {
    if value.len() <= VALUE_PREVIEW_BYTES {
        return value.to_string();
    }
    let mut end = VALUE_PREVIEW_BYTES;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
