//! Display model for a single adventure.
use chrono::NaiveDate;

use crate::{Adventure, Coordinates, Distance};

/// Glyph placed in front of the distance line
pub const MARKER_GLYPH: &str = "📍";

/// Lines shown for the description before it is cut
const DESCRIPTION_LINES: usize = 2;

const ELLIPSIS: char = '…';

/// What the list shows for one adventure.
#[derive(Debug, Clone, PartialEq)]
pub struct AdventureCard {
    /// Id of the adventure this card renders
    pub id: String,
    /// Display date, omitted when the adventure has none
    pub date: Option<String>,
    /// Name on a single line
    pub name: String,
    /// At most two description lines
    pub description: Vec<String>,
    /// e.g. "📍 360.75 km", omitted when the distance is unknown
    pub distance: Option<String>,
    pub image: Option<String>,
}

impl AdventureCard {
    /// Maps an adventure and the user's last known location to display
    /// strings, fitting each line in `width` characters.
    pub fn new(adventure: &Adventure, user_location: Option<Coordinates>, width: usize) -> Self {
        let width = width.max(1);
        let place = adventure.location.as_ref().and_then(|l| l.coordinates());

        let distance = Distance::between(user_location, place)
            .km()
            .map(|km| format!("{} {:.2} km", MARKER_GLYPH, km));

        AdventureCard {
            id: adventure.id.clone(),
            date: adventure.date.as_deref().and_then(format_date),
            name: single_line(&adventure.name, width),
            description: adventure
                .description
                .as_deref()
                .map(|d| wrap_lines(d, width, DESCRIPTION_LINES))
                .unwrap_or_default(),
            distance,
            image: adventure.image.clone(),
        }
    }

    /// Invokes the caller-supplied handler with this card's adventure id.
    ///
    /// The card has no edit behavior of its own.
    pub fn request_edit<F>(&self, on_edit: F)
    where
        F: FnOnce(&str),
    {
        on_edit(&self.id)
    }
}

/// Normalises day/month/year and ISO dates to dd/mm/yyyy; anything else is
/// shown as typed.
pub fn format_date(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.format("%d/%m/%Y").to_string())
        .or_else(|| Some(text.to_string()))
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push(ELLIPSIS);
    cut
}

/// First line of `text`, cut to `width` characters
fn single_line(text: &str, width: usize) -> String {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next().unwrap_or("").trim();
    if lines.next().is_some() && first.chars().count() < width {
        // More text follows on hidden lines
        return format!("{}{}", first, ELLIPSIS);
    }
    truncate(first, width)
}

/// Word-wraps `text` into at most `max_lines` lines of `width` characters,
/// marking cut text with an ellipsis.
fn wrap_lines(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if candidate_len <= width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        // Words longer than a line are hard-split
        let mut rest: Vec<char> = word.chars().collect();
        while rest.len() > width {
            lines.push(rest.drain(..width).collect());
        }
        current = rest.into_iter().collect();
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let kept: String = last.chars().take(width.saturating_sub(1)).collect();
            *last = format!("{}{}", kept.trim_end(), ELLIPSIS);
        }
    }
    lines
}
