//! Dotted scoreboard paths such as `ScoreBoard.CurrentGame.Team(1).Skater(ab.cd).Name`.

use std::fmt;

use thiserror::Error;

/// Error raised when a path string cannot be split into usable segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path was the empty string.
    #[error("empty path")]
    Empty,
    /// Two separators were adjacent, or the path started/ended with one.
    #[error("empty segment at position {position} in `{path}`")]
    EmptySegment {
        /// Offending path.
        path: String,
        /// Zero-based index of the empty segment.
        position: usize,
    },
}

/// A parsed path: the ordered list of segments addressing one node of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    /// Split `raw` on `.` separators that are not enclosed in parentheses.
    ///
    /// The scoreboard embeds free-form identifiers inside parentheses
    /// (`PreparedTeam(Team.Name)`), so a dot only separates segments at
    /// nesting depth zero.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;

        for ch in raw.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                '.' if depth == 0 => {
                    segments.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            }
        }
        segments.push(current);

        if let Some(position) = segments.iter().position(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: raw.to_string(),
                position,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Segments in document order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The original dotted string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the raw path begins with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.raw.starts_with(prefix)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Interpret a segment as a list index when it is a plain decimal integer.
pub fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Split a segment of the form `Name(id)` into `("Name", "id")`.
pub fn split_keyed(segment: &str) -> Option<(&str, &str)> {
    let open = segment.find('(')?;
    let inner = segment.get(open + 1..)?.strip_suffix(')')?;
    Some((&segment[..open], inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_dots() {
        let path = Path::parse("ScoreBoard.CurrentGame.Team(1).Name").unwrap();
        assert_eq!(
            path.segments(),
            &["ScoreBoard", "CurrentGame", "Team(1)", "Name"]
        );
    }

    #[test]
    fn keeps_dots_inside_parentheses() {
        let path = Path::parse("ScoreBoard.PreparedTeam(Rollin.Rebels).Name").unwrap();
        assert_eq!(
            path.segments(),
            &["ScoreBoard", "PreparedTeam(Rollin.Rebels)", "Name"]
        );
        assert_eq!(path.to_string(), "ScoreBoard.PreparedTeam(Rollin.Rebels).Name");
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        assert!(matches!(
            Path::parse("jam..score"),
            Err(PathError::EmptySegment { position: 1, .. })
        ));
        assert!(Path::parse(".jam").is_err());
        assert!(Path::parse("jam.").is_err());
    }

    #[test]
    fn index_segments() {
        assert_eq!(as_index("0"), Some(0));
        assert_eq!(as_index("12"), Some(12));
        assert_eq!(as_index("-1"), None);
        assert_eq!(as_index("Jam(1)"), None);
    }

    #[test]
    fn keyed_segments() {
        assert_eq!(split_keyed("Jam(12)"), Some(("Jam", "12")));
        assert_eq!(
            split_keyed("Color(scoreboard_bg)"),
            Some(("Color", "scoreboard_bg"))
        );
        assert_eq!(split_keyed("Name"), None);
    }
}
