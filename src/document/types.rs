//! Core highlight types
//!
//! Data points, search hits and page geometry shared by the span locator,
//! the geometry builder and the highlight controller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{HighlightError, Result};

/// A labeled value the user can click to locate in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    /// Surrounding text used to find where the value occurs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<String>,
    /// Text that is actually highlighted (a substring of the context)
    pub value: String,
}

impl DataPoint {
    pub fn new(context_summary: &str, value: &str) -> Self {
        Self {
            context_summary: Some(context_summary.to_string()),
            value: value.to_string(),
        }
    }

    /// Phrase to locate: the context summary, or the value itself when
    /// no usable summary was extracted
    ///
    /// Whitespace runs collapse to single spaces, matching page text.
    pub fn context(&self) -> String {
        let phrase = match self.context_summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.value,
        };
        phrase.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Parse a JSON array of data points
    pub fn load_list(json: &str) -> Result<Vec<DataPoint>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Inclusive, 1-indexed page range. `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl PageRange {
    /// Whole document
    pub fn all() -> Self {
        Self::default()
    }

    /// From `start` to the end of the document
    pub fn from(start: usize) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// From the first page up to and including `end`
    pub fn until(end: usize) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Exactly one page
    pub fn single(page: usize) -> Self {
        Self {
            start: Some(page),
            end: Some(page),
        }
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: usize) -> Self {
        self.end = Some(end);
        self
    }

    /// True when no page can satisfy the range
    pub fn is_empty(&self) -> bool {
        match (self.start, self.end) {
            (_, Some(0)) => true,
            (Some(start), Some(end)) => start > end,
            _ => false,
        }
    }

    pub fn contains(&self, page: usize) -> bool {
        self.start.map_or(true, |s| page >= s) && self.end.map_or(true, |e| page <= e)
    }
}

/// Search mode requested from the search primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Highlight the single result found
    #[default]
    Highlight,
}

/// A page-scoped, single-result search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Phrase to find; it must lie wholly within one page
    pub phrase: String,
    pub mode: SearchMode,
    /// Search the whole range rather than stopping at the current page
    pub full_search: bool,
    pub range: PageRange,
}

impl SearchRequest {
    pub fn new(phrase: &str, range: PageRange) -> Self {
        Self {
            phrase: phrase.to_string(),
            mode: SearchMode::Highlight,
            full_search: true,
            range,
        }
    }
}

/// Result code reported with each search result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCode {
    #[default]
    Found,
    Failed,
}

/// One page-local match record from the search primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Page number (1-indexed)
    pub page_number: usize,
    /// Geometric footprint of the match
    pub quads: Vec<Quad>,
    pub result_code: ResultCode,
    /// The text actually matched (may be trimmed relative to the query)
    pub matched_text: String,
}

impl SearchHit {
    pub fn found(page_number: usize, matched_text: &str, quads: Vec<Quad>) -> Self {
        Self {
            page_number,
            quads,
            result_code: ResultCode::Found,
            matched_text: matched_text.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.result_code == ResultCode::Found
    }
}

/// What the search primitive reports for a request
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A result record (check its result code)
    Result(SearchHit),
    /// The end of the document or range was reached without a match
    DocumentEnd,
}

/// A point in page coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// 4-point polygon bounding a text region (not necessarily axis-aligned)
///
/// A missing coordinate is represented as `NaN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub x3: f64,
    pub y3: f64,
    pub x4: f64,
    pub y4: f64,
}

impl Quad {
    #[allow(clippy::too_many_arguments)]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64, x4: f64, y4: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            x3,
            y3,
            x4,
            y4,
        }
    }

    /// Parse a quad from a flat array of 8 numbers
    pub fn from_points(points: [f64; 8]) -> Self {
        let [x1, y1, x2, y2, x3, y3, x4, y4] = points;
        Self::new(x1, y1, x2, y2, x3, y3, x4, y4)
    }

    pub fn points(&self) -> [f64; 8] {
        [
            self.x1, self.y1, self.x2, self.y2, self.x3, self.y3, self.x4, self.y4,
        ]
    }

    /// All coordinates are present
    pub fn is_valid(&self) -> bool {
        self.points().iter().all(|c| c.is_finite())
    }

    /// Axis-aligned bounding rectangle
    pub fn to_rect(&self) -> Rect {
        let xs = [self.x1, self.x2, self.x3, self.x4];
        let ys = [self.y1, self.y2, self.y3, self.y4];
        Rect {
            x1: xs.iter().copied().fold(f64::INFINITY, f64::min),
            y1: ys.iter().copied().fold(f64::INFINITY, f64::min),
            x2: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            y2: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Axis-aligned bounding box. `y1` is the top edge, `y2` the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_quad(quad: &Quad) -> Self {
        quad.to_rect()
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x1 + self.x2) / 2.0,
            y: (self.y1 + self.y2) / 2.0,
        }
    }

    /// Corners in the order lower-left, lower-right, upper-right, upper-left
    pub fn to_quad(&self) -> Quad {
        Quad::new(
            self.x1, self.y2, self.x2, self.y2, self.x2, self.y1, self.x1, self.y1,
        )
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#RRGGBB` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(HighlightError::InvalidConfig(format!(
                "expected #RRGGBB color, got {:?}",
                hex
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| {
                HighlightError::InvalidConfig(format!("invalid color channel in {:?}", hex))
            })
        };
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A text highlight annotation placed on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightAnnotation {
    /// Unique identifier (UUID)
    pub id: String,
    /// Page number (1-indexed)
    pub page_number: usize,
    pub quads: Vec<Quad>,
    pub color: Color,
    pub created_at: DateTime<Utc>,
}

impl HighlightAnnotation {
    pub fn new(page_number: usize, quads: Vec<Quad>, color: Color) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            page_number,
            quads,
            color,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_point_context_fallback() {
        let with_context = DataPoint::new("dated as of May 1, 2005", "May 1, 2005");
        assert_eq!(with_context.context(), "dated as of May 1, 2005");

        let blank = DataPoint {
            context_summary: Some("   ".to_string()),
            value: "May 1, 2005".to_string(),
        };
        assert_eq!(blank.context(), "May 1, 2005");

        let wrapped = DataPoint::new("dated as of\nMay 1,  2005 ", "May 1, 2005");
        assert_eq!(wrapped.context(), "dated as of May 1, 2005");
    }

    #[test]
    fn test_load_list() {
        let json = r#"[
            {"contextSummary": "dated as of May 1, 2005", "value": "May 1, 2005"},
            {"value": "Acme Corp"}
        ]"#;
        let points = DataPoint::load_list(json).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, "May 1, 2005");
        assert!(points[1].context_summary.is_none());
        assert!(DataPoint::load_list("{not json").is_err());
    }

    #[test]
    fn test_page_range() {
        assert!(PageRange::all().contains(42));
        assert!(PageRange::single(3).contains(3));
        assert!(!PageRange::single(3).contains(4));
        assert!(PageRange::until(0).is_empty());
        assert!(PageRange::from(5).with_end(4).is_empty());
        assert!(!PageRange::from(5).is_empty());
    }

    #[test]
    fn test_quad_to_rect() {
        let quad = Quad::new(10.0, 20.0, 30.0, 20.0, 30.0, 5.0, 10.0, 5.0);
        let rect = quad.to_rect();

        assert_eq!(rect, Rect::new(10.0, 5.0, 30.0, 20.0));
        assert_eq!(rect.center(), Point { x: 20.0, y: 12.5 });
        assert_eq!(rect.to_quad().to_rect(), rect);
    }

    #[test]
    fn test_quad_validity() {
        let mut quad = Quad::from_points([0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        assert!(quad.is_valid());
        quad.x1 = f64::NAN;
        assert!(!quad.is_valid());
    }

    #[test]
    fn test_color_hex() {
        let color = Color::from_hex("#00FAFF").unwrap();
        assert_eq!(color, Color::rgb(0, 250, 255));
        assert_eq!(color.to_string(), "#00FAFF");
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn test_annotation_serialization() {
        let annotation = HighlightAnnotation::new(3, vec![], Color::rgb(0, 250, 255));
        let json = serde_json::to_string(&annotation).unwrap();

        assert!(json.contains("\"pageNumber\":3"));
        assert!(Uuid::parse_str(&annotation.id).is_ok());
    }
}
