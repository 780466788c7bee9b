//! Derived status values: record counts and the visible scroll range.

use std::fmt;
use std::ops::Range;

/// Rows shown when nothing is rendered yet, in the normal panel.
const DEFAULT_RANGE_NORMAL: Range<usize> = 0..5;
/// Rows shown when nothing is rendered yet, in the maximized panel.
const DEFAULT_RANGE_MAXIMIZED: Range<usize> = 0..15;

/// Size of the table panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelLayout {
    #[default]
    Normal,
    Maximized,
}

/// Displayed and total record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCount {
    pub displayed: usize,
    pub total: usize,
    /// Some rows are hidden by a filter.
    pub filtered: bool,
}

/// One row the grid has rendered, in pixels relative to the scroll viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRow {
    /// Displayed-row index.
    pub index: usize,
    pub top: f64,
    pub height: f64,
}

/// What the grid currently has on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedWindow {
    pub top_pixel: f64,
    pub bottom_pixel: f64,
    /// Rendered rows, in display order.
    pub rows: Vec<RenderedRow>,
}

/// Half-open interval of displayed-row indices visible in the viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRange(pub Range<usize>);

impl RowRange {
    pub fn empty() -> Self {
        Self(0..0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RowRange {
    /// Formats as the 1-based `"first - last"` shown in the status bar.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "0 - 0")
        } else {
            write!(f, "{} - {}", self.0.start + 1, self.0.end)
        }
    }
}

/// Everything the status bar shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub count: RecordCount,
    pub range: RowRange,
}

/// Pure status computations.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReporter;

impl StatusReporter {
    /// Record counts for the status bar.
    pub fn compute(total: usize, displayed: usize) -> RecordCount {
        RecordCount {
            displayed,
            total,
            filtered: displayed < total,
        }
    }

    /// Rows at least half inside the viewport.
    ///
    /// Without rendered rows the layout's default range applies. A window
    /// with zero height, or one where no row qualifies, yields an empty
    /// range.
    pub fn visible_range(window: Option<&RenderedWindow>, layout: PanelLayout) -> RowRange {
        let window = match window {
            Some(window) if !window.rows.is_empty() => window,
            _ => {
                return RowRange(match layout {
                    PanelLayout::Normal => DEFAULT_RANGE_NORMAL,
                    PanelLayout::Maximized => DEFAULT_RANGE_MAXIMIZED,
                });
            }
        };
        if window.top_pixel == window.bottom_pixel {
            return RowRange::empty();
        }

        let first = window
            .rows
            .iter()
            .find(|row| row.top > window.top_pixel - row.height / 2.0);
        let last = window
            .rows
            .iter()
            .rev()
            .find(|row| row.top + row.height < window.bottom_pixel + row.height / 2.0);

        match (first, last) {
            (Some(first), Some(last)) if first.index <= last.index => RowRange(first.index..last.index + 1),
            _ => RowRange::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(top: f64, bottom: f64, count: usize) -> RenderedWindow {
        RenderedWindow {
            top_pixel: top,
            bottom_pixel: bottom,
            rows: (0..count)
                .map(|index| RenderedRow {
                    index,
                    top: index as f64 * 20.0,
                    height: 20.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_compute() {
        assert_eq!(
            StatusReporter::compute(10, 10),
            RecordCount {
                displayed: 10,
                total: 10,
                filtered: false
            }
        );
        assert!(StatusReporter::compute(10, 3).filtered);
        assert!(!StatusReporter::compute(0, 0).filtered);
    }

    #[test]
    fn test_defaults_without_rows() {
        assert_eq!(StatusReporter::visible_range(None, PanelLayout::Normal), RowRange(0..5));
        assert_eq!(
            StatusReporter::visible_range(Some(&window(0.0, 100.0, 0)), PanelLayout::Maximized),
            RowRange(0..15)
        );
    }

    #[test]
    fn test_half_visible_rows_count() {
        // Rows 0..10 at 20px each; viewport 15..95 shows row 0 by 5px
        // (excluded), row 4 ends at 100 (> 95 but within half a row).
        let range = StatusReporter::visible_range(Some(&window(15.0, 95.0, 10)), PanelLayout::Normal);
        assert_eq!(range, RowRange(1..5));
        assert_eq!(range.to_string(), "2 - 5");
    }

    #[test]
    fn test_zero_height_window_is_empty() {
        let range = StatusReporter::visible_range(Some(&window(40.0, 40.0, 10)), PanelLayout::Normal);
        assert!(range.is_empty());
        assert_eq!(range.to_string(), "0 - 0");
    }

    #[test]
    fn test_no_qualifying_row_is_empty() {
        let range = StatusReporter::visible_range(Some(&window(500.0, 600.0, 3)), PanelLayout::Normal);
        assert_eq!(range, RowRange::empty());
    }
}
