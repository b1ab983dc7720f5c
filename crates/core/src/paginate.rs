//! Page-break placement over a window of measured lines.
//!
//! Pages are filled to a target size (characters for Eastern text, words
//! otherwise) but break at titles, never directly after a title, and never
//! inside a line. A page that fills up on the body line right after its
//! closing headings hands those headings to the next page.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Size of one line and whether it is a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    pub size: usize,
    pub is_title: bool,
}

/// Measure a line of plain text.
pub fn measure(text: &str, is_eastern: bool) -> usize {
    if is_eastern {
        text.chars().filter(|c| !c.is_whitespace()).count()
    } else {
        text.unicode_words().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationOptions {
    /// Characters per page for Eastern text.
    pub eastern_page_size: usize,
    /// Words per page for Western text.
    pub western_page_size: usize,
    pub page_break_on_title: bool,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            eastern_page_size: 1500,
            western_page_size: 350,
            page_break_on_title: true,
        }
    }
}

impl PaginationOptions {
    pub fn target(&self, is_eastern: bool) -> usize {
        let target = if is_eastern {
            self.eastern_page_size
        } else {
            self.western_page_size
        };
        target.max(1)
    }
}

/// State of the page open when a window starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Carry {
    /// Size accumulated on the open page.
    pub size: usize,
    /// Lines on the open page.
    pub lines: usize,
    pub previous_is_title: bool,
    /// Every line on the open page so far is a title.
    pub only_titles: bool,
}

impl Carry {
    /// Carry for a page that begins at `lines[0]` and runs to the end of
    /// `lines`.
    pub fn of_page(lines: &[PageMetrics]) -> Self {
        Carry {
            size: lines.iter().map(|l| l.size).sum(),
            lines: lines.len(),
            previous_is_title: lines.last().is_some_and(|l| l.is_title),
            only_titles: !lines.is_empty() && lines.iter().all(|l| l.is_title),
        }
    }
}

/// A stretch of lines to paginate.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    /// Absolute index of `lines[0]`.
    pub start: usize,
    pub lines: &'a [PageMetrics],
    /// Absolute indices that must start a page.
    pub forced: &'a [usize],
    pub carry: Carry,
    pub target: usize,
    pub page_break_on_title: bool,
}

/// Absolute indices of the lines starting a page, in increasing order,
/// forced breaks included.
pub fn paginate(window: &Window) -> Vec<usize> {
    let mut breaks: Vec<usize> = Vec::new();
    let mut size = window.carry.size;
    let mut page_lines = window.carry.lines;
    let mut previous_is_title = window.carry.previous_is_title;
    let mut heading_run = window.carry.only_titles;
    // First index and total size of the titles closing the open page; none
    // while the run began before the window.
    let mut closing_titles: Option<(usize, usize)> = None;

    for (offset, line) in window.lines.iter().enumerate() {
        let index = window.start + offset;
        let starts_page = if window.forced.contains(&index) {
            true
        } else if window.page_break_on_title && line.is_title {
            // Nested headings stay with the heading that opened the page.
            !(previous_is_title && heading_run)
        } else if previous_is_title {
            let movable = closing_titles.filter(|_| !heading_run && !line.is_title);
            if let Some((first, titles_size)) = movable {
                if size >= window.target {
                    breaks.push(first);
                    size = titles_size;
                    page_lines = index - first;
                    heading_run = true;
                }
            }
            false
        } else {
            size >= window.target || (line.size >= window.target && page_lines > 0)
        };

        if starts_page {
            breaks.push(index);
            size = 0;
            page_lines = 0;
            heading_run = true;
        }
        closing_titles = match (line.is_title, closing_titles) {
            (false, _) => None,
            (true, Some((first, titles_size))) if previous_is_title && !starts_page => {
                Some((first, titles_size + line.size))
            }
            (true, None) if previous_is_title && !starts_page => None,
            (true, _) => Some((index, line.size)),
        };
        heading_run = heading_run && line.is_title;
        size += line.size;
        page_lines += 1;
        previous_is_title = line.is_title;
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn line(size: usize) -> PageMetrics {
        PageMetrics { size, is_title: false }
    }

    fn title() -> PageMetrics {
        PageMetrics { size: 2, is_title: true }
    }

    fn window<'a>(lines: &'a [PageMetrics], forced: &'a [usize], target: usize) -> Window<'a> {
        Window {
            start: 0,
            lines,
            forced,
            carry: Carry::default(),
            target,
            page_break_on_title: true,
        }
    }

    #[test]
    fn breaks_before_titles() {
        let lines = [title(), line(3), title(), line(3)];
        assert_eq!(paginate(&window(&lines, &[0], 100)), vec![0, 2]);
    }

    #[test]
    fn fills_pages_to_target() {
        let lines = [line(4), line(4), line(4), line(4), line(4)];
        assert_eq!(paginate(&window(&lines, &[0], 8)), vec![0, 2, 4]);
    }

    #[test]
    fn closing_title_moves_to_next_page() {
        let lines = [line(5), PageMetrics { size: 5, is_title: true }, line(5), line(5)];
        let mut w = window(&lines, &[0], 10);
        w.page_break_on_title = false;
        // The page fills at the body under the title; the title goes along.
        assert_eq!(paginate(&w), vec![0, 1, 3]);
    }

    #[test]
    fn closing_heading_run_moves_together() {
        let lines = [line(6), title(), title(), line(4), line(1)];
        let mut w = window(&lines, &[0], 10);
        w.page_break_on_title = false;
        assert_eq!(paginate(&w), vec![0, 1]);
    }

    #[test]
    fn heading_only_page_keeps_its_body() {
        let lines = [PageMetrics { size: 12, is_title: true }, line(5), line(1)];
        let mut w = window(&lines, &[0], 10);
        w.page_break_on_title = false;
        assert_eq!(paginate(&w), vec![0, 2]);
    }

    #[test]
    fn nested_headings_share_a_page() {
        let lines = [title(), title(), line(3), title(), line(1)];
        assert_eq!(paginate(&window(&lines, &[0], 100)), vec![0, 3]);
    }

    #[test]
    fn oversize_line_gets_its_own_page() {
        let lines = [line(2), line(50), line(2)];
        assert_eq!(paginate(&window(&lines, &[0], 10)), vec![0, 1, 2]);
    }

    #[test]
    fn full_page_breaks_even_before_a_short_last_line() {
        let lines = [line(10), line(1)];
        assert_eq!(paginate(&window(&lines, &[0], 10)), vec![0, 1]);
    }

    #[test]
    fn carry_continues_open_page() {
        let lines = [line(3), line(3)];
        let mut w = window(&lines, &[], 8);
        w.start = 40;
        w.carry = Carry { size: 6, lines: 2, previous_is_title: false, only_titles: false };
        assert_eq!(paginate(&w), vec![41]);

        w.carry = Carry::of_page(&[title()]);
        w.carry.size = 20;
        assert_eq!(paginate(&w), vec![41]);
    }

    #[test]
    fn headings_before_the_window_stay_put() {
        let lines = [line(3), line(3)];
        let mut w = window(&lines, &[], 8);
        w.page_break_on_title = false;
        w.start = 10;
        w.carry = Carry { size: 9, lines: 2, previous_is_title: true, only_titles: false };
        assert_eq!(paginate(&w), vec![11]);
    }

    #[test]
    fn split_windows_match_one_pass() {
        let lines = [line(4), line(4), title(), line(4), line(4), line(4), title(), line(9)];
        let mut whole = window(&lines, &[0], 10);
        whole.page_break_on_title = false;
        let expected = paginate(&whole);

        let split = 5;
        let mut first = window(&lines[..split], &[0], 10);
        first.page_break_on_title = false;
        let committed: Vec<usize> = paginate(&first).into_iter().filter(|&b| b < 2).collect();
        let page_start = committed.last().copied().unwrap_or(0);
        let second = Window {
            start: 2,
            lines: &lines[2..],
            forced: &[],
            carry: Carry::of_page(&lines[page_start..2]),
            target: 10,
            page_break_on_title: false,
        };
        let mut merged = committed;
        merged.extend(paginate(&second));
        assert_eq!(merged, expected);
    }

    #[test]
    fn measures() {
        assert_eq!(measure("少年 离开了家乡。", true), 8);
        assert_eq!(measure("The quick, brown fox.", false), 4);
    }

    fn metrics() -> impl Strategy<Value = Vec<PageMetrics>> {
        prop::collection::vec(
            (0usize..40, prop::bool::weighted(0.1)).prop_map(|(size, is_title)| PageMetrics { size, is_title }),
            1..200,
        )
    }

    proptest! {
        #[test]
        fn breaks_increase_and_start_at_zero(lines in metrics(), target in 1usize..100) {
            let breaks = paginate(&window(&lines, &[0], target));
            prop_assert_eq!(breaks.first().copied(), Some(0));
            prop_assert!(breaks.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(breaks.iter().all(|&b| b < lines.len()));
        }

        #[test]
        fn no_page_ends_with_a_title_when_body_follows(lines in metrics(), target in 1usize..100) {
            let mut w = window(&lines, &[0], target);
            w.page_break_on_title = false;
            let breaks = paginate(&w);
            for &b in breaks.iter().skip(1) {
                prop_assert!(!lines[b - 1].is_title);
            }
        }
    }
}
