use textwrap::{wrap, Options as WrapOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PagerError {
    #[error("pager: page width must be positive")]
    ZeroWidth,
    #[error("pager: page height must be positive")]
    ZeroHeight,
}

/// Reflows post text into fixed-height pages and tracks which page is shown.
#[derive(Debug, Clone)]
pub struct TextPager {
    width: usize,
    page_height: usize,
    pages: Vec<String>,
    cursor: usize,
}

impl TextPager {
    pub fn new(width: usize, page_height: usize) -> Result<Self, PagerError> {
        if width == 0 {
            return Err(PagerError::ZeroWidth);
        }
        if page_height == 0 {
            return Err(PagerError::ZeroHeight);
        }
        Ok(Self {
            width,
            page_height,
            pages: vec![String::new()],
            cursor: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn page_height(&self) -> usize {
        self.page_height
    }

    /// Replaces the current pages with `text` and rewinds to the first page.
    pub fn load(&mut self, text: &str) {
        self.pages = paginate(text, self.width, self.page_height);
        self.cursor = 0;
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_index(&self) -> usize {
        self.cursor
    }

    pub fn current_page(&self) -> &str {
        &self.pages[self.cursor]
    }

    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.pages.len()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    pub fn next_page(&mut self) {
        if self.has_next() {
            self.cursor += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.has_previous() {
            self.cursor -= 1;
        }
    }
}

fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let options = WrapOptions::new(width).break_words(true);
    let lines: Vec<String> = wrap(text, options)
        .into_iter()
        .map(|cow| cow.into_owned())
        .collect();
    if lines.is_empty() {
        vec![String::new()]
    } else {
        lines
    }
}

/// A new page starts at every wrapped line whose index is a multiple of
/// `page_height`.
fn paginate(text: &str, width: usize, page_height: usize) -> Vec<String> {
    let lines = wrap_lines(text, width);
    let mut pages: Vec<String> = Vec::with_capacity(lines.len() / page_height + 1);
    for (index, line) in lines.into_iter().enumerate() {
        if index % page_height == 0 {
            pages.push(line);
        } else if let Some(page) = pages.last_mut() {
            page.push('\n');
            page.push_str(&line);
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{i:02}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_zero_geometry() {
        assert_eq!(TextPager::new(0, 5).unwrap_err(), PagerError::ZeroWidth);
        assert_eq!(TextPager::new(10, 0).unwrap_err(), PagerError::ZeroHeight);
    }

    #[test]
    fn empty_text_is_single_empty_page() {
        let mut pager = TextPager::new(20, 3).unwrap();
        pager.load("");
        assert_eq!(pager.pages(), &[String::new()]);
        assert_eq!(pager.current_page(), "");
        assert!(!pager.has_next());
        assert!(!pager.has_previous());
    }

    #[test]
    fn fresh_pager_holds_one_empty_page() {
        let pager = TextPager::new(20, 3).unwrap();
        assert_eq!(pager.page_count(), 1);
        assert_eq!(pager.current_page(), "");
    }

    #[test]
    fn pages_partition_wrapped_lines() {
        let text = words(40);
        for height in 1..7 {
            let mut pager = TextPager::new(16, height).unwrap();
            pager.load(&text);
            let wrapped = wrap_lines(&text, 16);
            let page_lines: Vec<usize> = pager
                .pages()
                .iter()
                .map(|page| page.split('\n').count())
                .collect();
            assert_eq!(page_lines.iter().sum::<usize>(), wrapped.len());
            let (last, full) = page_lines.split_last().unwrap();
            assert!(full.iter().all(|&n| n == height), "height {height}");
            assert!(*last >= 1 && *last <= height);
            assert_eq!(pager.pages().join("\n"), wrapped.join("\n"));
        }
    }

    #[test]
    fn lines_fit_width() {
        let mut pager = TextPager::new(12, 4).unwrap();
        pager.load("a supercalifragilistic word that is far too long to fit");
        for page in pager.pages() {
            for line in page.split('\n') {
                assert!(line.chars().count() <= 12, "{line:?}");
            }
        }
    }

    #[test]
    fn keeps_paragraph_breaks() {
        let mut pager = TextPager::new(40, 10).unwrap();
        pager.load("first paragraph\n\nsecond paragraph");
        assert_eq!(pager.current_page(), "first paragraph\n\nsecond paragraph");
    }

    #[test]
    fn page_navigation_stops_at_bounds() {
        let mut pager = TextPager::new(5, 1).unwrap();
        pager.load("one two three");
        assert_eq!(pager.page_count(), 3);
        pager.previous_page();
        assert_eq!(pager.page_index(), 0);
        pager.next_page();
        pager.next_page();
        assert_eq!(pager.page_index(), 2);
        assert!(!pager.has_next());
        pager.next_page();
        assert_eq!(pager.page_index(), 2);
        assert_eq!(pager.current_page(), "three");
    }

    #[test]
    fn load_rewinds_to_first_page() {
        let mut pager = TextPager::new(5, 1).unwrap();
        pager.load("one two three");
        pager.next_page();
        pager.load("four five");
        assert_eq!(pager.page_index(), 0);
        assert_eq!(pager.page_count(), 2);
        assert_eq!(pager.current_page(), "four");
    }
}
