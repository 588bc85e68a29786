use serde::Serialize;

pub const POSTS_PER_PAGE: i64 = 10;
pub const GROUPS_PER_PAGE: i64 = 10;
pub const PROFILE_POSTS_PER_PAGE: i64 = 5;

/// A `?page=` value as the visitor sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Missing or not an integer.
    First,
    /// An integer outside `1..`, or too large to represent.
    Last,
    Number(i64),
}

impl PageRequest {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::First;
        };
        match raw.parse::<i64>() {
            Ok(n) if n >= 1 => Self::Number(n),
            Ok(_) => Self::Last,
            Err(_) if is_integer(raw) => Self::Last,
            Err(_) => Self::First,
        }
    }

    /// Stable name for caching the page this request resolves to.
    pub fn cache_key(&self) -> String {
        match self {
            Self::First => "1".to_string(),
            Self::Last => "last".to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Offset window for one page of a listing whose total size is known.
///
/// Page numbers start at 1. A missing or non-integer number falls back to
/// the first page. Any integer that names no page (past the end, zero,
/// negative) lands on the last page, and an empty listing still has a
/// single empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageWindow {
    pub fn resolve(requested: Option<&str>, total: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let total = total.max(0);
        let num_pages = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };

        let number = match PageRequest::parse(requested) {
            PageRequest::First => 1,
            PageRequest::Last => num_pages,
            PageRequest::Number(n) => n.min(num_pages),
        };

        Self {
            number,
            num_pages,
            per_page,
            total,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
            has_previous: self.has_previous(),
            has_next: self.has_next(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
}
