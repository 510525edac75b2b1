use std::num::IntErrorKind;

use serde::Serialize;

/// Page bookkeeping for a listing of `count` items split into pages of
/// `per_page`. Pages are 1-indexed and there is always at least one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves a raw `?page=` value. Missing or non-numeric values give the
    /// first page; numbers outside the valid range clamp to the nearest end,
    /// even when they are too large to parse.
    pub fn validate_number(&self, raw: Option<&str>) -> i64 {
        let raw = match raw {
            Some(raw) => raw.trim(),
            None => return 1,
        };
        match raw.parse::<i64>() {
            Ok(n) => n.clamp(1, self.num_pages()),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => self.num_pages(),
            Err(_) => 1,
        }
    }

    pub fn get_page(&self, raw: Option<&str>) -> PageInfo {
        let number = self.validate_number(raw);
        let num_pages = self.num_pages();
        PageInfo {
            number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: number < num_pages,
            has_previous: number > 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageInfo {
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn next_page_number(&self) -> Option<i64> {
        self.has_next.then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<i64> {
        self.has_previous.then(|| self.number - 1)
    }
}

/// One page of a listing, ready for the templates.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(object_list: Vec<T>, info: PageInfo) -> Self {
        Page {
            object_list,
            number: info.number,
            num_pages: info.num_pages,
            count: info.count,
            has_next: info.has_next,
            has_previous: info.has_previous,
            next_page_number: info.next_page_number(),
            previous_page_number: info.previous_page_number(),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            object_list: self.object_list.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
        }
    }
}
