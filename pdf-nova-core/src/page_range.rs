//! Page specifications such as `"1-3,5,8-6"`

use crate::error::{NovaError, Result};
use std::collections::BTreeSet;

/// A validated set of pages, stored as sorted 0-based indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    indices: Vec<usize>,
}

impl PageSelection {
    /// Every page of a `total_pages` document
    pub fn all(total_pages: usize) -> Self {
        Self {
            indices: (0..total_pages).collect(),
        }
    }

    /// Parse a 1-based specification against a document of `total_pages`
    ///
    /// Chunks are separated by commas. A chunk is either a page number or an
    /// inclusive `a-b` range; reversed ranges are accepted. Duplicates collapse.
    ///
    /// Examples:
    /// - "3" -> [2]
    /// - "1-3,5" -> [0, 1, 2, 4]
    /// - "5-3" -> [2, 3, 4]
    pub fn parse(spec: &str, total_pages: usize) -> Result<Self> {
        let chunks: Vec<&str> = spec
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        if chunks.is_empty() {
            return Err(NovaError::invalid("Empty page specification."));
        }

        let mut pages = BTreeSet::new();
        for chunk in chunks {
            if let Some((start, end)) = chunk.split_once('-') {
                let (start, end) = (start.trim(), end.trim());
                let (Some(a), Some(b)) = (parse_number(start), parse_number(end)) else {
                    return Err(NovaError::invalid(format!("Invalid range: {chunk}")));
                };
                let (a, b) = if a > b { (b, a) } else { (a, b) };
                for page in a..=b {
                    pages.insert(check_bounds(page, total_pages)?);
                }
            } else {
                let page = parse_number(chunk)
                    .ok_or_else(|| NovaError::invalid(format!("Invalid page: {chunk}")))?;
                if page == usize::MAX {
                    let digits = chunk.trim_start_matches('0');
                    return Err(NovaError::invalid(format!("Page out of range: {digits}")));
                }
                pages.insert(check_bounds(page, total_pages)?);
            }
        }

        Ok(Self {
            indices: pages.into_iter().collect(),
        })
    }

    /// Parse `spec`, or select every page when it is blank
    pub fn parse_or_all(spec: &str, total_pages: usize) -> Result<Self> {
        if spec.trim().is_empty() {
            Ok(Self::all(total_pages))
        } else {
            Self::parse(spec, total_pages)
        }
    }

    /// Sorted 0-based indices
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Sorted 1-based page numbers
    pub fn page_numbers(&self) -> Vec<u32> {
        self.indices.iter().map(|&i| i as u32 + 1).collect()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Digits only; values past `usize::MAX` saturate so they fail the bounds check
fn parse_number(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse().unwrap_or(usize::MAX))
}

fn check_bounds(page: usize, total_pages: usize) -> Result<usize> {
    if page < 1 || page > total_pages {
        return Err(NovaError::invalid(format!("Page out of range: {page}")));
    }
    Ok(page - 1)
}
