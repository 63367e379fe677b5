//! XLSX print setup rewrite: every sheet on one landscape page

use crate::error::{NovaError, Result};
use crate::operations::split::zip_entries;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

lazy_static! {
    static ref ATTR: Regex = Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#).unwrap();
    static ref WORKSHEET_OPEN: Regex = Regex::new(r"<worksheet\b[^>]*>").unwrap();
    static ref SHEET_PR: Regex = Regex::new(r"<sheetPr\b").unwrap();
    static ref SHEET_PR_EMPTY: Regex = Regex::new(r"<sheetPr\b([^>]*?)/>").unwrap();
    static ref PAGE_SETUP_PR: Regex = Regex::new(r"<pageSetUpPr\b([^>]*?)/>").unwrap();
    static ref PAGE_SETUP: Regex = Regex::new(r"<pageSetup\b([^>]*?)/>").unwrap();
    static ref PAGE_MARGINS: Regex = Regex::new(r"<pageMargins\b[^>]*/>").unwrap();
    // Elements that follow pageSetup in a worksheet
    static ref AFTER_PAGE_SETUP: Regex = Regex::new(
        r"<(headerFooter|rowBreaks|colBreaks|customProperties|cellWatches|ignoredErrors|smartTags|drawing|legacyDrawing|legacyDrawingHF|drawingHF|picture|oleObjects|controls|webPublishItems|tableParts|extLst)\b"
    )
    .unwrap();
}

const FIT_FLAG: &[(&str, &str)] = &[("fitToPage", "1")];
const ONE_LANDSCAPE_PAGE: &[(&str, &str)] = &[
    ("orientation", "landscape"),
    ("fitToWidth", "1"),
    ("fitToHeight", "1"),
];

/// Re-emit a tag keeping its attributes except the overridden ones
fn rebuild_tag(name: &str, attrs: &str, overrides: &[(&str, &str)], self_closing: bool) -> String {
    let mut out = format!("<{name}");
    for cap in ATTR.captures_iter(attrs) {
        let key = &cap[1];
        if overrides.iter().any(|(k, _)| *k == key) {
            continue;
        }
        out.push_str(&format!(r#" {key}="{}""#, &cap[2]));
    }
    for (key, value) in overrides {
        out.push_str(&format!(r#" {key}="{value}""#));
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

fn with_fit_flag(xml: &str) -> String {
    let setup_pr = rebuild_tag("pageSetUpPr", "", FIT_FLAG, true);

    if !SHEET_PR.is_match(xml) {
        return WORKSHEET_OPEN
            .replacen(xml, 1, |caps: &Captures| {
                format!("{}<sheetPr>{setup_pr}</sheetPr>", &caps[0])
            })
            .into_owned();
    }
    if SHEET_PR_EMPTY.is_match(xml) {
        return SHEET_PR_EMPTY
            .replacen(xml, 1, |caps: &Captures| {
                format!("{}{setup_pr}</sheetPr>", rebuild_tag("sheetPr", &caps[1], &[], false))
            })
            .into_owned();
    }
    if PAGE_SETUP_PR.is_match(xml) {
        return PAGE_SETUP_PR
            .replacen(xml, 1, |caps: &Captures| {
                rebuild_tag("pageSetUpPr", &caps[1], FIT_FLAG, true)
            })
            .into_owned();
    }
    // pageSetUpPr is the last child of sheetPr
    xml.replacen("</sheetPr>", &format!("{setup_pr}</sheetPr>"), 1)
}

fn with_landscape_setup(xml: &str) -> String {
    if PAGE_SETUP.is_match(xml) {
        return PAGE_SETUP
            .replacen(xml, 1, |caps: &Captures| {
                rebuild_tag("pageSetup", &caps[1], ONE_LANDSCAPE_PAGE, true)
            })
            .into_owned();
    }

    let setup = rebuild_tag("pageSetup", "", ONE_LANDSCAPE_PAGE, true);
    let at = PAGE_MARGINS
        .find(xml)
        .map(|m| m.end())
        .or_else(|| AFTER_PAGE_SETUP.find(xml).map(|m| m.start()))
        .or_else(|| xml.rfind("</worksheet>"));
    match at {
        Some(at) => format!("{}{setup}{}", &xml[..at], &xml[at..]),
        None => xml.to_string(),
    }
}

/// Set a worksheet part to print on a single landscape page
pub fn fit_sheet_xml(xml: &str) -> String {
    with_landscape_setup(&with_fit_flag(xml))
}

fn is_worksheet(name: &str) -> bool {
    name.strip_prefix("xl/worksheets/")
        .map(|rest| !rest.contains('/') && rest.ends_with(".xml"))
        .unwrap_or(false)
}

/// Rewrite every worksheet of an XLSX package; other parts are copied as is
pub fn fit_sheets_to_page(data: &[u8]) -> Result<Vec<u8>> {
    let invalid = || NovaError::invalid("Invalid Excel file.");
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(|_| invalid())?;

    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(archive.len());
    let mut sheets = 0;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|_| invalid())?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|_| invalid())?;
        if is_worksheet(&name) {
            let xml = String::from_utf8(bytes).map_err(|_| invalid())?;
            bytes = fit_sheet_xml(&xml).into_bytes();
            sheets += 1;
        }
        entries.push((name, bytes));
    }
    if sheets == 0 {
        return Err(invalid());
    }
    debug!(sheets, "worksheets set to one page");
    zip_entries(entries.iter().map(|(n, b)| (n.as_str(), b.as_slice())))
}
