//! PDF text layer to an XLSX workbook
//!
//! One `Page_N` sheet per page. Text runs are grouped into rows by baseline
//! and laid out left to right, one cell per run, with an empty cell wherever
//! the horizontal gap exceeds [`layout::COLUMN_GAP`]. An `All_Text` sheet
//! lists every extracted line as `(page, line, content)`.

use super::docx::escape_xml;
use crate::artifact::{self, Artifact};
use crate::error::Result;
use crate::layout;
use crate::operations::split::zip_entries;
use crate::pdf;
use crate::upload::Upload;
use lopdf::{Document, ObjectId};
use tracing::{debug, instrument};

pub const EMPTY_PAGE_TEXT: &str = "No extractable text found on this page.";

/// Excel refuses longer cell values
const MAX_CELL_CHARS: usize = 32_767;
const WIDTH_COLUMNS: usize = 60;
const WIDTH_ROWS: usize = 4_000;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    fn display_len(&self) -> usize {
        match self {
            CellValue::Text(text) => text.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
            CellValue::Empty => 0,
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_string())
    }
}

impl From<usize> for CellValue {
    fn from(n: usize) -> Self {
        CellValue::Number(n as f64)
    }
}

/// One sheet of a generated workbook
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
    /// Thin borders over the used rectangle
    pub bordered: bool,
    pub bold_header: bool,
    pub column_widths: Vec<f64>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Size of the used rectangle as `(rows, columns)`
    pub fn used_area(&self) -> (usize, usize) {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (self.rows.len(), columns)
    }

    /// `min(50, max(10, len * 0.95))` per column over the sampled area
    pub fn autofit(&mut self) {
        let (_, columns) = self.used_area();
        self.column_widths = (0..columns.min(WIDTH_COLUMNS))
            .map(|col| {
                let longest = self
                    .rows
                    .iter()
                    .take(WIDTH_ROWS)
                    .filter_map(|row| row.get(col))
                    .map(CellValue::display_len)
                    .max()
                    .unwrap_or(0);
                (longest as f64 * 0.95).clamp(10.0, 50.0)
            })
            .collect();
    }

    fn style(&self, row: usize) -> u32 {
        match (self.bordered, self.bold_header && row == 0) {
            (false, false) => 0,
            (true, false) => 1,
            (true, true) => 2,
            (false, true) => 3,
        }
    }

    fn to_xml(&self) -> String {
        let (rows, columns) = self.used_area();
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );
        if rows > 0 {
            xml.push_str(&format!(
                r#"<dimension ref="A1:{}{}"/>"#,
                column_name(columns.saturating_sub(1)),
                rows
            ));
        }
        if !self.column_widths.is_empty() {
            xml.push_str("<cols>");
            for (index, width) in self.column_widths.iter().enumerate() {
                xml.push_str(&format!(
                    r#"<col min="{n}" max="{n}" width="{width:.2}" customWidth="1"/>"#,
                    n = index + 1
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (r, row) in self.rows.iter().enumerate() {
            let style = self.style(r);
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            // A bordered sheet styles the whole rectangle, empty cells included
            let width = if self.bordered { columns } else { row.len() };
            for c in 0..width {
                let reference = format!("{}{}", column_name(c), r + 1);
                let style_attr = if style > 0 {
                    format!(r#" s="{style}""#)
                } else {
                    String::new()
                };
                match row.get(c) {
                    Some(CellValue::Text(text)) => {
                        let text: String = text.chars().take(MAX_CELL_CHARS).collect();
                        xml.push_str(&format!(
                            r#"<c r="{reference}" t="inlineStr"{style_attr}><is><t xml:space="preserve">{}</t></is></c>"#,
                            escape_xml(&text)
                        ));
                    }
                    Some(CellValue::Number(n)) => {
                        xml.push_str(&format!(r#"<c r="{reference}"{style_attr}><v>{n}</v></c>"#));
                    }
                    Some(CellValue::Empty) | None => {
                        xml.push_str(&format!(r#"<c r="{reference}"{style_attr}/>"#))
                    }
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }
}

/// Spreadsheet column letters for a 0-based index: A, ..., Z, AA, ...
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn page_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Rows of one page placed by text position
///
/// Pages whose fonts cannot be decoded positionally fall back to the plain
/// text layer, one line per row.
pub fn page_rows(doc: &Document, page_number: u32, page_id: ObjectId) -> Vec<Vec<CellValue>> {
    match layout::page_runs(doc, page_id) {
        Some(runs) => layout::text_lines(runs)
            .iter()
            .map(|line| {
                layout::line_cells(line)
                    .into_iter()
                    .map(|cell| cell.map_or(CellValue::Empty, CellValue::Text))
                    .collect()
            })
            .collect(),
        None => page_lines(&pdf::page_text(doc, page_number))
            .into_iter()
            .map(|line| vec![CellValue::from(line)])
            .collect(),
    }
}

fn page_sheet(number: usize, rows: Vec<Vec<CellValue>>) -> Worksheet {
    let mut sheet = Worksheet::new(format!("Page_{number}"));
    if rows.is_empty() {
        sheet.rows.push(vec![EMPTY_PAGE_TEXT.into()]);
        return sheet;
    }
    sheet.rows = rows;
    sheet.bordered = true;
    sheet.bold_header = sheet.rows.first().map(Vec::len).unwrap_or(0) >= 2;
    sheet.autofit();
    sheet
}

fn summary_sheet(pages: &[String]) -> Worksheet {
    let mut sheet = Worksheet::new("All_Text");
    sheet
        .rows
        .push(vec!["page".into(), "line".into(), "content".into()]);
    for (index, text) in pages.iter().enumerate() {
        let page = index + 1;
        let lines = page_lines(text);
        if lines.is_empty() {
            sheet.rows.push(vec![page.into(), 1usize.into(), "".into()]);
        }
        for (line_index, line) in lines.into_iter().enumerate() {
            sheet
                .rows
                .push(vec![page.into(), (line_index + 1).into(), line.into()]);
        }
    }
    sheet
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="10"/><name val="Calibri"/></font><font><b/><sz val="10"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"><color rgb="FF6B7280"/></left><right style="thin"><color rgb="FF6B7280"/></right><top style="thin"><color rgb="FF6B7280"/></top><bottom style="thin"><color rgb="FF6B7280"/></bottom><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="4"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"><alignment vertical="top" wrapText="1"/></xf><xf numFmtId="0" fontId="1" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1"><alignment vertical="top" wrapText="1"/></xf><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

/// Package sheets as an XLSX file
pub fn workbook_package(sheets: &[Worksheet]) -> Result<Vec<u8>> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    let mut parts: Vec<(String, String)> = Vec::with_capacity(sheets.len());
    for (index, sheet) in sheets.iter().enumerate() {
        let n = index + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape_xml(&sheet.name)
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
        parts.push((format!("xl/worksheets/sheet{n}.xml"), sheet.to_xml()));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheets.len() + 1
    ));

    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    let mut entries: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", content_types.as_bytes()),
        ("_rels/.rels", root_rels.as_bytes()),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels.as_bytes()),
        ("xl/styles.xml", STYLES.as_bytes()),
    ];
    entries.extend(parts.iter().map(|(name, xml)| (name.as_str(), xml.as_bytes())));
    zip_entries(entries)
}

/// Text of every page laid out as `pdf_nova_converted.xlsx`
#[instrument(skip_all, fields(file = upload.display_name()))]
pub fn pdf_to_excel(upload: &Upload) -> Result<Artifact> {
    let doc = pdf::load(upload)?;
    let page_ids = pdf::page_ids(&doc);
    let pages: Vec<String> = (1..=page_ids.len() as u32)
        .map(|page| pdf::page_text(&doc, page))
        .collect();

    let mut sheets: Vec<Worksheet> = page_ids
        .iter()
        .enumerate()
        .map(|(index, &page_id)| {
            let number = index + 1;
            page_sheet(number, page_rows(&doc, number as u32, page_id))
        })
        .collect();
    sheets.push(summary_sheet(&pages));
    debug!(sheets = sheets.len(), "workbook laid out");

    let data = workbook_package(&sheets)?;
    Ok(Artifact::new("pdf_nova_converted.xlsx", artifact::XLSX, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixturePage};
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    fn rows(lines: &[&[&str]]) -> Vec<Vec<CellValue>> {
        lines
            .iter()
            .map(|line| line.iter().map(|&cell| CellValue::from(cell)).collect())
            .collect()
    }

    fn sheet_xml(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, n: usize) -> String {
        let mut xml = String::new();
        archive
            .by_name(&format!("xl/worksheets/sheet{n}.xml"))
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(51), "AZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_page_rows_follow_positions() {
        let table: &[&[&str]] = &[&["Name", "Qty"], &["Apple", "3"], &["Pear", "12"]];
        let doc = Document::load_mem(&fixtures::document(&[FixturePage::Table(table)])).unwrap();
        let page_id = pdf::page_ids(&doc)[0];

        let expected = vec![
            vec!["Name".into(), CellValue::Empty, "Qty".into()],
            vec!["Apple".into(), CellValue::Empty, "3".into()],
            vec!["Pear".into(), CellValue::Empty, "12".into()],
        ];
        assert_eq!(page_rows(&doc, 1, page_id), expected);
    }

    #[test]
    fn test_page_sheet_layout() {
        let sheet = page_sheet(
            2,
            rows(&[
                &["Item", "Total"],
                &["Widget", "4"],
                &["A short note with a long tail of text"],
            ]),
        );
        assert_eq!(sheet.name, "Page_2");
        assert_eq!(sheet.used_area(), (3, 2));
        assert!(sheet.bordered);
        assert!(sheet.bold_header);
        assert_eq!(sheet.column_widths.len(), 2);
        assert_eq!(sheet.column_widths[1], 10.0);
        assert!((sheet.column_widths[0] - 37.0 * 0.95).abs() < 1e-9);

        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<c r="A1" t="inlineStr" s="2">"#));
        // Bordered rectangle fills the short row
        assert!(xml.contains(r#"<c r="B3" s="1"/>"#));
    }

    #[test]
    fn test_single_column_header_is_not_bold() {
        let sheet = page_sheet(1, rows(&[&["Title"], &["body", "text"]]));
        assert!(!sheet.bold_header);
    }

    #[test]
    fn test_empty_page() {
        let sheet = page_sheet(1, Vec::new());
        assert_eq!(sheet.rows, vec![vec![CellValue::from(EMPTY_PAGE_TEXT)]]);
        assert!(!sheet.bordered);
    }

    #[test]
    fn test_widths_are_capped() {
        let long = "x".repeat(200);
        let sheet = page_sheet(1, rows(&[&[long.as_str()]]));
        assert_eq!(sheet.column_widths, vec![50.0]);
    }

    #[test]
    fn test_summary_sheet() {
        let sheet = summary_sheet(&["a\nb".to_string(), String::new()]);
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(
            sheet.rows[2],
            vec![CellValue::Number(1.0), CellValue::Number(2.0), "b".into()]
        );
        assert_eq!(
            sheet.rows[3],
            vec![CellValue::Number(2.0), CellValue::Number(1.0), "".into()]
        );
    }

    #[test]
    fn test_pdf_to_excel_package() {
        let upload = Upload::new(
            "report.pdf",
            fixtures::document(&[FixturePage::Text("Quarterly <report>"), FixturePage::Blank]),
        );
        let artifact = pdf_to_excel(&upload).unwrap();
        assert_eq!(artifact.file_name, "pdf_nova_converted.xlsx");
        assert_eq!(artifact.media_type, artifact::XLSX);

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data)).unwrap();
        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert!(workbook.contains(r#"name="Page_1""#));
        assert!(workbook.contains(r#"name="Page_2""#));
        assert!(workbook.contains(r#"name="All_Text""#));

        assert!(sheet_xml(&mut archive, 1).contains("Quarterly &lt;report&gt;"));
        assert!(sheet_xml(&mut archive, 2).contains(EMPTY_PAGE_TEXT));
        assert!(archive.by_name("xl/worksheets/sheet3.xml").is_ok());
        assert!(archive.by_name("xl/styles.xml").is_ok());
    }

    #[test]
    fn test_pdf_table_lands_in_separate_cells() {
        let table: &[&[&str]] = &[&["Name", "Qty"], &["Apple", "3"]];
        let upload = Upload::new("stock.pdf", fixtures::document(&[FixturePage::Table(table)]));
        let artifact = pdf_to_excel(&upload).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data)).unwrap();
        let sheet = sheet_xml(&mut archive, 1);
        assert!(sheet.contains(r#"<dimension ref="A1:C2"/>"#));
        assert!(sheet.contains(
            r#"<c r="A1" t="inlineStr" s="2"><is><t xml:space="preserve">Name</t></is></c>"#
        ));
        assert!(sheet.contains(r#"<c r="B1" s="2"/>"#));
        assert!(sheet.contains(
            r#"<c r="C1" t="inlineStr" s="2"><is><t xml:space="preserve">Qty</t></is></c>"#
        ));
        assert!(sheet.contains(
            r#"<c r="A2" t="inlineStr" s="1"><is><t xml:space="preserve">Apple</t></is></c>"#
        ));
        assert!(sheet.contains(
            r#"<c r="C2" t="inlineStr" s="1"><is><t xml:space="preserve">3</t></is></c>"#
        ));
    }
}
