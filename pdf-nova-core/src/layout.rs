//! Positioned text runs read from page content streams
//!
//! `lopdf::Document::extract_text` loses where text sits on the page, which
//! is what table-like layouts need. This module replays the text operators
//! of a page (`BT`/`ET`, `Tf`, `Td`/`TD`/`Tm`/`T*`, `Tj`/`TJ`/`'`/`"`, and
//! `q`/`Q`/`cm` for the CTM) and records each shown string with its start
//! and end x and its baseline y in page space.
//!
//! Glyph widths are estimated at half the font size per character, so run
//! ends are approximate.

use crate::pdf;
use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashSet;

/// Baselines closer than this share a line
pub const LINE_TOLERANCE: f64 = 3.2;
/// Runs closer than this may be one broken-up word
pub const FRAGMENT_GAP: f64 = 12.0;
/// Runs further apart than this get an empty cell between them
pub const COLUMN_GAP: f64 = 80.0;

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// One shown string in page space
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    /// Baseline
    pub y: f64,
    /// Font size after text and CTM scaling
    pub font_size: f64,
}

/// Runs of one visual line, left to right
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub y: f64,
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone)]
struct TextState {
    text_matrix: Matrix,
    text_line_matrix: Matrix,
    ctm: Matrix,
    leading: f64,
    char_space: f64,
    word_space: f64,
    horizontal_scale: f64,
    font_size: f64,
    /// Current font uses two-byte codes we cannot decode
    composite: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
            ctm: IDENTITY,
            leading: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scale: 100.0,
            font_size: 0.0,
            composite: false,
        }
    }
}

/// Multiply two transformation matrices (`a` applied first)
fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn transform_point(x: f64, y: f64, m: &Matrix) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn operand(op: &Operation, index: usize) -> f64 {
    op.operands.get(index).and_then(pdf::number).unwrap_or(0.0)
}

fn matrix_operands(op: &Operation) -> Option<Matrix> {
    if op.operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, value) in m.iter_mut().zip(&op.operands) {
        *slot = pdf::number(value)?;
    }
    Some(m)
}

/// Characters 0x80..=0x9F of WinAnsiEncoding
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8d}', 'Ž', '\u{8f}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9d}', 'ž', 'Ÿ',
];

/// Decode a string operand shown with a simple font
pub fn decode_simple(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WIN_ANSI_HIGH[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

/// Resource names of fonts with multi-byte encodings
fn composite_fonts(doc: &Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let resources = pdf::owned_resources(doc, page_id);
    let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .and_then(|f| pdf::resolve(doc, f).as_dict().ok())
    else {
        return HashSet::new();
    };
    fonts
        .iter()
        .filter(|(_, font)| {
            pdf::resolve(doc, font)
                .as_dict()
                .ok()
                .and_then(|d| d.get(b"Subtype").ok())
                .and_then(|s| s.as_name().ok())
                .map(|s| s == b"Type0")
                .unwrap_or(false)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

struct Replay {
    state: TextState,
    saved: Vec<Matrix>,
    runs: Vec<TextRun>,
    composite_fonts: HashSet<Vec<u8>>,
    /// A string could not be decoded
    undecodable: bool,
}

impl Replay {
    fn next_line(&mut self, tx: f64, ty: f64) {
        let m = multiply(&translation(tx, ty), &self.state.text_line_matrix);
        self.state.text_matrix = m;
        self.state.text_line_matrix = m;
    }

    fn advance(&mut self, tx: f64) {
        let tx = tx * self.state.horizontal_scale / 100.0;
        self.state.text_matrix = multiply(&translation(tx, 0.0), &self.state.text_matrix);
    }

    fn show(&mut self, bytes: &[u8]) {
        if self.state.composite {
            self.undecodable = true;
            return;
        }
        let text = decode_simple(bytes);
        let s = &self.state;
        let chars = text.chars().count() as f64;
        let spaces = text.chars().filter(|&c| c == ' ').count() as f64;
        let width = chars * (s.font_size * 0.5 + s.char_space) + spaces * s.word_space;

        let device = multiply(&s.text_matrix, &s.ctm);
        let (x0, y) = transform_point(0.0, 0.0, &device);
        let (x1, _) = transform_point(width * s.horizontal_scale / 100.0, 0.0, &device);
        let scale = (device[2] * device[2] + device[3] * device[3]).sqrt();
        let font_size = s.font_size * scale;

        if !text.trim().is_empty() {
            self.runs.push(TextRun {
                text,
                x0: x0.min(x1),
                x1: x0.max(x1),
                y,
                font_size,
            });
        }
        self.advance(width);
    }

    fn apply(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.saved.push(self.state.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(op) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.state.text_matrix = IDENTITY;
                self.state.text_line_matrix = IDENTITY;
            }
            "Tf" => {
                self.state.font_size = operand(op, 1);
                self.state.composite = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .map(|name| self.composite_fonts.contains(name))
                    .unwrap_or(false);
            }
            "Td" => self.next_line(operand(op, 0), operand(op, 1)),
            "TD" => {
                self.state.leading = -operand(op, 1);
                self.next_line(operand(op, 0), operand(op, 1));
            }
            "Tm" => {
                if let Some(m) = matrix_operands(op) {
                    self.state.text_matrix = m;
                    self.state.text_line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.leading),
            "TL" => self.state.leading = operand(op, 0),
            "Tc" => self.state.char_space = operand(op, 0),
            "Tw" => self.state.word_space = operand(op, 0),
            "Tz" => self.state.horizontal_scale = operand(op, 0),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.state.word_space = operand(op, 0);
                self.state.char_space = operand(op, 1);
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = op.operands.first() else {
                    return;
                };
                for item in items {
                    match item {
                        Object::String(bytes, _) => self.show(bytes),
                        other => {
                            if let Some(adjust) = pdf::number(other) {
                                self.advance(-adjust / 1000.0 * self.state.font_size);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Text runs of a page in content order
///
/// `None` when the page shows text in a font whose codes cannot be decoded
/// without its CMap; callers fall back to plain text extraction.
pub fn page_runs(doc: &Document, page_id: ObjectId) -> Option<Vec<TextRun>> {
    let content = doc.get_and_decode_page_content(page_id).ok()?;
    let mut replay = Replay {
        state: TextState::default(),
        saved: Vec::new(),
        runs: Vec::new(),
        composite_fonts: composite_fonts(doc, page_id),
        undecodable: false,
    };
    for op in &content.operations {
        replay.apply(op);
    }
    if replay.undecodable {
        None
    } else {
        Some(replay.runs)
    }
}

/// Group sorted values whose neighbours are within `tolerance`; returns the
/// mean of each group
pub fn cluster_positions(values: &[f64], tolerance: f64) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for v in sorted {
        match clusters.last_mut() {
            Some(cluster) if cluster.last().map_or(false, |last| (v - last).abs() <= tolerance) => {
                cluster.push(v)
            }
            _ => clusters.push(vec![v]),
        }
    }
    clusters
        .iter()
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect()
}

/// Index of the centre closest to `value`
pub fn nearest_index(value: f64, centers: &[f64]) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (value - **a).abs().total_cmp(&(value - **b).abs()))
        .map(|(index, _)| index)
        .unwrap_or(0)
}

fn is_alphabetic(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_alphabetic)
}

/// Join runs that look like pieces of one word or number
///
/// Neighbours at most [`FRAGMENT_GAP`] apart merge when either piece is three
/// characters or shorter, or when both are purely alphabetic. Pieces that
/// touch are glued; otherwise a space goes between them.
pub fn merge_fragments(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        let Some(prev) = merged.last_mut() else {
            merged.push(run);
            continue;
        };
        let gap = run.x0 - prev.x1;
        let (prev_text, text) = (prev.text.trim(), run.text.trim());
        let short = prev_text.chars().count() <= 3 || text.chars().count() <= 3;
        if gap <= FRAGMENT_GAP && (short || (is_alphabetic(prev_text) && is_alphabetic(text))) {
            let space_width = run.font_size.max(prev.font_size) * 0.2;
            let joiner = if gap > space_width { " " } else { "" };
            prev.text = format!("{prev_text}{joiner}{text}");
            prev.x1 = prev.x1.max(run.x1);
        } else {
            merged.push(run);
        }
    }
    merged
}

/// Cluster runs into lines, top of the page first
pub fn text_lines(runs: Vec<TextRun>) -> Vec<TextLine> {
    let baselines: Vec<f64> = runs.iter().map(|r| r.y).collect();
    let centers = cluster_positions(&baselines, LINE_TOLERANCE);
    let mut grouped: Vec<Vec<TextRun>> = vec![Vec::new(); centers.len()];
    for run in runs {
        grouped[nearest_index(run.y, &centers)].push(run);
    }

    let mut lines: Vec<TextLine> = centers
        .into_iter()
        .zip(grouped)
        .filter(|(_, runs)| !runs.is_empty())
        .map(|(y, mut runs)| {
            runs.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            TextLine {
                y,
                runs: merge_fragments(runs),
            }
        })
        .collect();
    lines.sort_by(|a, b| b.y.total_cmp(&a.y));
    lines
}

/// Cell texts of a line; `None` marks the empty cell left for a wide gap
pub fn line_cells(line: &TextLine) -> Vec<Option<String>> {
    let mut cells = Vec::with_capacity(line.runs.len());
    for (index, run) in line.runs.iter().enumerate() {
        cells.push(Some(run.text.trim().to_string()));
        if let Some(next) = line.runs.get(index + 1) {
            if next.x0 - run.x1 > COLUMN_GAP {
                cells.push(None);
            }
        }
    }
    cells
}
