//! Glyph → word-token grouping.
//!
//! pdfium reports one bounding box per character. Words are rebuilt from
//! those boxes the way a layout-aware extractor does:
//!
//! 1. glyphs are clustered into lines: a glyph joins the current line when its
//!    top lies within `y_tolerance` of the line's first glyph;
//! 2. each line is read left to right;
//! 3. a new word starts when the horizontal gap to the previous glyph exceeds
//!    `x_tolerance`. Blank characters stay inside the word, so closely set
//!    phrases come out as one token.
//!
//! Coordinates are top-left based: `top` grows downwards from the page top.

/// One positioned character as read from the text layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// A positioned unit of extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct WordToken {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl WordToken {
    pub fn new(text: impl Into<String>, left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Snap distances used when grouping glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub x: f32,
    pub y: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self { x: 3.0, y: 3.0 }
    }
}

/// Group glyphs into word tokens, in reading order.
pub fn group_words(glyphs: &[Glyph], tol: Tolerance) -> Vec<WordToken> {
    let mut sorted: Vec<&Glyph> = glyphs.iter().filter(|g| !g.ch.is_control()).collect();
    sorted.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut words = Vec::new();
    let mut line: Vec<&Glyph> = Vec::new();
    let mut line_top = f32::NAN;

    for glyph in sorted {
        if !line.is_empty() && (glyph.top - line_top).abs() > tol.y {
            split_line(&mut line, tol.x, &mut words);
        }
        if line.is_empty() {
            line_top = glyph.top;
        }
        line.push(glyph);
    }
    split_line(&mut line, tol.x, &mut words);

    words
}

/// Drain one line of glyphs into words.
fn split_line(line: &mut Vec<&Glyph>, x_tol: f32, out: &mut Vec<WordToken>) {
    line.sort_by(|a, b| a.left.total_cmp(&b.left));

    let mut current: Option<WordToken> = None;
    for glyph in line.drain(..) {
        match current.as_mut() {
            Some(word) if glyph.left - word.right <= x_tol => {
                word.text.push(glyph.ch);
                word.right = word.right.max(glyph.right);
                word.top = word.top.min(glyph.top);
                word.bottom = word.bottom.max(glyph.bottom);
            }
            _ => {
                if let Some(done) = current.take() {
                    push_trimmed(done, out);
                }
                current = Some(WordToken::new(
                    glyph.ch.to_string(),
                    glyph.left,
                    glyph.top,
                    glyph.right,
                    glyph.bottom,
                ));
            }
        }
    }
    if let Some(done) = current {
        push_trimmed(done, out);
    }
}

fn push_trimmed(mut word: WordToken, out: &mut Vec<WordToken>) {
    let trimmed = word.text.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.len() != word.text.len() {
        word.text = trimmed.to_string();
    }
    out.push(word);
}
