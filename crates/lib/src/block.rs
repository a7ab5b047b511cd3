//! Managed block editing.
//!
//! A managed block is a region of a configuration file that belongs to this
//! tool. It is delimited by a start and an end marker line:
//!
//! ```text
//! dtparam=audio=on
//!
//! # ==============Hive Configuration==============
//! [all]
//! dtparam=disable-bt
//! # ==============End of Hive Configuration==============
//! ```
//!
//! [`apply_block`] replaces the region between (and including) the markers
//! with a new body, or appends a fresh block when none exists yet. Everything
//! outside the markers is passed through byte for byte, which is what makes
//! repeated provisioning runs converge instead of piling up duplicate blocks.
//!
//! The functions here are pure string transformations; reading and writing
//! files is done by [`crate::edit::FileEditSession`].

use std::fmt;

use thiserror::Error;

use crate::consts::{HIVE_BLOCK_END, HIVE_BLOCK_START};

/// The literal lines that open and close a managed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarkers {
  pub start: String,
  pub end: String,
}

impl BlockMarkers {
  pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
    Self {
      start: start.into(),
      end: end.into(),
    }
  }

  /// Markers used for every file a Hive install manages.
  pub fn hive() -> Self {
    Self::new(HIVE_BLOCK_START, HIVE_BLOCK_END)
  }

  fn wrap(&self, body: &[String], eol: &str) -> String {
    let mut out = String::new();
    out.push_str(&self.start);
    out.push_str(eol);
    for line in body {
      out.push_str(line);
      out.push_str(eol);
    }
    out.push_str(&self.end);
    out.push_str(eol);
    out
  }
}

/// The content cannot be edited safely because its markers are inconsistent.
///
/// Line numbers are 1-based so they can be shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
  #[error("start marker on line {line} has no matching end marker")]
  MissingEnd { line: usize },

  #[error("end marker on line {line} has no matching start marker")]
  MissingStart { line: usize },

  #[error("end marker on line {end} comes before start marker on line {start}")]
  Reversed { start: usize, end: usize },

  #[error("marker `{marker}` appears more than once (lines {first} and {second})")]
  Duplicate { marker: String, first: usize, second: usize },
}

/// Position of an existing managed block, as 0-based line indices of its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
  pub start: usize,
  pub end: usize,
}

impl BlockSpan {
  /// Number of lines covered by the block, markers included.
  pub fn line_count(&self) -> usize {
    self.end - self.start + 1
  }
}

/// What [`apply_block`] did to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAction {
  /// No block existed; a new one was appended.
  Inserted,
  /// An existing block was replaced with a different body.
  Replaced,
  /// An existing block already had exactly the requested body.
  Unchanged,
}

impl fmt::Display for BlockAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BlockAction::Inserted => write!(f, "inserted"),
      BlockAction::Replaced => write!(f, "replaced"),
      BlockAction::Unchanged => write!(f, "unchanged"),
    }
  }
}

/// Result of a successful [`apply_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEdit {
  pub content: String,
  pub action: BlockAction,
}

/// Locate the managed block delimited by `markers`.
///
/// Returns `Ok(None)` when neither marker is present.
pub fn find_block(content: &str, markers: &BlockMarkers) -> Result<Option<BlockSpan>, BlockError> {
  let mut start: Option<usize> = None;
  let mut end: Option<usize> = None;

  for (idx, line) in content.split_inclusive('\n').enumerate() {
    let text = line_text(line);
    if text == markers.start {
      if let Some(first) = start {
        return Err(BlockError::Duplicate {
          marker: markers.start.clone(),
          first: first + 1,
          second: idx + 1,
        });
      }
      start = Some(idx);
    } else if text == markers.end {
      if let Some(first) = end {
        return Err(BlockError::Duplicate {
          marker: markers.end.clone(),
          first: first + 1,
          second: idx + 1,
        });
      }
      end = Some(idx);
    }
  }

  match (start, end) {
    (None, None) => Ok(None),
    (Some(start), Some(end)) if start < end => Ok(Some(BlockSpan { start, end })),
    (Some(start), Some(end)) => Err(BlockError::Reversed {
      start: start + 1,
      end: end + 1,
    }),
    (Some(start), None) => Err(BlockError::MissingEnd { line: start + 1 }),
    (None, Some(end)) => Err(BlockError::MissingStart { line: end + 1 }),
  }
}

/// Put `body` into the managed block of `content`.
///
/// If a block exists, the lines from the start marker through the end marker
/// are replaced by the markers wrapping `body`; all other lines are kept
/// untouched. Otherwise the wrapped body is appended, separated from the
/// existing content by one blank line unless the content is empty or already
/// ends with a blank line.
///
/// New lines use the line ending of the start marker (or of the first line
/// when appending), so CRLF files stay CRLF.
pub fn apply_block(content: &str, markers: &BlockMarkers, body: &[String]) -> Result<BlockEdit, BlockError> {
  match find_block(content, markers)? {
    Some(span) => {
      let lines: Vec<&str> = content.split_inclusive('\n').collect();
      let eol = line_ending(lines[span.start]);

      let mut out = String::with_capacity(content.len());
      out.extend(lines[..span.start].iter().copied());
      out.push_str(&markers.wrap(body, eol));
      out.extend(lines[span.end + 1..].iter().copied());

      let action = if out == content {
        BlockAction::Unchanged
      } else {
        BlockAction::Replaced
      };
      Ok(BlockEdit { content: out, action })
    }
    None => {
      let eol = content.split_inclusive('\n').next().map(line_ending).unwrap_or("\n");

      let mut out = String::with_capacity(content.len() + 256);
      out.push_str(content);
      if !out.is_empty() {
        if !out.ends_with('\n') {
          out.push_str(eol);
        }
        if !ends_with_blank_line(&out) {
          out.push_str(eol);
        }
      }
      out.push_str(&markers.wrap(body, eol));

      Ok(BlockEdit {
        content: out,
        action: BlockAction::Inserted,
      })
    }
  }
}

/// Rewrite individual lines of `content`.
///
/// `rewrite` is called with each line's text (without its line ending). When
/// it returns `Some`, that text replaces the line; the original line ending is
/// kept. Returns the new content and the number of lines that were replaced.
pub fn rewrite_lines<F>(content: &str, mut rewrite: F) -> (String, usize)
where
  F: FnMut(&str) -> Option<String>,
{
  let mut out = String::with_capacity(content.len());
  let mut replaced = 0;

  for line in content.split_inclusive('\n') {
    let text = line_text(line);
    match rewrite(text) {
      Some(new_text) => {
        out.push_str(&new_text);
        out.push_str(&line[text.len()..]);
        replaced += 1;
      }
      None => out.push_str(line),
    }
  }

  (out, replaced)
}

/// Line content with any `\n` / `\r\n` terminator removed.
fn line_text(line: &str) -> &str {
  let line = line.strip_suffix('\n').unwrap_or(line);
  line.strip_suffix('\r').unwrap_or(line)
}

fn line_ending(line: &str) -> &'static str {
  if line.ends_with("\r\n") { "\r\n" } else { "\n" }
}

/// Whether the last line of `content` (which must end with a newline) is blank.
fn ends_with_blank_line(content: &str) -> bool {
  content
    .split_inclusive('\n')
    .next_back()
    .is_some_and(|line| line_text(line).trim().is_empty())
}
