//! Begin/End section parsing.
//!
//! The log is a linear sequence of sections delimited by exact marker lines
//! such as `[Device Begin]` and `[Device End]`. [`read_section`] consumes
//! exactly one section and hands every content line to a [`SectionSink`].
//! The grammar is strict: content outside a section, an unmatched `End`, a
//! nested `Begin`, or a stream that ends mid-section all abort the read.

use crate::error::{Error, Result};
use crate::reader::LineReader;
use std::io::BufRead;

/// Receiver for the content lines of one section.
///
/// One implementation exists per section kind: the devices summary, a single
/// device block, and the trailing event stream.
pub trait SectionSink {
    /// Called once per content line, in order. Returning an error aborts the
    /// whole log read.
    fn content(&mut self, line: &str) -> Result<()>;
}

/// Implement SectionSink for closures.
impl<F> SectionSink for F
where
    F: FnMut(&str) -> Result<()>,
{
    fn content(&mut self, line: &str) -> Result<()> {
        self(line)
    }
}

/// Where the parser stands relative to the section being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Begin marker not seen yet.
    Outside,
    /// Between Begin and End; content lines are live.
    Inside,
    /// End marker consumed; the section is complete.
    Done,
}

/// Consume one `begin`/`end` delimited section from `lines`, feeding content
/// lines to `sink`.
///
/// Marker comparison is exact and case-sensitive.
pub fn read_section<R: BufRead, S: SectionSink>(
    lines: &mut LineReader<R>,
    begin: &str,
    end: &str,
    sink: &mut S,
) -> Result<()> {
    let mut mode = Mode::Outside;

    while let Some(line) = lines.next_line()? {
        mode = match mode {
            Mode::Outside => {
                if line == begin {
                    Mode::Inside
                } else if line == end {
                    return Err(Error::format_at(
                        lines.line_number(),
                        format!("{end:?} without matching {begin:?}"),
                    ));
                } else {
                    return Err(Error::format_at(
                        lines.line_number(),
                        format!("expected {begin:?}, got {:?}", line),
                    ));
                }
            }
            Mode::Inside => {
                if line == begin {
                    return Err(Error::format_at(
                        lines.line_number(),
                        format!("nested {begin:?}"),
                    ));
                } else if line == end {
                    Mode::Done
                } else {
                    sink.content(&line)?;
                    Mode::Inside
                }
            }
            Mode::Done => unreachable!("section loop runs past its end marker"),
        };

        if mode == Mode::Done {
            return Ok(());
        }
    }

    match mode {
        Mode::Outside => Err(Error::Format(format!("missing section {begin:?}"))),
        _ => Err(Error::Format(format!(
            "unterminated section: {end:?} not found before end of stream"
        ))),
    }
}
