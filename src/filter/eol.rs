//! filter::eol
//!
//! Streaming end-of-line conversion.
//!
//! A CR at the end of one chunk is remembered so that a CRLF split across
//! two chunks converts the same way as an unsplit one.

/// Which way content is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Object database to working tree: LF becomes CRLF.
    ToWorktree,
    /// Working tree to object database: CRLF becomes LF.
    ToOdb,
}

/// Incremental EOL converter.
#[derive(Debug, Clone)]
pub struct EolConverter {
    direction: Direction,
    /// ToWorktree: previous byte was CR. ToOdb: a CR is held back.
    cr: bool,
}

impl EolConverter {
    pub fn new(direction: Direction) -> Self {
        EolConverter {
            direction,
            cr: false,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Convert one chunk, appending to `out`.
    pub fn convert(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        match self.direction {
            Direction::ToWorktree => {
                for &b in input {
                    if b == b'\n' && !self.cr {
                        out.push(b'\r');
                    }
                    out.push(b);
                    self.cr = b == b'\r';
                }
            }
            Direction::ToOdb => {
                for &b in input {
                    if self.cr {
                        self.cr = false;
                        if b == b'\n' {
                            out.push(b'\n');
                            continue;
                        }
                        out.push(b'\r');
                    }
                    if b == b'\r' {
                        self.cr = true;
                    } else {
                        out.push(b);
                    }
                }
            }
        }
    }

    /// Flush anything held back after the last chunk.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.direction == Direction::ToOdb && self.cr {
            out.push(b'\r');
        }
        self.cr = false;
    }

    /// Convert a whole buffer at once.
    pub fn convert_all(direction: Direction, input: &[u8]) -> Vec<u8> {
        let mut converter = EolConverter::new(direction);
        let mut out = Vec::with_capacity(input.len());
        converter.convert(input, &mut out);
        converter.finish(&mut out);
        out
    }
}
