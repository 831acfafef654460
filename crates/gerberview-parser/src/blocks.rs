//! Splits raw file text into numbered logical blocks.

use serde::Serialize;

use crate::session::FileType;

/// One logical block and the line it started on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// 1-based line number of the block's first character.
    pub line: usize,
    /// Block text, without its terminator.
    pub text: String,
}

/// Splits text with the block rules of the given file type.
pub fn split(file_type: FileType, text: &str) -> Vec<Block> {
    match file_type {
        FileType::Gerber => gerber_blocks(text),
        FileType::Drill => drill_blocks(text),
    }
}

/// One block per non-empty trimmed line.
pub fn drill_blocks(text: &str) -> Vec<Block> {
    text.lines()
        .enumerate()
        .map(|(index, raw)| (index + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, text)| Block {
            line,
            text: text.to_string(),
        })
        .collect()
}

/// Splits Gerber text on `*`, keeping `%` sections intact where needed.
///
/// Inside a `%...%` section each command becomes its own `%`-prefixed
/// block, except `%AM` macro definitions, which are delivered whole.
pub fn gerber_blocks(text: &str) -> Vec<Block> {
    let mut splitter = GerberSplitter::default();
    for (index, raw) in text.lines().enumerate() {
        for ch in raw.chars() {
            splitter.feed(index + 1, ch);
        }
    }
    splitter.finish()
}

#[derive(Debug, Default)]
struct GerberSplitter {
    blocks: Vec<Block>,
    current: String,
    start: usize,
    in_param: bool,
}

impl GerberSplitter {
    fn feed(&mut self, line: usize, ch: char) {
        match ch {
            '%' => {
                self.flush();
                self.in_param = !self.in_param;
            }
            '*' if self.in_param && self.current.starts_with("AM") => self.current.push(ch),
            '*' => self.flush(),
            _ if self.current.is_empty() && ch.is_whitespace() => {}
            _ => {
                if self.current.is_empty() {
                    self.start = line;
                }
                self.current.push(ch);
            }
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let body = std::mem::take(&mut self.current);
        let text = if self.in_param {
            format!("%{body}")
        } else {
            body
        };
        self.blocks.push(Block {
            line: self.start,
            text,
        });
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.text.as_str()).collect()
    }

    #[test]
    fn ut_blk_001_drill_lines_are_blocks() {
        let blocks = drill_blocks("M48\r\n\n  T1C0.015  \nM30\n");
        assert_eq!(texts(&blocks), vec!["M48", "T1C0.015", "M30"]);
        let lines: Vec<usize> = blocks.iter().map(|b| b.line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
    }

    #[test]
    fn ut_blk_002_gerber_word_blocks_end_at_asterisk() {
        let blocks = gerber_blocks("G04 hello*\nX100Y100D02*X200D01*\nM02*\n");
        assert_eq!(
            texts(&blocks),
            vec!["G04 hello", "X100Y100D02", "X200D01", "M02"]
        );
        let lines: Vec<usize> = blocks.iter().map(|b| b.line).collect();
        assert_eq!(lines, vec![1, 2, 2, 3]);
    }

    #[test]
    fn ut_blk_003_parameter_sections_split_per_command() {
        let blocks = gerber_blocks("%FSLAX24Y24*MOIN*%\n%ADD10C,0.5*%\n");
        assert_eq!(texts(&blocks), vec!["%FSLAX24Y24", "%MOIN", "%ADD10C,0.5"]);
    }

    #[test]
    fn ut_blk_004_macro_definitions_are_whole() {
        let blocks = gerber_blocks("%AMDONUT*\n1,1,$1,0,0*\n1,0,$2,0,0*%\nD10*\n");
        assert_eq!(
            texts(&blocks),
            vec!["%AMDONUT*1,1,$1,0,0*1,0,$2,0,0*", "D10"]
        );
        assert_eq!(blocks.first().map(|b| b.line), Some(1));
        assert_eq!(blocks.get(1).map(|b| b.line), Some(4));
    }

    #[test]
    fn bc_blk_001_unterminated_tail_is_still_delivered() {
        let blocks = split(FileType::Gerber, "X1Y1D03*\nM02");
        assert_eq!(texts(&blocks), vec!["X1Y1D03", "M02"]);
    }
}
