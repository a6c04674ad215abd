//! Locates a single request (head line plus JSON body) inside a buffer that
//! may hold several stacked requests.
//!
//! A request looks like this:
//!
//! ```text
//! POST my-index/_search
//! {
//!   "query": { "match_all": {} }
//! }
//! ```
//!
//! The block chosen is the nearest head line at or before the cursor. The
//! body ends on the line where the brace depth returns to zero. A head
//! whose following lines never open a brace takes the rest of the buffer
//! as its body.

use regex::Regex;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

const REGEX_PATTERN_HEAD: &str = r"^(GET|POST)\s+\S+";

static HEAD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(REGEX_PATTERN_HEAD).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            _ => Err(format!("Unsupported method: {s}")),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestBlock {
    method: Method,
    target: String,
    body_text: String,
}

impl RequestBlock {
    pub fn new(method: Method, target: String, body_text: String) -> Self {
        RequestBlock {
            method,
            target,
            body_text,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Index (or index pattern) the request is aimed at.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body_text)
    }

    pub fn search_path(&self) -> String {
        format!("/{}/_search", self.target)
    }

    fn from_lines(lines: &[&str], head: usize, tail: usize) -> Option<Self> {
        let mut tokens = lines[head].split_whitespace();
        let method = tokens.next()?.parse::<Method>().ok()?;
        let target = tokens.next()?.split('/').next().unwrap_or_default();
        let body_text = lines[head + 1..=tail].join("\n");

        Some(RequestBlock::new(method, target.to_string(), body_text))
    }
}

/// A block found by [`find_all`], with 1-based line numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedBlock {
    pub head_line: usize,
    pub tail_line: usize,
    pub block: RequestBlock,
}

/// How a line moves the brace depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BraceCounting {
    /// A line with any `{` counts +1 and a line with any `}` counts -1,
    /// however many of each it holds. Dense one-line JSON such as
    /// `{"a":{"b":1}}` therefore nets to zero on that line.
    #[default]
    PerLine,
    /// Every brace outside a JSON string literal counts.
    PerCharacter,
}

impl BraceCounting {
    /// Returns (opening, closing) contributions of `line`.
    fn count(&self, line: &str) -> (i64, i64) {
        match self {
            BraceCounting::PerLine => (line.contains('{') as i64, line.contains('}') as i64),
            BraceCounting::PerCharacter => {
                let mut opens = 0;
                let mut closes = 0;
                let mut in_string = false;
                let mut escaped = false;
                for c in line.chars() {
                    if in_string {
                        match (escaped, c) {
                            (true, _) => escaped = false,
                            (false, '\\') => escaped = true,
                            (false, '"') => in_string = false,
                            _ => {}
                        }
                        continue;
                    }
                    match c {
                        '"' => in_string = true,
                        '{' => opens += 1,
                        '}' => closes += 1,
                        _ => {}
                    }
                }
                (opens, closes)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Walking backward; `line` is the next index to test against the head pattern.
    SeekingHead { line: usize },
    /// Walking forward from `head`; `line` is the next index to count.
    ScanningBody {
        head: usize,
        line: usize,
        depth: i64,
        started: bool,
    },
    Found { head: usize, tail: usize },
    NotFound,
}

struct Scanner<'a> {
    lines: &'a [&'a str],
    counting: BraceCounting,
}

impl<'a> Scanner<'a> {
    fn new(lines: &'a [&'a str], counting: BraceCounting) -> Self {
        Scanner { lines, counting }
    }

    fn start(&self, cursor_line: usize) -> ScanState {
        if cursor_line == 0 || self.lines.is_empty() {
            return ScanState::NotFound;
        }
        ScanState::SeekingHead {
            line: (cursor_line - 1).min(self.lines.len() - 1),
        }
    }

    fn scan_from(head: usize) -> ScanState {
        ScanState::ScanningBody {
            head,
            line: head,
            depth: 0,
            started: false,
        }
    }

    fn step(&self, state: ScanState) -> ScanState {
        match state {
            ScanState::SeekingHead { line } => {
                if HEAD_REGEX.is_match(self.lines[line]) {
                    Self::scan_from(line)
                } else if line == 0 {
                    ScanState::NotFound
                } else {
                    ScanState::SeekingHead { line: line - 1 }
                }
            }
            ScanState::ScanningBody {
                head,
                line,
                depth,
                started,
            } => {
                let Some(text) = self.lines.get(line) else {
                    return if !started && depth == 0 {
                        ScanState::Found {
                            head,
                            tail: self.lines.len() - 1,
                        }
                    } else {
                        ScanState::NotFound
                    };
                };
                let (opens, closes) = self.counting.count(text);
                let started = started || opens > 0;
                let depth = depth + opens - closes;
                if started && depth == 0 {
                    ScanState::Found { head, tail: line }
                } else {
                    ScanState::ScanningBody {
                        head,
                        line: line + 1,
                        depth,
                        started,
                    }
                }
            }
            done => done,
        }
    }

    fn run(&self, mut state: ScanState) -> ScanState {
        loop {
            match state {
                ScanState::Found { .. } | ScanState::NotFound => return state,
                _ => state = self.step(state),
            }
        }
    }
}

fn split_lines(buffer: &str) -> Vec<&str> {
    buffer.split('\n').collect()
}

/// Extracts the request nearest at or before `cursor_line` (1-based).
pub fn extract(buffer: &str, cursor_line: usize) -> Option<RequestBlock> {
    extract_with(buffer, cursor_line, BraceCounting::default())
}

pub fn extract_with(
    buffer: &str,
    cursor_line: usize,
    counting: BraceCounting,
) -> Option<RequestBlock> {
    let lines = split_lines(buffer);
    let scanner = Scanner::new(&lines, counting);

    match scanner.run(scanner.start(cursor_line)) {
        ScanState::Found { head, tail } => {
            tracing::debug!("request found at lines {}..={}", head + 1, tail + 1);
            RequestBlock::from_lines(&lines, head, tail)
        }
        _ => {
            tracing::debug!("no complete request at or before line {}", cursor_line);
            None
        }
    }
}

/// Every complete request in the buffer, top to bottom.
pub fn find_all(buffer: &str, counting: BraceCounting) -> Vec<LocatedBlock> {
    let lines = split_lines(buffer);
    let scanner = Scanner::new(&lines, counting);
    let mut blocks = Vec::new();
    let mut line = 0;

    while line < lines.len() {
        if !HEAD_REGEX.is_match(lines[line]) {
            line += 1;
            continue;
        }
        match scanner.run(Scanner::scan_from(line)) {
            ScanState::Found { head, tail } => {
                if let Some(block) = RequestBlock::from_lines(&lines, head, tail) {
                    blocks.push(LocatedBlock {
                        head_line: head + 1,
                        tail_line: tail + 1,
                        block,
                    });
                }
                line = tail + 1;
            }
            _ => line += 1,
        }
    }

    blocks
}
