use std::fs;
use std::path::Path;

use log::debug;

use crate::constants::*;
use crate::error::{Result, VmError};
use crate::vm_manager::{PageEntry, SegmentEntry, VmManager};

/// Parsed initialization file: ST triples on line 1, PT triples on line 2
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitData {
    pub st_entries: Vec<SegmentEntry>,
    pub pt_entries: Vec<PageEntry>,
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| VmError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &'static str) -> Result<T> {
    token.parse().map_err(|_| VmError::InvalidNumber {
        what,
        token: token.to_string(),
    })
}

/// Whitespace tokens of an init line, which must come in whole triples
fn triple_tokens<'a>(line: &'a str, table: &'static str) -> Result<Vec<&'a str>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() % 3 != 0 {
        return Err(VmError::TokenCount {
            table,
            count: tokens.len(),
        });
    }
    Ok(tokens)
}

impl InitData {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&read_file(path.as_ref())?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines();

        let st_line = lines.next().ok_or(VmError::EmptyInit)?;
        let st_entries = Self::parse_st_line(st_line)?;
        let pt_entries = match lines.next() {
            Some(line) => Self::parse_pt_line(line)?,
            None => Vec::new(),
        };

        Ok(InitData { st_entries, pt_entries })
    }

    fn parse_st_line(line: &str) -> Result<Vec<SegmentEntry>> {
        let tokens = triple_tokens(line, "ST")?;
        let mut entries = Vec::new();
        for chunk in tokens.chunks(3) {
            let segment: u32 = parse_number(chunk[0], "segment number")?;
            let size: i32 = parse_number(chunk[1], "segment size")?;
            let locator: i32 = parse_number(chunk[2], "frame/block")?;

            if segment >= MAX_SEGMENTS as u32 {
                return Err(VmError::SegmentOutOfRange(segment));
            }
            entries.push(SegmentEntry { segment, size, locator });
        }
        Ok(entries)
    }

    fn parse_pt_line(line: &str) -> Result<Vec<PageEntry>> {
        let tokens = triple_tokens(line, "PT")?;
        let mut entries = Vec::new();
        for chunk in tokens.chunks(3) {
            let segment: u32 = parse_number(chunk[0], "segment number")?;
            let page: u32 = parse_number(chunk[1], "page number")?;
            let value: i32 = parse_number(chunk[2], "frame/block")?;

            if segment >= MAX_SEGMENTS as u32 {
                return Err(VmError::SegmentOutOfRange(segment));
            }
            if page >= PT_SIZE as u32 {
                return Err(VmError::PageOutOfRange(page));
            }
            entries.push(PageEntry { segment, page, value });
        }
        Ok(entries)
    }

    /// Load the segment table, then the page tables, into `vm`
    pub fn apply(&self, vm: &mut VmManager) {
        vm.load_segment_table(&self.st_entries);
        vm.load_page_table(&self.pt_entries);
        debug!(
            "init: {} ST entries, {} PT entries, {} free frames",
            self.st_entries.len(),
            self.pt_entries.len(),
            vm.frames().free_count()
        );
    }

    /// True when some page table or page starts out on disk
    pub fn needs_demand_paging(&self) -> bool {
        self.st_entries.iter().any(|e| e.locator < 0) || self.pt_entries.iter().any(|e| e.value < 0)
    }
}

/// One line of the command file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `TA <va>`
    Translate(i64),
    /// `RP <pa>`
    ReadPhysical(i64),
    /// `NL`
    NewLine,
}

impl Command {
    fn operand(line: usize, command: &'static str, token: Option<&str>) -> Result<i64> {
        let token = token.ok_or(VmError::MissingOperand { line, command })?;
        token.parse().map_err(|_| VmError::InvalidOperand {
            line,
            token: token.to_string(),
        })
    }

    /// Parse one non-blank line; `line` is 1-based and only used in errors
    pub fn parse_line(line: usize, text: &str) -> Result<Self> {
        let mut parts = text.split_whitespace();
        match parts.next() {
            Some("TA") => Ok(Command::Translate(Self::operand(line, "TA", parts.next())?)),
            Some("RP") => Ok(Command::ReadPhysical(Self::operand(line, "RP", parts.next())?)),
            Some("NL") => Ok(Command::NewLine),
            Some(other) => Err(VmError::UnknownCommand {
                line,
                command: other.to_string(),
            }),
            None => Err(VmError::UnknownCommand {
                line,
                command: String::new(),
            }),
        }
    }
}

/// Parse a whole command file, skipping blank lines
pub fn parse_commands(content: &str) -> Result<Vec<Command>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Command::parse_line(i + 1, text))
        .collect()
}

pub fn read_commands<P: AsRef<Path>>(path: P) -> Result<Vec<Command>> {
    parse_commands(&read_file(path.as_ref())?)
}
