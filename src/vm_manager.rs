use std::io::{self, Write};

use log::{debug, info, warn};

use crate::constants::*;
use crate::error::MemoryError;
use crate::io::Command;
use crate::memory::{Disk, FreeFrameList, PhysicalMemory};
use crate::translation::{self, TranslationResult, VirtualAddress};

/// One `<s, z, f>` triple from the first init line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    pub segment: u32,
    pub size: i32,
    /// PT frame when >= 0, negated disk block when < 0
    pub locator: i32,
}

/// One `<s, p, f>` triple from the second init line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub segment: u32,
    pub page: u32,
    /// Page frame when >= 0, negated disk block when < 0
    pub value: i32,
}

/// Which level of the hierarchy had to be brought in from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    PageTable,
    Page,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    pub translations: usize,
    pub failures: usize,
    pub page_table_faults: usize,
    pub page_faults: usize,
}

impl TranslationStats {
    pub fn record_fault(&mut self, fault: Fault) {
        match fault {
            Fault::PageTable => self.page_table_faults += 1,
            Fault::Page => self.page_faults += 1,
        }
    }

    pub fn successes(&self) -> usize {
        self.translations - self.failures
    }
}

/// Owns the whole simulated machine: PM, the paging disk and the free
/// frame list. Every mutation goes through `&mut self`.
pub struct VmManager {
    pm: PhysicalMemory,
    disk: Disk,
    free_frames: FreeFrameList,
    stats: TranslationStats,
}

impl VmManager {
    pub fn new() -> Self {
        VmManager {
            pm: PhysicalMemory::new(),
            disk: Disk::new(),
            free_frames: FreeFrameList::new(),
            stats: TranslationStats::default(),
        }
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.pm
    }

    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.pm
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn frames(&self) -> &FreeFrameList {
        &self.free_frames
    }

    pub fn stats(&self) -> &TranslationStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut TranslationStats {
        &mut self.stats
    }

    /// Word at `index`, -1 when outside physical memory
    pub fn read(&self, index: i64) -> i32 {
        self.pm.read(index)
    }

    pub fn try_read(&self, index: i64) -> Result<i32, MemoryError> {
        self.pm.try_read(index)
    }

    pub fn write(&mut self, index: i64, value: i32) {
        self.pm.write(index, value);
    }

    /// Claim the lowest free frame; `None` once every frame is in use
    pub fn allocate_frame(&mut self) -> Option<usize> {
        let frame = self.free_frames.allocate();
        match frame {
            Some(f) => debug!("allocated frame {} ({} left)", f, self.free_frames.free_count()),
            None => warn!("no free frame left"),
        }
        frame
    }

    /// Copy disk block `block` over frame `frame`
    pub fn load_block(&mut self, block: usize, frame: usize) -> Result<(), MemoryError> {
        self.disk.read_block(block, &mut self.pm, frame)?;
        debug!("loaded disk block {} into frame {}", block, frame);
        Ok(())
    }

    /// Fill in segment table entries. A non-negative locator claims its frame.
    pub fn load_segment_table(&mut self, entries: &[SegmentEntry]) {
        for entry in entries {
            self.pm.set_segment_entry(entry.segment, entry.size, entry.locator);
            if entry.locator >= 0 && !self.free_frames.mark_occupied(entry.locator as usize) {
                warn!(
                    "segment {}: page table frame {} does not exist",
                    entry.segment, entry.locator
                );
            }
        }
    }

    /// Fill in page table entries, either in a resident page table or in
    /// the disk block that holds a swapped-out one.
    pub fn load_page_table(&mut self, entries: &[PageEntry]) {
        for entry in entries {
            let segment = entry.segment;
            if self.pm.get_segment_size(segment) == 0 {
                warn!(
                    "ignoring page {} of undefined segment {}",
                    entry.page, segment
                );
                continue;
            }

            let pt_location = self.pm.get_segment_pt_location(segment);
            if pt_location >= 0 {
                self.pm.set_page_entry(pt_location as usize, entry.page, entry.value);
            } else {
                let block = pt_location.unsigned_abs() as usize;
                if let Err(e) = self.disk.write(block, entry.page as usize, entry.value) {
                    warn!("segment {} page {}: {}", segment, entry.page, e);
                }
            }

            if entry.value >= 0 && !self.free_frames.mark_occupied(entry.value as usize) {
                warn!(
                    "segment {} page {}: frame {} does not exist",
                    segment, entry.page, entry.value
                );
            }
        }
    }

    /// Translate one raw virtual address, faulting in whatever is missing
    pub fn translate(&mut self, raw_va: u32) -> TranslationResult {
        let va = VirtualAddress::from_raw(raw_va);
        let result = translation::translate(&va, self);
        self.stats.translations += 1;
        if !result.is_success() {
            self.stats.failures += 1;
        }
        result
    }

    /// Value a command contributes to the output line, `None` for `NL`
    pub fn run_command(&mut self, command: &Command) -> Option<i32> {
        match *command {
            Command::Translate(va) => Some(match u32::try_from(va) {
                Ok(va) => self.translate(va).to_output(),
                Err(_) => {
                    warn!("virtual address {} is not a 32-bit address", va);
                    INVALID_ADDRESS
                }
            }),
            Command::ReadPhysical(pa) => Some(self.read(pa)),
            Command::NewLine => None,
        }
    }

    /// Run commands in order, writing `value ` per TA/RP and `\n` per NL
    pub fn execute<W: Write>(&mut self, commands: &[Command], out: &mut W) -> io::Result<()> {
        for command in commands {
            match self.run_command(command) {
                Some(value) => write!(out, "{} ", value)?,
                None => writeln!(out)?,
            }
        }
        out.flush()?;
        info!(
            "{} commands, {} translations ({} failed), {} PT faults, {} page faults, {} free frames",
            commands.len(),
            self.stats.translations,
            self.stats.failures,
            self.stats.page_table_faults,
            self.stats.page_faults,
            self.free_frames.free_count()
        );
        Ok(())
    }
}

impl Default for VmManager {
    fn default() -> Self {
        Self::new()
    }
}
