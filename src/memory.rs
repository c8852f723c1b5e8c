use crate::constants::*;
use crate::error::MemoryError;

/// Word-addressed physical memory (PM). The segment table lives in frames
/// 0..ST_FRAMES and page tables are ordinary frames, so everything here is
/// just words.
pub struct PhysicalMemory {
    data: Box<[i32]>,
}

impl PhysicalMemory {
    /// Create a new physical memory initialized to all zeros
    pub fn new() -> Self {
        PhysicalMemory {
            data: vec![0i32; PM_SIZE].into_boxed_slice(),
        }
    }

    #[inline]
    fn slot(index: i64) -> Option<usize> {
        usize::try_from(index).ok().filter(|&i| i < PM_SIZE)
    }

    /// Read a word, or `MemoryError::AddressOutOfRange` outside `[0, PM_SIZE)`
    #[inline]
    pub fn try_read(&self, index: i64) -> Result<i32, MemoryError> {
        Self::slot(index)
            .map(|i| self.data[i])
            .ok_or(MemoryError::AddressOutOfRange(index))
    }

    /// Read a word from physical memory; out-of-range reads yield -1
    #[inline]
    pub fn read(&self, index: i64) -> i32 {
        self.try_read(index).unwrap_or(INVALID_ADDRESS)
    }

    /// Write a word to physical memory. Out-of-range writes are dropped.
    #[inline]
    pub fn write(&mut self, index: i64, value: i32) {
        if let Some(i) = Self::slot(index) {
            self.data[i] = value;
        }
    }

    /// Get the size of a segment from the Segment Table
    #[inline]
    pub fn get_segment_size(&self, segment: u32) -> i32 {
        self.read(2 * segment as i64)
    }

    /// Get the PT frame (>= 0) or negated disk block (< 0) for a segment
    #[inline]
    pub fn get_segment_pt_location(&self, segment: u32) -> i32 {
        self.read(2 * segment as i64 + 1)
    }

    /// Set a Segment Table entry
    pub fn set_segment_entry(&mut self, segment: u32, size: i32, pt_location: i32) {
        let base = 2 * segment as i64;
        self.write(base, size);
        self.write(base + 1, pt_location);
    }

    /// Rewrite only the locator word of a segment, e.g. after a PT fault
    pub fn set_segment_pt_location(&mut self, segment: u32, pt_location: i32) {
        self.write(2 * segment as i64 + 1, pt_location);
    }

    /// Word index of page `page`'s entry inside the page table at `pt_frame`
    #[inline]
    pub fn page_entry_index(pt_frame: usize, page: u32) -> i64 {
        (Self::frame_to_address(pt_frame) + page as usize) as i64
    }

    /// Get a Page Table entry
    pub fn get_page_frame(&self, pt_frame: usize, page: u32) -> Result<i32, MemoryError> {
        self.try_read(Self::page_entry_index(pt_frame, page))
    }

    /// Set a Page Table entry
    pub fn set_page_entry(&mut self, pt_frame: usize, page: u32, frame_location: i32) {
        self.write(Self::page_entry_index(pt_frame, page), frame_location);
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(frame: usize) -> usize {
        frame * FRAME_SIZE
    }

    /// Mutable view of one whole frame
    pub fn frame_mut(&mut self, frame: usize) -> Result<&mut [i32], MemoryError> {
        if frame >= NUM_FRAMES {
            return Err(MemoryError::FrameOutOfRange(frame));
        }
        let start = Self::frame_to_address(frame);
        Ok(&mut self.data[start..start + FRAME_SIZE])
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Paging Disk - simulates secondary storage for demand paging
pub struct Disk {
    /// D[block][offset] where block is 0-1023 and offset is 0-511
    data: Box<[[i32; BLOCK_SIZE]]>,
}

impl Disk {
    /// Create a new disk initialized to all zeros
    pub fn new() -> Self {
        Disk {
            data: vec![[0i32; BLOCK_SIZE]; DISK_BLOCKS].into_boxed_slice(),
        }
    }

    /// Read a word from disk
    #[inline]
    pub fn read(&self, block: usize, offset: usize) -> Option<i32> {
        self.data.get(block).and_then(|b| b.get(offset)).copied()
    }

    /// Write a word to disk while preloading the image
    pub fn write(&mut self, block: usize, offset: usize, value: i32) -> Result<(), MemoryError> {
        let slot = self
            .data
            .get_mut(block)
            .ok_or(MemoryError::BlockOutOfRange(block))?
            .get_mut(offset)
            .ok_or(MemoryError::AddressOutOfRange(offset as i64))?;
        *slot = value;
        Ok(())
    }

    /// Get direct access to a disk block
    pub fn block(&self, block: usize) -> Result<&[i32; BLOCK_SIZE], MemoryError> {
        self.data.get(block).ok_or(MemoryError::BlockOutOfRange(block))
    }

    /// Copy block D[block] into the frame `frame` of physical memory
    pub fn read_block(
        &self,
        block: usize,
        pm: &mut PhysicalMemory,
        frame: usize,
    ) -> Result<(), MemoryError> {
        let src = self.block(block)?;
        pm.frame_mut(frame)?.copy_from_slice(src);
        Ok(())
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks which frames are available for allocation
#[derive(Debug, Clone)]
pub struct FreeFrameList {
    free: Vec<bool>,
}

impl FreeFrameList {
    /// All frames free except the ones holding the segment table
    pub fn new() -> Self {
        let mut free = vec![true; NUM_FRAMES];
        free[..ST_FRAMES].fill(false);
        FreeFrameList { free }
    }

    pub fn is_free(&self, frame: usize) -> bool {
        self.free.get(frame).copied().unwrap_or(false)
    }

    /// Claim `frame`. Returns false when the frame does not exist.
    pub fn mark_occupied(&mut self, frame: usize) -> bool {
        match self.free.get_mut(frame) {
            Some(slot) => {
                *slot = false;
                true
            }
            None => false,
        }
    }

    /// First-fit: lowest-numbered free frame, claimed before returning
    pub fn allocate(&mut self) -> Option<usize> {
        let frame = self.free.iter().position(|&f| f)?;
        self.free[frame] = false;
        Some(frame)
    }

    pub fn free_count(&self) -> usize {
        self.free.iter().filter(|&&f| f).count()
    }
}

impl Default for FreeFrameList {
    fn default() -> Self {
        Self::new()
    }
}
