use log::{debug, trace, warn};

use crate::constants::*;
use crate::memory::PhysicalMemory;
use crate::vm_manager::{Fault, VmManager};

/// Represents the decomposed components of a Virtual Address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: u32,
    pub s: u32,
    pub p: u32,
    pub w: u32,
    pub pw: u32,
}

impl VirtualAddress {
    /// Decompose a raw VA into its components
    pub fn from_raw(va: u32) -> Self {
        let s = va >> S_SHIFT;
        let p = (va >> P_SHIFT) & P_MASK;
        let w = va & W_MASK;
        let pw = va & PW_MASK;

        VirtualAddress { va, s, p, w, pw }
    }

    /// Segment and page number combined
    #[inline]
    pub fn sp(&self) -> u32 {
        (self.s << P_BITS) | self.p
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VA({}) = (s={}, p={}, w={}, pw={})",
            self.va, self.s, self.p, self.w, self.pw
        )
    }
}

/// Result of an address translation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationResult {
    Success(i32),
    /// Segment has size 0 or lies past the segment table
    InvalidSegment,
    /// `pw` is not below the segment size
    SegmentBoundaryViolation,
    /// A fault needed a frame and none was free
    FrameExhausted,
    /// A locator names a frame or disk block that does not exist
    InvalidLocator,
}

impl TranslationResult {
    /// Convert to the output format (-1 for errors, PA otherwise)
    pub fn to_output(&self) -> i32 {
        match self {
            TranslationResult::Success(pa) => *pa,
            _ => INVALID_ADDRESS,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TranslationResult::Success(_))
    }

    /// Physical address on success
    pub fn physical_address(&self) -> Option<i32> {
        match self {
            TranslationResult::Success(pa) => Some(*pa),
            _ => None,
        }
    }
}

/// Turn a locator into a resident frame. Non-negative locators already are
/// one; negative ones are brought in from disk block `-locator` into a
/// freshly allocated frame.
fn resolve(vm: &mut VmManager, locator: i32, fault: Fault) -> Result<usize, TranslationResult> {
    if locator >= 0 {
        let frame = locator as usize;
        if frame >= NUM_FRAMES {
            return Err(TranslationResult::InvalidLocator);
        }
        return Ok(frame);
    }

    let block = locator.unsigned_abs() as usize;
    // checked before allocating so a bad block never costs a frame
    if block >= DISK_BLOCKS {
        return Err(TranslationResult::InvalidLocator);
    }

    let Some(frame) = vm.allocate_frame() else {
        warn!("{:?} fault on block {} with no free frame", fault, block);
        return Err(TranslationResult::FrameExhausted);
    };
    vm.load_block(block, frame)
        .map_err(|_| TranslationResult::InvalidLocator)?;
    vm.stats_mut().record_fault(fault);
    debug!("{:?} fault: block {} -> frame {}", fault, block, frame);
    Ok(frame)
}

fn walk(va: &VirtualAddress, vm: &mut VmManager) -> Result<i32, TranslationResult> {
    if va.s as usize >= MAX_SEGMENTS {
        return Err(TranslationResult::InvalidSegment);
    }

    // Step 1: segment table entry
    let segment_size = vm.memory().get_segment_size(va.s);
    let pt_location = vm.memory().get_segment_pt_location(va.s);

    // Step 2: bounds, before any fault handling
    if segment_size == 0 {
        return Err(TranslationResult::InvalidSegment);
    }
    if i64::from(va.pw) >= i64::from(segment_size) {
        return Err(TranslationResult::SegmentBoundaryViolation);
    }

    // Step 3: page table residency
    let pt_frame = resolve(vm, pt_location, Fault::PageTable)?;
    if pt_location < 0 {
        vm.memory_mut().set_segment_pt_location(va.s, pt_frame as i32);
    }

    // Step 4: page table entry
    let page_location = vm
        .memory()
        .get_page_frame(pt_frame, va.p)
        .map_err(|_| TranslationResult::InvalidLocator)?;

    // Step 5: page residency
    let page_frame = resolve(vm, page_location, Fault::Page)?;
    if page_location < 0 {
        vm.memory_mut().set_page_entry(pt_frame, va.p, page_frame as i32);
    }

    // Step 6: frame 0 is a valid destination
    Ok((PhysicalMemory::frame_to_address(page_frame) + va.w as usize) as i32)
}

/// Translate a virtual address to a physical address, bringing the page
/// table and the page in from disk when they are not resident.
///
/// Each call handles at most one page table fault and one page fault.
/// A failed fault leaves the locator it was resolving untouched.
pub fn translate(va: &VirtualAddress, vm: &mut VmManager) -> TranslationResult {
    let result = match walk(va, vm) {
        Ok(pa) => TranslationResult::Success(pa),
        Err(failure) => failure,
    };
    trace!("{} -> {:?}", va, result);
    result
}

/// Translate a batch of virtual addresses into output values
pub fn translate_batch(vas: &[u32], vm: &mut VmManager) -> Vec<i32> {
    vas.iter().map(|&va| vm.translate(va).to_output()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm_manager::{PageEntry, SegmentEntry};

    fn vm_with(st: &[(u32, i32, i32)], pt: &[(u32, u32, i32)]) -> VmManager {
        let mut vm = VmManager::new();
        let st: Vec<_> = st
            .iter()
            .map(|&(segment, size, locator)| SegmentEntry { segment, size, locator })
            .collect();
        let pt: Vec<_> = pt
            .iter()
            .map(|&(segment, page, value)| PageEntry { segment, page, value })
            .collect();
        vm.load_segment_table(&st);
        vm.load_page_table(&pt);
        vm
    }

    fn va(s: u32, p: u32, w: u32) -> VirtualAddress {
        VirtualAddress::from_raw((s << 18) | (p << 9) | w)
    }

    #[test]
    fn test_va_decomposition() {
        // VA = 789002 = 000000011 000000101 000001010
        let va = VirtualAddress::from_raw(789002);

        assert_eq!(va.s, 3);
        assert_eq!(va.p, 5);
        assert_eq!(va.w, 10);
        assert_eq!(va.pw, 5 * 512 + 10);
    }

    #[test]
    fn test_va_decomposition_edge_cases() {
        let va = VirtualAddress::from_raw(0);
        assert_eq!((va.s, va.p, va.w, va.pw), (0, 0, 0, 0));

        let max_va = (511 << 18) | (511 << 9) | 511;
        let va = VirtualAddress::from_raw(max_va);
        assert_eq!(va.s, 511);
        assert_eq!(va.p, 511);
        assert_eq!(va.w, 511);
        assert_eq!(va.pw, (511 << 9) | 511);

        // bits above the 27-bit layout all land in s
        let va = VirtualAddress::from_raw(1 << 27);
        assert_eq!(va.s, 512);
    }

    #[test]
    fn test_va_reconstruction() {
        for &original in &[0, 789002, 1575424, 1575863, 2097162, 2359818] {
            let va = VirtualAddress::from_raw(original);
            let reconstructed = (va.s << 18) | (va.p << 9) | va.w;
            assert_eq!(reconstructed, original, "Failed for VA={}", original);
            assert_eq!(va.pw, va.p * FRAME_SIZE as u32 + va.w);
        }
    }

    #[test]
    fn test_sp_calculation() {
        let va = VirtualAddress::from_raw(789002); // s=3, p=5
        assert_eq!(va.sp(), (3 << 9) | 5);
    }

    #[test]
    fn test_display() {
        let display = VirtualAddress::from_raw(789002).to_string();
        assert_eq!(display, "VA(789002) = (s=3, p=5, w=10, pw=2570)");
    }

    #[test]
    fn test_translation_result_to_output() {
        assert_eq!(TranslationResult::Success(4608).to_output(), 4608);
        assert_eq!(TranslationResult::Success(0).to_output(), 0);
        assert_eq!(TranslationResult::SegmentBoundaryViolation.to_output(), -1);
        assert_eq!(TranslationResult::InvalidSegment.to_output(), -1);
        assert_eq!(TranslationResult::FrameExhausted.to_output(), -1);
        assert_eq!(TranslationResult::InvalidLocator.to_output(), -1);
        assert_eq!(TranslationResult::Success(7).physical_address(), Some(7));
        assert_eq!(TranslationResult::InvalidSegment.physical_address(), None);
    }

    // Line 1: 6 3000 4
    // Line 2: 6 5 9
    fn simple_vm() -> VmManager {
        vm_with(&[(6, 3000, 4)], &[(6, 5, 9)])
    }

    #[test]
    fn test_translate_resident() {
        let mut vm = simple_vm();
        let results = translate_batch(&[1575424, 1575863, 1575864], &mut vm);
        // pw = 3000 is exactly the segment size
        assert_eq!(results, vec![4608, 5047, -1]);
    }

    #[test]
    fn test_translate_boundary_violation() {
        let mut vm = simple_vm();
        let va = VirtualAddress::from_raw(1575864);
        assert_eq!(va.pw, 3000);
        assert_eq!(
            translate(&va, &mut vm),
            TranslationResult::SegmentBoundaryViolation
        );
    }

    #[test]
    fn test_translate_unmapped_segment() {
        let mut vm = simple_vm();
        assert_eq!(translate(&va(7, 0, 0), &mut vm), TranslationResult::InvalidSegment);
        assert_eq!(translate(&va(0, 0, 1), &mut vm), TranslationResult::InvalidSegment);
        assert_eq!(
            translate(&VirtualAddress::from_raw(u32::MAX), &mut vm),
            TranslationResult::InvalidSegment
        );
    }

    #[test]
    fn test_bounds_checked_before_faults() {
        // PT and page both on disk, but the offset is out of bounds
        let mut vm = vm_with(&[(2, 512, -3)], &[(2, 1, -4)]);
        let free = vm.frames().free_count();

        assert_eq!(
            translate(&va(2, 1, 0), &mut vm),
            TranslationResult::SegmentBoundaryViolation
        );
        assert_eq!(vm.frames().free_count(), free);
        assert_eq!(vm.memory().get_segment_pt_location(2), -3);
    }

    #[test]
    fn test_translate_frame_zero_is_valid() {
        let mut vm = vm_with(&[(1, 1000, 4)], &[(1, 0, 0)]);
        assert_eq!(translate(&va(1, 0, 7), &mut vm), TranslationResult::Success(7));
    }

    #[test]
    fn test_translate_page_table_and_page_fault() {
        // s=0 size=300, PT on block 1; block 1 says page 0 is on block 5
        let mut vm = vm_with(&[(0, 300, -1)], &[(0, 0, -5)]);

        let result = translate(&va(0, 0, 3), &mut vm);

        // frames 0 and 1 hold the segment table, so the PT gets 2 and the page 3
        assert_eq!(result, TranslationResult::Success(3 * 512 + 3));
        assert_eq!(vm.memory().get_segment_pt_location(0), 2);
        assert_eq!(vm.memory().get_page_frame(2, 0), Ok(3));
        assert!(!vm.frames().is_free(2));
        assert!(!vm.frames().is_free(3));
    }

    #[test]
    fn test_translate_demand_paging_sample() {
        // 8 4000 3   9 5000 -7
        // 8 0 10   8 1 -20   9 0 13   9 1 -25
        let mut vm = vm_with(
            &[(8, 4000, 3), (9, 5000, -7)],
            &[(8, 0, 10), (8, 1, -20), (9, 0, 13), (9, 1, -25)],
        );

        let results = translate_batch(&[2097162, 2097674, 2359306, 2359818], &mut vm);

        // 8/1 faults into frame 2; 9's PT faults into 4; 9/1 faults into 5
        assert_eq!(
            results,
            vec![10 * 512 + 10, 2 * 512 + 10, 13 * 512 + 10, 5 * 512 + 10]
        );
        assert_eq!(vm.memory().get_segment_pt_location(9), 4);
        assert_eq!(vm.memory().get_page_frame(4, 0), Ok(13));
        assert_eq!(vm.memory().get_page_frame(4, 1), Ok(5));
    }

    #[test]
    fn test_translate_is_idempotent_after_fault() {
        let mut vm = vm_with(&[(0, 300, -1)], &[(0, 0, -5)]);

        let first = translate(&va(0, 0, 3), &mut vm);
        let free = vm.frames().free_count();
        let second = translate(&va(0, 0, 3), &mut vm);

        assert_eq!(first, second);
        assert_eq!(vm.frames().free_count(), free);
    }

    #[test]
    fn test_translate_loads_page_contents() {
        // segment 4's page table lives on block 9, which seeds word 4 of that block;
        // segment 0 then maps its page 0 onto the same block
        let mut vm = vm_with(&[(0, 300, 6), (4, 512, -9)], &[(4, 4, 77), (0, 0, -9)]);

        let pa = translate(&va(0, 0, 0), &mut vm).to_output();
        assert!(pa >= 0);
        assert_eq!(vm.read(pa as i64 + 4), 77);
        assert_eq!(vm.read(pa as i64 + 5), 0);
    }

    #[test]
    fn test_frame_exhaustion() {
        let mut vm = vm_with(&[(1, 1000, -2)], &[(1, 0, -3)]);
        while vm.allocate_frame().is_some() {}

        assert_eq!(translate(&va(1, 0, 0), &mut vm), TranslationResult::FrameExhausted);
        // nothing was rewritten
        assert_eq!(vm.memory().get_segment_pt_location(1), -2);
    }

    #[test]
    fn test_frame_exhaustion_on_page_keeps_page_table() {
        let mut vm = vm_with(&[(1, 1000, -2)], &[(1, 0, -3)]);
        while vm.frames().free_count() > 1 {
            vm.allocate_frame();
        }

        assert_eq!(translate(&va(1, 0, 0), &mut vm), TranslationResult::FrameExhausted);
        let pt_frame = vm.memory().get_segment_pt_location(1);
        assert!(pt_frame >= 0);
        assert_eq!(vm.memory().get_page_frame(pt_frame as usize, 0), Ok(-3));
    }

    #[test]
    fn test_invalid_locators() {
        let mut vm = vm_with(&[(1, 1000, -(DISK_BLOCKS as i32)), (2, 1000, 5)], &[]);
        vm.memory_mut().set_page_entry(5, 0, NUM_FRAMES as i32);
        let free = vm.frames().free_count();

        assert_eq!(translate(&va(1, 0, 0), &mut vm), TranslationResult::InvalidLocator);
        assert_eq!(translate(&va(2, 0, 0), &mut vm), TranslationResult::InvalidLocator);
        assert_eq!(vm.frames().free_count(), free);
    }

    #[test]
    fn test_translate_batch_empty() {
        let mut vm = simple_vm();
        assert!(translate_batch(&[], &mut vm).is_empty());
    }
}
