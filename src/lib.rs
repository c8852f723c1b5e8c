pub mod constants;
pub mod error;
pub mod io;
pub mod logging;
pub mod memory;
pub mod translation;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{MemoryError, VmError};
pub use io::{Command, InitData};
pub use translation::{TranslationResult, VirtualAddress};
pub use vm_manager::{PageEntry, SegmentEntry, TranslationStats, VmManager};
