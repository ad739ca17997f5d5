use thiserror::Error;

use crate::pte::PageFaultErrorCode;
use crate::types::Exception;

/// Guest-visible page fault raised by an address translation.
///
/// The caller injects it into the guest as `#PF` with `error_code`
/// and `virt` loaded into CR2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{exception} at {virt:#x} (error code {error_code})")]
pub struct PageFault {
    pub virt: u64,
    pub error_code: PageFaultErrorCode,
    pub exception: Exception,
}

impl PageFault {
    pub fn is_exec(&self) -> bool {
        self.exception == Exception::PageFaultOnExec
    }
}
