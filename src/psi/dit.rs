// psi/dit.rs
//! Discontinuity Information Table (0x7E).

use serde::Serialize;

use crate::error::Result;
use crate::psi::section::SectionHead;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dit {
    pub transition: bool,
}

impl Dit {
    pub fn parse_section(&mut self, _head: &SectionHead, body: &[u8]) -> Result<()> {
        if let Some(&flag) = body.first() {
            self.transition = flag & 0x80 != 0;
        }
        Ok(())
    }
}
