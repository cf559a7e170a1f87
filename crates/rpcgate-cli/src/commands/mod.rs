//! Command handlers grouped by concern.

pub(crate) mod domains;
pub(crate) mod records;
pub(crate) mod reorg;
