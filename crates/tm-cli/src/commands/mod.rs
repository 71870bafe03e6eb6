//! CLI command implementations

pub(crate) mod apply;
pub(crate) mod common;
pub(crate) mod history;
pub(crate) mod ls;
pub(crate) mod split;
pub(crate) mod status;

#[cfg(test)]
pub(crate) mod test_support;
