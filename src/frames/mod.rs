pub(crate) mod dirty;
pub(crate) mod policy;
