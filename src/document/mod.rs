pub(crate) mod cloner;
pub(crate) mod source;
