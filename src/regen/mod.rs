pub(crate) mod cancel;
pub(crate) mod handle;
pub(crate) mod opts;
pub(crate) mod progress;
pub(crate) mod report;
pub(crate) mod scheduler;
