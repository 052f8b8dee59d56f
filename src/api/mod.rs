pub(crate) mod analytics;
pub(crate) mod errors;
pub(crate) mod events;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod worksheets;
