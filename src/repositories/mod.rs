pub(crate) mod roster;
pub(crate) mod worksheets;
