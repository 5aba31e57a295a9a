pub(super) mod encounter;
pub(super) mod history;
pub(super) mod medical;
