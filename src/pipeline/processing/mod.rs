// Pipeline processing: header schema validation, normalization, reconciliation

pub mod normalize;
pub mod reconcile;
pub mod schema;
