//! Validation for contractflow runs.
//!
//! - [`gate`]: the parse-and-validate gate every stage output passes before commit
//! - [`shape`]: typed shape checks per document key
//! - [`validator`]: the contract-driven [`ContractValidator`]
//! - [`integrity`]: required-field checks over a whole run document

pub mod gate;
pub mod integrity;
pub mod shape;
pub mod validator;

pub use gate::{StageEnvelope, parse_stage_output};
pub use integrity::validate_integrity;
pub use shape::{check_shape, normalize_document};
pub use validator::{
    ContractValidator, CoverageEntry, CoverageReport, DriftRule, SchemaDiff, SchemaReferenceRule,
    normalize_path,
};
