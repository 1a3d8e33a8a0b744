//! Typed views over the documents in a contractflow run.
//!
//! The shared store keeps documents as raw JSON so that any backend can
//! round-trip them losslessly; these types are the parsed views that the
//! validator, coordinator and status reporting work with. Every struct keeps
//! unknown fields in a flattened `extra` map.

pub mod contract;
pub mod history;
pub mod issue;
pub mod plan;
pub mod report;

pub use contract::{Contract, ContractBody, ContractOperation, EndpointId, HttpMethod};
pub use history::{RevisionOrigin, RevisionRecord};
pub use issue::{Attribution, Issue, Level, ReportStatus, ValidationFindings, ValidationReport};
pub use plan::{Entity, Feature, ProjectPlan};
pub use report::{
    ApiIntegration, ArtifactRef, BackendReport, Complexity, ComplianceStatus, FrontendComponent,
    FrontendReport, ImplementedEndpoint,
};
