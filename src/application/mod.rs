//! Loan application core: models, use cases and the ports they depend on

pub mod amortization;
pub mod criteria;
pub mod enrichment;
pub mod error;
pub mod gateways;
pub mod model;
pub mod outbox;
pub mod service;

pub use criteria::{CriteriaCompiler, PageResult, SearchCriteria, SortDirection};
pub use enrichment::{EnrichmentAggregator, MissPolicy};
pub use error::{ApplicationError, ApplicationResult};
pub use model::{
    Application, ApplicationRecord, AuthToken, CreateApplication, EnrichedApplicationRecord,
    LoanStatus, LoanType, OwnerKey, OwnerRef, Role, UpdateApplicationStatus, UserProfile,
};
pub use outbox::OutboxDispatcher;
pub use service::{ApplicationPolicy, ApplicationService};
