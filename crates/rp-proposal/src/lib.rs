//! # rp-proposal
//!
//! Proposal review for the research-pipeline admin client.
//!
//! The chat assistant (or a user) proposes a batch of mutations: grouping
//! operations such as "create category Security" and entity changes such as
//! "move artifact a-1 into Security". A human reviews the batch, unchecks what
//! they don't want, edits proposed values, and accepts the rest.
//!
//! ## Key components
//!
//! - [`Proposal`] — the immutable batch as received
//! - [`DependencyMap`] — which changes need which operations
//! - [`SelectionController`] — checked state with cascading blocks
//! - [`OverrideMap`] — reviewer edits and effective-value resolution
//! - [`diff_change`] / [`summarize_change`] — collapsed-card summaries
//! - [`ProposalReview`] — ties the above together for one proposal and
//!   produces an [`AcceptedProposal`]
//! - [`ReviewConfig`] / [`EntitySchema`] — the injected per-kind schema

pub mod dependency;
pub mod diff;
pub mod entity;
pub mod error;
pub mod labels;
pub mod overrides;
pub mod proposal;
pub mod review;
pub mod schema;
pub mod selection;

pub use dependency::DependencyMap;
pub use diff::{diff_change, summarize_change, FieldDiff};
pub use entity::{EntitySnapshot, ExistingEntity};
pub use error::ProposalError;
pub use labels::{change_label, operation_label, target_label};
pub use overrides::OverrideMap;
pub use proposal::{
    ChangeAction, EntityChange, FieldValues, OperationAction, PrerequisiteOperation, Proposal,
};
pub use review::{
    AcceptedProposal, ChangeCard, ProposalReview, ReviewStatus, SelectedChange, SelectedOperation,
};
pub use schema::{EntitySchema, FieldKind, FieldSpec, ReviewConfig};
pub use selection::{SelectionController, SelectionState};
