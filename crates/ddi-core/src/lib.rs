//! Core record model and the parse / validate / normalize contracts shared by
//! every device data variant.

pub mod dataset;
pub mod datum;
pub mod issue;
pub mod normalizer;
pub mod parser;
pub mod pointer;
pub mod validator;

pub use dataset::{
    new_id, DataState, Dataset, DatasetClosed, DatasetOwner, DeduplicatorDescriptor, DescriptorError,
    StampedDatum,
};
pub use datum::{identity_float, Base, Datum, IdentityError, Origin, DEVICE_TIME_FORMAT, IDENTITY_TIME_FORMAT};
pub use issue::{Issue, IssueSource, Report};
pub use normalizer::Normalizer;
pub use parser::{ArrayParser, ObjectParser};
pub use pointer::Pointer;
pub use validator::{Check, Validator};

pub const CRATE_NAME: &str = "ddi-core";
