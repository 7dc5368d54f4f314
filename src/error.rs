//! Errors the ledger engine can return.
//!
//! Validation errors ([`NonPositiveAmount`], [`EmptyParticipants`],
//! [`InvalidSplit`], [`DuplicateParticipant`], [`DanglingReference`]) are
//! raised before anything reaches a [`Group`]. [`MemberInUse`] guards member
//! removal.
//!
//! [`NonPositiveAmount`]: LedgerError::NonPositiveAmount
//! [`EmptyParticipants`]: LedgerError::EmptyParticipants
//! [`InvalidSplit`]: LedgerError::InvalidSplit
//! [`DuplicateParticipant`]: LedgerError::DuplicateParticipant
//! [`DanglingReference`]: LedgerError::DanglingReference
//! [`MemberInUse`]: LedgerError::MemberInUse
//! [`Group`]: crate::schemas::Group
use thiserror::Error;

use crate::schemas::{ExpenseId, MemberId, SplitPolicy};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(f64),
    #[error("an expense needs at least one participant")]
    EmptyParticipants,
    #[error("{policy} split does not add up: expected {expected:.2}, got {actual:.2}")]
    InvalidSplit {
        policy: SplitPolicy,
        expected: f64,
        actual: f64,
    },
    #[error("share of `{participant}` cannot be negative, got {value}")]
    NegativeShare { participant: MemberId, value: f64 },
    #[error("`{0}` appears more than once in the split")]
    DuplicateParticipant(MemberId),
    #[error("`{0}` is not a member of the group")]
    DanglingReference(MemberId),
    #[error("`{0}` is still referenced by an expense")]
    MemberInUse(MemberId),
    #[error("member id `{0}` is used more than once")]
    DuplicateMember(MemberId),
    #[error("member `{0}` not found")]
    MemberNotFound(MemberId),
    #[error("expense `{0}` not found")]
    ExpenseNotFound(ExpenseId),
    #[error("a member named `{0}` already exists")]
    DuplicateMemberName(String),
    #[error("{0} cannot be blank")]
    BlankName(&'static str),
}
