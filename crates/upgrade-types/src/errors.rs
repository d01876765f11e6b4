use thiserror::Error;

/// Errors constructing a [`PrivacySalt`](crate::PrivacySalt).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PrivacySaltError {
    #[error("privacy salt must not be all zeroes")]
    AllZero,
}
