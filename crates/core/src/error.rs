use thiserror::Error;

use crate::model::{CardError, DomainError, ReviewError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Review(#[from] ReviewError),
}
