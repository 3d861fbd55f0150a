use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XCError {
    #[error("unknown xc scheme '{0}', supported: lda-pz, lda-x")]
    UnknownScheme(String),
}
