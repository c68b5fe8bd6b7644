use thiserror::Error;

/// Symbol that cannot name an asset
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid asset symbol '{0}'")]
pub struct InvalidAsset(pub String);

/// A lifecycle transition that the current state does not allow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: &'static str,
}
