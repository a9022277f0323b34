#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntoArchivePathError {
    #[error("unrepresentable string found in path")]
    UnrepresentableStr,

    #[error("no path provided")]
    EmptyPath,
}
