use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum NavigationError<V: Debug> {
    /// Navigation target has no registered screen
    #[error("Unknown view: {view:?}")]
    UnknownView { view: V },

    /// Intermediate or permanent work failed; the transition was aborted
    #[error("Transition work failed: {source}")]
    TransitionWork {
        #[source]
        source: anyhow::Error,
    },
}
