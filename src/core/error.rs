//! Error types for the thread pool

/// Result type for thread pool operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur in the thread pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// Thread pool is draining or stopped and no longer accepts jobs
    #[error("Thread pool '{pool_name}' is shutting down ({pending_jobs} jobs pending)")]
    ShuttingDown {
        /// Name of the thread pool
        pool_name: String,
        /// Number of jobs still queued when the submission was rejected
        pending_jobs: usize,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Job returned an error
    #[error("Job execution failed (job_id: {job_id}): {message}")]
    ExecutionError {
        /// ID of the failed job
        job_id: String,
        /// Error message
        message: String,
    },

    /// Job panicked while running
    #[error("Job panicked (job_id: {job_id}): {message}")]
    JobPanicked {
        /// ID of the panicked job
        job_id: String,
        /// Panic message
        message: String,
    },

    /// Job was dropped before producing a result
    #[error("Job result lost (job_id: {job_id}): job dropped without completing")]
    ResultLost {
        /// ID of the lost job
        job_id: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl ThreadError {
    /// Create a shutting down error
    pub fn shutting_down(pool_name: impl Into<String>, pending_jobs: usize) -> Self {
        ThreadError::ShuttingDown {
            pool_name: pool_name.into(),
            pending_jobs,
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::ExecutionError {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a job panicked error
    pub fn panicked(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::JobPanicked {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a result lost error
    pub fn result_lost(job_id: impl Into<String>) -> Self {
        ThreadError::ResultLost {
            job_id: job_id.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ThreadError::Other(msg.into())
    }

    /// Whether this error describes a failure of the job itself rather than the pool
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            ThreadError::ExecutionError { .. }
                | ThreadError::JobPanicked { .. }
                | ThreadError::ResultLost { .. }
        )
    }
}

/// Extracts a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
