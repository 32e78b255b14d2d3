pub mod backoff;

pub use backoff::RetryBackoff;
