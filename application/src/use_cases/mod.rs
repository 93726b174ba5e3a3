//! Use cases

pub mod process_message;

pub use process_message::{ProcessMessageError, ProcessMessageUseCase, error_reply};
