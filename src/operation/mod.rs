mod delete;
mod flush;
mod get;
mod increment;
mod item;
mod multi_get;
mod stats;
mod store;

pub use delete::DeleteOperation;
pub use flush::FlushOperation;
pub use get::GetOperation;
pub use increment::{Direction, IncrementOperation};
pub use multi_get::{MultiGetOperation, MultiGetResult};
pub use stats::{ServerStats, StatsOperation};
pub use store::{Expiration, StoreOperation, MAX_RELATIVE_EXPIRATION};

use log::error;

use crate::error::{ClientError, Result};

#[derive(Debug)]
pub enum FailureReason {
    /// The server answered, but not with the success keyword (miss, `NOT_STORED`, ...).
    Unsuccessful,
    Error(ClientError),
}

#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(FailureReason),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Success(_) => true,
            Outcome::Failure(_) => false,
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }
}

pub trait Operation: Sized {
    type Output;

    fn name(&self) -> &'static str;

    /// `Ok(None)` when the server did not confirm the command.
    fn execute_action(&mut self) -> Result<Option<Self::Output>>;

    fn execute(mut self) -> Result<Outcome<Self::Output>> {
        match self.execute_action() {
            Ok(Some(output)) => Ok(Outcome::Success(output)),
            Ok(None) => Ok(Outcome::Failure(FailureReason::Unsuccessful)),
            Err(err) => {
                if err.is_unsupported() {
                    return Err(err);
                }
                error!("{} operation failed: {}", self.name(), err);
                Ok(Outcome::Failure(FailureReason::Error(err)))
            }
        }
    }
}
