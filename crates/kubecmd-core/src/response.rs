mod dispatcher;
mod errors;
mod events;
mod pool;
mod task;

pub use dispatcher::{DispatcherHandle, ResponseDispatcher};
pub use errors::{ContractViolation, PoolError, SubmitError};
pub use events::{RoundEvent, RoundEventKind};
pub use pool::{DelayedRetryPool, PoolHandle};
pub use task::{BoxError, CommandResponseTask, HandlerFn, Rehandle, ResponseHandler, handler_fn};
