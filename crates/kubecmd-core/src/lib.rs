//! Command-response retry scheduler.
//!
//! A [`ResponseDispatcher`] runs one handler round at a time. Handlers that
//! answer [`Rehandle::After`] are parked in a bounded [`DelayedRetryPool`]
//! until their delay elapses and are then fed back into the dispatcher.

pub mod config;
pub mod ids;
pub mod response;

pub use config::{ConfigError, SchedulerConfig};
pub use ids::TaskId;
pub use response::{
    BoxError, CommandResponseTask, ContractViolation, DelayedRetryPool, DispatcherHandle,
    HandlerFn, PoolError, PoolHandle, Rehandle, ResponseDispatcher, ResponseHandler, RoundEvent,
    RoundEventKind, SubmitError, handler_fn,
};
