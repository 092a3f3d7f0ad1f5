mod access;
mod aggregator;
mod audit;
mod error;
mod extension;
mod fee;
mod guard;
mod orchestrator;
mod registry;
mod types;


pub use access::Roles;
pub use aggregator::Delta;
pub use audit::{ChangeRecord, DispatchRecord, JournalEntry};
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult, Role};
pub use extension::{Extension, Settled, SwapVote};
pub use fee::{FeeCalculationMethod, FeeConfiguration, FeeSource, MAX_FEE};
pub use orchestrator::{
    DEFAULT_JOURNAL_CAPACITY, Orchestrator, OrchestratorSettings, SwapOutcome,
};
pub use registry::DEFAULT_WEIGHT;
pub use types::{
    Address, DonateParams, EventContext, InitializeParams, LifecycleEvent, ModifyLiquidityParams,
    ParseIdError, RegistryMode, SwapParams, VenueId,
};
