pub mod anchor;
pub mod api;
pub mod config;
pub mod flow;
pub mod metrics;
pub mod payment;
pub mod queue;
pub mod reservation;
pub mod retry;
pub mod scheduler;
pub mod testing;
pub mod types;

pub use anchor::PositionAnchorStore;
pub use api::{ApiError, DomainError, HttpTicketingApi, TicketingApi};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use flow::{FlowObserver, FlowOutcome, LoggingObserver, NoopObserver, PurchaseConfirmer, TicketFlow};
pub use payment::{PaymentAttempt, PaymentOrchestrator, PaymentOutcome, PaymentState, TimeoutReason};
pub use queue::{QueueClient, QueueOutcome, QueuePoll, QueuePosition};
pub use reservation::{
    ConfirmedReservation, PurchaseSession, PurchaseSnapshot, Reservation, ReservationClient,
    ReservationError, ReservationOutcome,
};
pub use retry::{RetryBudget, RetryError, RetryPolicy};
pub use scheduler::{CancelToken, TaskHandle, Tick};
pub use types::{FailureKind, FlowFailure, LoginRedirect, ResourceId};
