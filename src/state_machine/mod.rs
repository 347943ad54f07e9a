// State machine module for the order lifecycle
//
// Orders move from submission to a terminal status through a fixed transition
// table. Engine-initiated moves are validated; provider-reported statuses are
// reconciled against the same table.

pub mod errors;
pub mod events;
pub mod order_state_machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::OrderEvent;
pub use order_state_machine::OrderStateMachine;
pub use states::OrderStatus;
