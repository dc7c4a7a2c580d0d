//! Ticket issuing for the front door
//!
//! Every visitor receives a unique, strictly increasing `A-###` ticket.

pub mod issuer;

pub use issuer::{TicketIssuer, DEFAULT_INITIAL_TICKET, KIOSK_INITIAL_TICKET};
