//! This crate looks up East Hertfordshire's household waste collection dates.
//! It backs both the CLI printing a single date and the server answering lookups over HTTP.
//!
//! The dates are read from <https://www.eastherts.gov.uk/calendars>, which hands the address
//! search over to the council's e-forms service.

pub mod collection_client;
pub mod error;

pub use error::LookupError;
