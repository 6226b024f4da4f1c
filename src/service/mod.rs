pub mod client;

pub use client::ExchangeService;
pub(crate) use client::{default_transport, standard_headers};
