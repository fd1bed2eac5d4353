//! Inbound adapters that let the outside world observe the service while
//! keeping framework details at the edge.
//!
//! Only HTTP lives here today, under [`http`].

pub mod http;
