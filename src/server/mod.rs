//! TCP accept loop dispatching connections to the HTTP layer.

pub mod listener;
