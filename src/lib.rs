pub mod api;
pub mod commands;
pub mod config;
pub mod fun_facts;
pub mod gallery;
pub mod generation;
pub mod login_modal;
pub mod results;
pub mod server;
pub mod session;
pub mod studio;
#[doc(hidden)]
pub mod test_support;
pub mod wizard;
