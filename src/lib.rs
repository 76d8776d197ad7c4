pub mod args;
pub mod auth;
pub mod errors;
pub mod manifest;
pub mod pin;
pub mod postprocess;
pub mod reference;
pub mod registry;
pub mod rewrite;
#[cfg(test)]
pub mod test_data;
