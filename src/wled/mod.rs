pub mod client;
pub mod state;

#[cfg(test)]
pub mod mock;
