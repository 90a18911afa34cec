//! Cross-crate tests for the incremental-unit network.

#[cfg(test)]
mod support;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod scenarios;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod fanout;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod shutdown;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod failure_policy;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod serialized;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod retention;
