pub mod bus;
pub mod dispatch;
pub mod engine;
pub mod frontend;
pub mod logging;
pub mod protocol;
pub mod shared;

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
pub mod test_helpers;
