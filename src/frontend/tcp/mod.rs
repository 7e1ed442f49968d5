pub mod listener;

#[cfg(test)]
mod listener_test;
