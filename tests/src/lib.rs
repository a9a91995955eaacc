//! Cross-crate tests: the real plugin set driven through the real supervisor.

#[cfg(test)]
mod discovery;
