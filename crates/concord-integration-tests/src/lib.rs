//! End-to-end tests for the Concord workspace live under `tests/`.
