//! Integration tests for the lazy-sema workspace; see `tests/`.
