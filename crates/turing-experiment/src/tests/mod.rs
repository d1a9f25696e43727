//! Crate-level behaviour tests.

mod validation_behaviour;
