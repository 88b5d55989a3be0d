//! Integration tests for release-rail
//!
//! Every test drives the compiled binary against a bare git remote in a
//! temporary directory.

mod test_check;
mod test_fetch;
mod test_publish;
