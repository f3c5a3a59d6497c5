//! Integration tests for imagebuilder-lib.

mod assemble_tests;
mod common;
mod properties_tests;
mod provision_tests;
mod upgrade_tests;
