mod cluster_tests;
mod common;
mod create_tests;
mod provision_tests;
mod query_tests;
