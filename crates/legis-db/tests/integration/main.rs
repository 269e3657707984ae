mod common;
mod fact_repository_tests;
