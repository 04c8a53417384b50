//! Scenario tests for the assembler against the in-memory ledger

mod offer_flow_tests;
