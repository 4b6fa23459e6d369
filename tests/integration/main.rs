//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the node against mock
//! adapters.  All tests run on the host (x86_64) with no real hardware
//! required.

mod credential_priority_tests;
mod drain_retry_tests;
mod end_to_end_tests;
mod mock_hw;
mod provisioning_tests;
