/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the verification harness run by the hsm-verify tool:
    continuous TRNG sampling, the peripheral self-test and the stop signal
    plumbing.

--*/

pub mod cancel;
pub mod selftest;
pub mod signal;
pub mod stream;

pub use cancel::CancelToken;
pub use selftest::{run_selftest, SelftestReport, SCRATCH_PATTERN};
pub use stream::{run_stream, HealthPolicy, OutputMode, StopReason, StreamConfig, StreamSummary};
