// Licensed under the Apache-2.0 license

use hsm_drivers::{PollBudget, Trng};
use hsm_hw_model::{HsmArgs, HwModel, LogBuffer, ModelEmulated, Output};
use hsm_verify::{run_selftest, run_stream, CancelToken, OutputMode, StopReason, StreamConfig};

#[test]
fn test_stream_from_emulated_model() {
    let buf = LogBuffer::new();
    let mut model = ModelEmulated::new().with_hsm_args(HsmArgs::with_words(
        [0xffff_ffffu32, 0x0000_0000, 0x8000_0001].into_iter().cycle(),
    ));
    let window = model.open_hsm().unwrap();
    {
        let mut trng = Trng::new(&window, PollBudget::trng_default(), Output::new(buf.clone()));
        let mut out = Vec::new();
        let config = StreamConfig {
            mode: OutputMode::Hex,
            limit: Some(6),
            health_every: Some(3),
            ..Default::default()
        };
        let summary = run_stream(&mut trng, &config, &CancelToken::new(), &mut out).unwrap();
        assert_eq!(summary.stop, StopReason::LimitReached);
        assert_eq!(summary.health_checks, 2);
        assert_eq!(summary.degraded_reports, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0xffffffff\n0x00000000\n0x80000001\n0xffffffff\n0x00000000\n0x80000001\n"
        );
    }
    assert_eq!(window.bus().ctrl(), 0);
    let messages = buf.messages();
    assert!(messages[0].starts_with("stream: initial health osc=running"));
    assert_eq!(messages.last().map(String::as_str), Some("hsm: disabled"));
}

#[test]
fn test_selftest_from_emulated_model() {
    let mut model = ModelEmulated::new();
    let window = model.open_hsm().unwrap();
    let mut trng = Trng::new(window, PollBudget::trng_default(), Output::sink());
    let report = run_selftest(&mut trng, 8);
    assert!(report.passed(), "{report}");
}
